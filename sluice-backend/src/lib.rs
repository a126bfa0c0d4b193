//! Backends that lower the in-memory module representation to an
//! output format.

mod traits;
mod verilog;

pub use traits::Backend;
pub use verilog::VerilogBackend;
