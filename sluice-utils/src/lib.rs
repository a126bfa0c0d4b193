//! Shared utilities for the Sluice RTL generator.
mod errors;
mod id;
mod math;
mod namegenerator;
mod out_file;

pub use errors::{Error, SluiceResult};
pub use id::{GetName, Id};
pub use math::bits_needed_for;
pub use namegenerator::NameGenerator;
pub use out_file::OutputFile;
