//! In-memory representation for the Sluice pipeline generator.
//!
//! The crate is organized around a [`Module`] holding signals,
//! continuous assignments, and synchronous processes; a [`Pipeline`]
//! that stages [`Expr`] trees into registered [`StageValue`] handles;
//! and a [`Printer`] that renders the lowered statements as Verilog
//! text.

mod align;
mod common;
mod expr;
mod pipeline;
mod printer;
mod seq;
mod signal;

pub use common::{RRC, WRC, rrc};
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use pipeline::{Pipeline, StageValue};
pub use printer::Printer;
pub use seq::{SeqBlock, SeqEntry, Stmt};
pub use signal::{Assign, Direction, Module, Process, Signal, SignalKind};

pub use sluice_utils::{Error, GetName, Id, SluiceResult};
