//! SystemVerilog emission.
//!
//! Lowers a [`ir::Module`] to a single synthesizable SystemVerilog
//! module: a port list, local `logic` declarations, the continuous
//! assignments, and one `always_ff` block per registered process.

use crate::traits::Backend;
use itertools::Itertools;
use sluice_ir as ir;
use sluice_ir::{Direction, Printer};
use sluice_utils::{Error, Id, OutputFile, SluiceResult};
use std::collections::HashSet;
use std::io::Write;
use std::time::Instant;

pub struct VerilogBackend;

impl Backend for VerilogBackend {
    fn name(&self) -> &'static str {
        "verilog"
    }

    fn validate(module: &ir::Module) -> SluiceResult<()> {
        let mut driven: HashSet<Id> = HashSet::new();
        for asgn in &module.continuous_assignments {
            let name = asgn.dst.borrow().name();
            if !driven.insert(name) {
                return Err(Error::malformed_structure(format!(
                    "wire `{name}' has multiple continuous drivers"
                )));
            }
        }
        for process in module.processes() {
            if process.body.is_empty() && process.reset_body.is_empty() {
                return Err(Error::malformed_structure(format!(
                    "module `{}' registers an empty synchronous process",
                    module.name
                )));
            }
        }
        Ok(())
    }

    fn emit(module: &ir::Module, file: &mut OutputFile) -> SluiceResult<()> {
        let start = Instant::now();
        let mut out = file.get_write()?;
        write_module(module, &mut out)?;
        log::info!(
            "Verilog emission for `{}' took {}ms",
            module.name,
            start.elapsed().as_millis()
        );
        Ok(())
    }
}

/// `[msb:0] ` for multi-bit signals, empty for single-bit ones.
fn width_decl(width: u64) -> String {
    if width <= 1 {
        String::new()
    } else {
        format!("[{}:0] ", width - 1)
    }
}

fn write_module<W: Write>(module: &ir::Module, f: &mut W) -> SluiceResult<()> {
    let ports = module
        .signals()
        .filter(|s| s.borrow().direction != Direction::Local)
        .map(|s| {
            let sig = s.borrow();
            let dir = match sig.direction {
                Direction::Input => "input",
                Direction::Output => "output",
                Direction::Local => unreachable!("port filter passed a local"),
            };
            format!(
                "  {dir} logic {}{}",
                width_decl(sig.width),
                sig.name()
            )
        })
        .join(",\n");
    writeln!(f, "module {} (", module.name)?;
    writeln!(f, "{ports}")?;
    writeln!(f, ");")?;

    for s in module
        .signals()
        .filter(|s| s.borrow().direction == Direction::Local)
    {
        let sig = s.borrow();
        writeln!(f, "  logic {}{};", width_decl(sig.width), sig.name())?;
    }

    if !module.continuous_assignments.is_empty() {
        writeln!(f)?;
    }
    for asgn in &module.continuous_assignments {
        writeln!(
            f,
            "  assign {} = {};",
            asgn.dst.borrow().name(),
            Printer::expr_str(&asgn.src)
        )?;
    }

    for process in module.processes() {
        writeln!(f)?;
        let clk = process.clock.borrow().name();
        match &process.reset {
            Some(rst) => {
                writeln!(f, "  always_ff @(posedge {clk}) begin")?;
                writeln!(f, "    if ({}) begin", rst.borrow().name())?;
                for stmt in &process.reset_body {
                    Printer::write_stmt(stmt, 6, f)?;
                }
                writeln!(f, "    end else begin")?;
                for stmt in &process.body {
                    Printer::write_stmt(stmt, 6, f)?;
                }
                writeln!(f, "    end")?;
                writeln!(f, "  end")?;
            }
            None => {
                writeln!(f, "  always_ff @(posedge {clk}) begin")?;
                for stmt in &process.body {
                    Printer::write_stmt(stmt, 4, f)?;
                }
                writeln!(f, "  end")?;
            }
        }
    }
    writeln!(f, "endmodule")?;
    Ok(())
}
