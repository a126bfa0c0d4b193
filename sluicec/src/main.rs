//! Driver that builds a demonstration pipeline and emits it as
//! SystemVerilog: a three-tap moving sum over a valid-qualified input
//! stream, with one cross-depth addition to exercise operand alignment.

use argh::FromArgs;
use sluice_backend::{Backend, VerilogBackend};
use sluice_ir as ir;
use sluice_ir::{Expr, Pipeline, rrc};
use sluice_utils::{OutputFile, SluiceResult};

#[derive(FromArgs)]
/// Generate a pipelined SystemVerilog module.
struct Opts {
    /// where to write the output. `-` is stdout, `<null>` discards it
    #[argh(option, short = 'o', default = "OutputFile::Stdout")]
    output: OutputFile,

    /// name of the generated toplevel module
    #[argh(option, default = "String::from(\"pipeline_top\")")]
    toplevel: String,

    /// data path width in bits
    #[argh(option, default = "32")]
    width: u64,

    /// logging level (off, error, warn, info, debug, trace)
    #[argh(option, default = "log::LevelFilter::Warn")]
    log_level: log::LevelFilter,
}

fn main() {
    let opts: Opts = argh::from_env();
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();
    if let Err(err) = run(opts) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(opts: Opts) -> SluiceResult<()> {
    let module = rrc(ir::Module::new(opts.toplevel.as_str()));
    let (clk, rst, din, din_valid, dout, dout_valid) = {
        let mut m = module.borrow_mut();
        (
            m.input("clk", 1)?,
            m.input("rst", 1)?,
            m.input("din", opts.width)?,
            m.input("din_valid", 1)?,
            m.output("dout", opts.width)?,
            m.output("dout_valid", 1)?,
        )
    };

    let pipe = Pipeline::new(&module, "p");
    let x = pipe.input(
        Expr::signal(&din),
        Some(Expr::signal(&din_valid)),
        None,
    );
    let cur = pipe.stage(x.expr())?;
    let prev1 = cur.history(1)?;
    let prev2 = cur.history(2)?;
    let sum = pipe.stage(cur.expr() + prev1.expr() + prev2.expr())?;
    // `cur` sits one stage above `sum`; the visitor inserts the delay
    // register needed to add them at the same depth.
    let acc = pipe.stage(sum.expr() + cur.expr())?;
    acc.output(&dout, Some(&dout_valid), None)?;
    pipe.emit_clocked(&clk, &rst);

    log::info!(
        "generated `{}' with {} stage values into {}",
        opts.toplevel,
        pipe.var_count(),
        opts.output.as_path_string()
    );
    let result = VerilogBackend.run(&module.borrow(), opts.output);
    result
}
