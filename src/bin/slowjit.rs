//! Demonstration driver.
//!
//! Builds `LoadConstant [Negate] StoreResult Terminate`, JIT-compiles it when
//! possible and evaluates it through the dispatch slot.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use slowjit::codegen::{SourceAccumulator, TranslationTable};
use slowjit::core::EXPR_BASENAME;
use slowjit::{EvalContext, Expression, JitConfig, JitProvider, SlowJitProvider};

#[derive(Parser, Debug)]
#[command(name = "slowjit", about = "Compile and run a constant expression through slowjit")]
struct Args {
    /// Constant loaded by the expression.
    #[arg(long = "const", default_value_t = 42, allow_negative_numbers = true)]
    value: i64,

    /// Load a null constant instead.
    #[arg(long)]
    null: bool,

    /// Negate the constant (not translatable, forces the interpreter).
    #[arg(long)]
    negate: bool,

    /// Result tuple attribute to store into.
    #[arg(long, default_value_t = 0)]
    slot: usize,

    /// Width of the result tuple.
    #[arg(long, default_value_t = 1)]
    natts: usize,

    /// Number of evaluations.
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// C compiler, overrides SLOWJIT_CC.
    #[arg(long)]
    cc: Option<PathBuf>,

    /// Directory for generated files, overrides SLOWJIT_ARTIFACT_DIR.
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// Keep generated source and libraries after exit.
    #[arg(long)]
    keep_artifacts: bool,

    /// Print the generated C source and exit.
    #[arg(long)]
    emit_only: bool,
}

fn build_expression(args: &Args) -> Expression {
    let mut expr = Expression::new(args.natts);
    expr.load_constant(args.value as u64, args.null);
    if args.negate {
        expr.negate();
    }
    expr.store_result(args.slot).terminate();
    expr
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.slot >= args.natts {
        eprintln!("Error: slot {} out of range for {} attributes", args.slot, args.natts);
        return ExitCode::from(2);
    }

    let expr = build_expression(&args);

    let result = if args.emit_only {
        emit_source(&expr)
    } else {
        run(&args, expr)
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn emit_source(expr: &Expression) -> Result<(), Box<dyn std::error::Error>> {
    let accumulator = SourceAccumulator::new();
    let mut emitter = accumulator.begin_expression(format!("{}_0_0", EXPR_BASENAME));
    TranslationTable::default().translate_steps(expr.steps(), &mut emitter)?;
    print!("{}", emitter.text());
    Ok(())
}

/// Compile and evaluate `expr`. The provider is dropped on every return
/// path, which unloads the modules and removes their files.
fn run(args: &Args, mut expr: Expression) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = JitConfig::from_env();
    if let Some(cc) = args.cc.clone() {
        config = config.with_cc(cc);
    }
    if let Some(dir) = args.artifact_dir.clone() {
        config = config.with_artifact_dir(dir);
    }
    if args.keep_artifacts {
        config = config.keep_artifacts(true);
    }

    let mut provider = SlowJitProvider::new(config);
    if !provider.compile_expr(&mut expr) {
        println!("expression not translatable, interpreting");
    }

    let mut econtext = EvalContext::default();
    for _ in 0..args.count {
        expr.evaluate(&mut econtext)?;
    }

    match expr.result(args.slot) {
        Some((_, true)) => println!("slot {} = NULL", args.slot),
        Some((value, false)) => println!("slot {} = {}", args.slot, value as i64),
        None => unreachable!("slot checked in main"),
    }
    println!("dispatch: {:?}", expr.dispatch());

    if let Some(context) = provider.context() {
        print!("{}", context.instrumentation());
        for path in context.module_paths() {
            println!("module: {}", path.display());
        }
    }
    Ok(())
}
