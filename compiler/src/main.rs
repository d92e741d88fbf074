use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use tfopc::dtype::TargetInfo;
use tfopc::pipeline::{PassOptions, PassResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitStage {
    /// Canonical textual IR
    Ir,
    /// Operation descriptors, one line per operand
    Ops,
    /// Operation descriptors as JSON
    Json,
    /// Source and output hashes
    BuildInfo,
}

#[derive(Parser, Debug)]
#[command(
    name = "tfopc",
    version,
    about = "Tensor-op canonicalizer — decodes, validates and canonicalizes tensor operations in textual IR"
)]
struct Cli {
    /// Input .tfir source file
    source: PathBuf,

    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Ir)]
    emit: EmitStage,

    /// Target pointer width in bits
    #[arg(long, default_value_t = 64, value_parser = parse_pointer_width)]
    pointer_width: u32,

    /// Print compiler phases and timing
    #[arg(long)]
    verbose: bool,

    /// Print the IR after each pass sweep
    #[arg(long)]
    dump_intermediates: bool,
}

fn parse_pointer_width(s: &str) -> Result<u32, String> {
    match s {
        "32" => Ok(32),
        "64" => Ok(64),
        _ => Err(format!("unsupported pointer width '{}' (expected 32 or 64)", s)),
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        eprintln!("tfopc: source = {}", cli.source.display());
        match &cli.output {
            Some(path) => eprintln!("tfopc: output = {}", path.display()),
            None => eprintln!("tfopc: output = <stdout>"),
        }
        eprintln!("tfopc: emit   = {:?}", cli.emit);
    }

    let options = PassOptions {
        target: TargetInfo {
            pointer_width: cli.pointer_width,
        },
        verbose: cli.verbose,
        dump_intermediates: cli.dump_intermediates,
    };

    // ── Read and parse source ──
    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("tfopc: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };

    let start = Instant::now();
    let file = cli.source.display().to_string();
    let built = tfopc::build::parse_module(&file, &source);
    for diag in &built.diagnostics {
        eprintln!("tfopc: {}", diag);
    }
    if tfopc::diag::has_errors(&built.diagnostics) {
        std::process::exit(1);
    }
    let mut module = built.module;

    if cli.verbose {
        eprintln!(
            "tfopc: parse complete, {:.1}ms ({} functions)",
            start.elapsed().as_secs_f64() * 1000.0,
            module.functions.len()
        );
    }

    // ── Tensor-op pass ──
    let start = Instant::now();
    let result = tfopc::pipeline::run_module(&mut module, &options, |_, res: &PassResult| {
        for diag in &res.diagnostics {
            eprintln!("tfopc: {}", diag);
        }
    });

    if cli.verbose {
        eprintln!(
            "tfopc: pass complete, {:.1}ms ({} ops, {} canonicalized, {} factory calls lowered)",
            start.elapsed().as_secs_f64() * 1000.0,
            result.stats.decoded,
            result.stats.canonicalized,
            result.stats.factories_lowered
        );
    }

    if result.has_errors() {
        std::process::exit(1);
    }

    // ── Emit ──
    let ir = module.to_string();
    let output = match cli.emit {
        EmitStage::Ir => ir,
        EmitStage::Ops | EmitStage::Json => {
            let records: Vec<_> = module
                .functions
                .iter()
                .zip(&result.functions)
                .flat_map(|(func, res)| tfopc::emit::op_records(func, &res.ops, &options.target))
                .collect();
            if cli.emit == EmitStage::Json {
                tfopc::emit::to_json(&records)
            } else {
                tfopc::emit::format_ops(&records)
            }
        }
        EmitStage::BuildInfo => tfopc::pipeline::compute_provenance(&source, &ir).to_json(),
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &output) {
                eprintln!("tfopc: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => print!("{}", output),
    }
}
