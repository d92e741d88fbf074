// pipeline.rs — Tensor-op pass orchestration
//
// Runs the pass over each function in two sweeps: factory lowering, then
// decode → validate → canonicalize for every live instruction in body order.
//
// Preconditions: functions were built without error diagnostics.
// Postconditions: `PassResult::ops` lists the canonical descriptors in
//   program order. Every operation that validated is canonical.
// Failure modes: a structural decode error stops the function's sweep;
//   validation errors are reported and the sweep continues.
// Side effects: mutates the functions; `--verbose` progress goes to stderr
//   and `--dump-intermediates` IR goes to stdout.

use std::time::Instant;

use crate::canonicalize::canonicalize;
use crate::decode::{decode, OperationDescriptor};
use crate::diag::{has_errors, Diagnostic};
use crate::dtype::TargetInfo;
use crate::factory::{lower_factory_call, FactoryOutcome};
use crate::id::InstId;
use crate::ir::{Function, InstKind, Module};
use crate::validate::{validate, ShapePolicy};

// ── Options and results ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PassOptions {
    pub target: TargetInfo,
    /// Print per-phase progress and timing to stderr.
    pub verbose: bool,
    /// Print the IR after each sweep to stdout.
    pub dump_intermediates: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub decoded: usize,
    pub canonicalized: usize,
    pub factories_lowered: usize,
}

impl PassStats {
    fn merge(&mut self, other: PassStats) {
        self.decoded += other.decoded;
        self.canonicalized += other.canonicalized;
        self.factories_lowered += other.factories_lowered;
    }
}

/// Result of running the pass over one function.
#[derive(Debug, Clone, Default)]
pub struct PassResult {
    pub ops: Vec<OperationDescriptor>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: PassStats,
}

impl PassResult {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

/// Result of running the pass over a module: one `PassResult` per function.
#[derive(Debug, Clone, Default)]
pub struct ModuleResult {
    pub functions: Vec<PassResult>,
    pub stats: PassStats,
}

impl ModuleResult {
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.functions.iter().flat_map(|r| r.diagnostics.iter())
    }

    pub fn has_errors(&self) -> bool {
        self.functions.iter().any(PassResult::has_errors)
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn finish_phase(func: &Function, phase: &str, start: Instant, options: &PassOptions) {
    if options.verbose {
        eprintln!(
            "tfopc: @{}: {} complete, {:.1}ms",
            func.name,
            phase,
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
    if options.dump_intermediates {
        println!("// after {} (@{})", phase, func.name);
        print!("{}", func);
    }
}

/// Snapshot the body; rewrites only detach, so stale ids are skipped.
fn live_body(func: &Function) -> Vec<InstId> {
    func.body().to_vec()
}

// ── Pass runner ────────────────────────────────────────────────────────────

/// Run factory lowering and op canonicalization over one function.
pub fn run_op_pass(func: &mut Function, options: &PassOptions) -> PassResult {
    let target = &options.target;
    let mut result = PassResult::default();

    let start = Instant::now();
    for inst in live_body(func) {
        if !func.is_attached(inst) || !matches!(func.kind(inst), InstKind::Apply { .. }) {
            continue;
        }
        match lower_factory_call(func, inst, target) {
            FactoryOutcome::Rewritten(_) => result.stats.factories_lowered += 1,
            FactoryOutcome::Unchanged => {}
            FactoryOutcome::Rejected(diag) => result.diagnostics.push(diag),
        }
    }
    finish_phase(func, "factory-lowering", start, options);

    let start = Instant::now();
    for inst in live_body(func) {
        if !func.is_attached(inst) || !matches!(func.kind(inst), InstKind::Builtin { .. }) {
            continue;
        }
        let desc = match decode(func, inst, target) {
            Ok(Some(desc)) => desc,
            Ok(None) => continue,
            Err(err) => {
                result.diagnostics.push(err.into_diagnostic(func));
                break;
            }
        };
        result.stats.decoded += 1;

        if let Err(err) = validate(func, &desc, ShapePolicy::Required, target) {
            result.diagnostics.push(err.into_diagnostic(func, desc.inst));
            continue;
        }

        let canonical = canonicalize(func, &desc, target);
        if canonical.changed {
            result.stats.canonicalized += 1;
        }
        result.ops.push(canonical.descriptor);
    }
    finish_phase(func, "canonicalization", start, options);

    if options.verbose {
        eprintln!(
            "tfopc: @{}: {} ops decoded, {} canonicalized, {} factory calls lowered",
            func.name,
            result.stats.decoded,
            result.stats.canonicalized,
            result.stats.factories_lowered
        );
    }
    result
}

/// Run the pass over every function in the module.
///
/// `on_function_complete` sees each function's result as soon as it is
/// available, for immediate diagnostic display.
pub fn run_module(
    module: &mut Module,
    options: &PassOptions,
    mut on_function_complete: impl FnMut(&Function, &PassResult),
) -> ModuleResult {
    let mut out = ModuleResult::default();
    for func in &mut module.functions {
        let result = run_op_pass(func, options);
        on_function_complete(func, &result);
        out.stats.merge(result.stats);
        out.functions.push(result);
    }
    out
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for reproducibility checks.
///
/// `source_hash`: SHA-256 of the input IR text.
/// `output_hash`: SHA-256 of the printed canonical IR.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub output_hash: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    pub fn output_hash_hex(&self) -> String {
        bytes_to_hex(&self.output_hash)
    }

    /// Serialize provenance as a JSON string for `--emit build-info`.
    pub fn to_json(&self) -> String {
        format!(
            "{{\n  \"source_hash\": \"{}\",\n  \"output_hash\": \"{}\",\n  \"compiler_version\": \"{}\"\n}}\n",
            self.source_hash_hex(),
            self.output_hash_hex(),
            self.compiler_version,
        )
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(text: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Compute provenance from the input text and the printed output.
pub fn compute_provenance(source: &str, output: &str) -> Provenance {
    Provenance {
        source_hash: sha256(source),
        output_hash: sha256(output),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::parse_module;
    use crate::diag::codes;

    fn run(source: &str) -> (Module, ModuleResult) {
        let built = parse_module("t.tfir", source);
        assert!(built.diagnostics.is_empty(), "{:?}", built.diagnostics);
        let mut module = built.module;
        let result = run_module(&mut module, &PassOptions::default(), |_, _| {});
        (module, result)
    }

    #[test]
    fn validation_errors_do_not_stop_the_sweep() {
        let (_, result) = run(
            r#"
            func @f {
              %a = argument 0 : TensorHandle<Float>
              %k = argument 1 : Int
              %r1 = builtin "__tfop_Op,$in,axis" (%a, %k) : TensorHandle<Float>
              %x = integer_literal 1 : Builtin.Int64
              %i = struct (%x) : Int
              %r2 = builtin "__tfop_Op,$in,axis" (%a, %i) : TensorHandle<Float>
              %r3 = builtin "__tfop_Op,$in,depth" (%a, %k) : TensorHandle<Float>
            }
            "#,
        );
        let func = &result.functions[0];
        assert_eq!(func.stats.decoded, 3);
        assert_eq!(func.ops.len(), 1);
        assert_eq!(func.stats.canonicalized, 1);
        let found: Vec<_> = func.diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(found, vec![Some(codes::E0200), Some(codes::E0200)]);
    }

    #[test]
    fn structural_errors_stop_the_function() {
        let (_, result) = run(
            r#"
            func @f {
              %a = argument 0 : TensorHandle<Float>
              %r1 = builtin "__tfop_Add,$in,$in" (%a) : TensorHandle<Float>
              %r2 = builtin "__tfop_Neg,$in" (%a) : TensorHandle<Float>
            }
            func @g {
              %a = argument 0 : TensorHandle<Float>
              %r = builtin "__tfop_Neg,$in" (%a) : TensorHandle<Float>
            }
            "#,
        );
        assert_eq!(result.functions[0].diagnostics.len(), 1);
        assert!(result.functions[0].ops.is_empty());
        assert_eq!(result.functions[1].ops.len(), 1);
        assert!(result.has_errors());
    }

    #[test]
    fn factory_output_is_reported_as_an_op() {
        let (module, result) = run(
            r#"
            global @scalars {
              %0 = float_literal 1.0 : Builtin.FPIEEE32
              %1 = object (%0) : _ContiguousArrayStorage<Float>
            }
            func @f {
              %g = global_value @scalars : _ContiguousArrayStorage<Float>
              %arr = struct (%g) : Array<Float>
              %t = apply @__tf_tensor_from_scalars_1d (%arr) : TensorHandle<Float>
              return (%t)
            }
            "#,
        );
        assert_eq!(result.stats.factories_lowered, 1);
        assert_eq!(result.stats.decoded, 1);
        assert_eq!(result.stats.canonicalized, 0);
        let op = &result.functions[0].ops[0];
        assert_eq!(op.op_name, "Const");
        let func = &module.functions[0];
        assert!(!func
            .body()
            .iter()
            .any(|&i| matches!(func.kind(i), InstKind::Apply { .. })));
    }

    #[test]
    fn provenance_is_deterministic() {
        let a = compute_provenance("func @f { return () }", "x");
        let b = compute_provenance("func @f { return () }", "x");
        assert_eq!(a.source_hash, b.source_hash);
        assert_eq!(a.source_hash_hex().len(), 64);
        assert_ne!(a.source_hash, compute_provenance("", "x").source_hash);
        assert!(a.to_json().contains("\"output_hash\""));
    }
}
