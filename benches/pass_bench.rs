use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tfopc::*;

// Synthetic functions: N operations, each with an inline array attribute in a
// static initializer, a wrapped scalar attribute and a 1-D factory call.

fn generate_function(n_ops: usize) -> String {
    let mut src = String::new();

    for i in 0..n_ops {
        src.push_str(&format!(
            "global @strides_{i} {{\n  %0 = integer_literal 1 : Builtin.Int64\n  \
             %1 = integer_literal 2 : Builtin.Int64\n  \
             %2 = object (%0, %1) : _ContiguousArrayStorage<Int32>\n}}\n",
            i = i
        ));
    }

    src.push_str("func @main {\n  %x = argument 0 : TensorHandle<Float>\n");
    for i in 0..n_ops {
        src.push_str(&format!(
            "  %g{i} = global_value @strides_{i} : _ContiguousArrayStorage<Int32>\n  \
             %s{i} = struct (%g{i}) : Array<Int32>\n  \
             %l{i} = integer_literal {i} : Builtin.Int64\n  \
             %w{i} = struct (%l{i}) : Int\n  \
             %t{i} = apply @__tf_tensor_from_scalars_1d (%s{i}) : TensorHandle<Int32>\n  \
             %r{i} = builtin \"__tfop_Conv,$in,strides,axis\" (%x, %s{i}, %w{i}) : TensorHandle<Float>\n",
            i = i
        ));
    }
    src.push_str("  return ()\n}\n");
    src
}

fn build(source: &str) -> ir::Module {
    let built = build::parse_module("bench.tfir", source);
    assert!(
        !diag::has_errors(&built.diagnostics),
        "benchmark function must build"
    );
    built.module
}

// Front end: lex, parse, build.
fn bench_parse_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/parse_latency");

    for n_ops in [1_usize, 10, 100] {
        let source = generate_function(n_ops);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}ops", n_ops)),
            &source,
            |b, source| {
                b.iter(|| {
                    let r = build::parse_module("bench.tfir", black_box(source.as_str()));
                    black_box(&r.module);
                });
            },
        );
    }

    group.finish();
}

// Pass only: factory lowering plus decode → validate → canonicalize.
fn bench_pass_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/pass_latency");
    let options = pipeline::PassOptions::default();

    for n_ops in [1_usize, 10, 100] {
        let module = build(&generate_function(n_ops));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}ops", n_ops)),
            &module,
            |b, module| {
                b.iter_batched(
                    || module.clone(),
                    |mut module| {
                        let result = pipeline::run_module(&mut module, &options, |_, _| {});
                        black_box(result.stats);
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

// Fixed point: running the pass over already-canonical IR.
fn bench_idempotent_rerun(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/idempotent_rerun");
    let options = pipeline::PassOptions::default();

    let mut module = build(&generate_function(100));
    pipeline::run_module(&mut module, &options, |_, _| {});

    group.bench_function("100ops", |b| {
        b.iter_batched(
            || module.clone(),
            |mut module| {
                let result = pipeline::run_module(&mut module, &options, |_, _| {});
                black_box(result.stats);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_latency,
    bench_pass_latency,
    bench_idempotent_rerun,
);
criterion_main!(benches);
