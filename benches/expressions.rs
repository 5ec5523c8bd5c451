//! Expression Benchmarks
//!
//! This benchmark suite measures each stage of the pipeline for a set of behavioral
//! expressions of growing complexity, and compares compiled evaluation against hand-written
//! Rust.
//!
//! ## Benchmark Structure
//!
//! ### 1. Evaluation (`benchmark_evaluation`)
//! - **Direct**: Hand-written Rust functions reading the same shared values
//! - **Compiled**: Evaluators produced by the builder; building is excluded
//!
//! ### 2. Jacobian (`benchmark_gradient`)
//! Evaluation of all compiled partial derivatives of each expression.
//!
//! ### 3. Pipeline Stages (`benchmark_pipeline`)
//! Parsing, symbolic differentiation and building measured separately, since they are the
//! one-time setup cost a simulator pays per behavioral source.
//!
//! ## Usage
//!
//! Run with: `cargo bench --bench expressions`

use std::collections::HashSet;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use spice_expr::prelude::*;

/// Test expressions with their names
const EXPRESSIONS: [(&str, &str); 8] = [
    ("scaled", "V(in) * 10"),
    ("linear", "2.2 * V(a) + 1.1 * V(b)"),
    ("polynomial", "V(a)^3 + 2*V(a)^2 - 5*V(a) + 1"),
    ("rational", "(V(a)^2 - V(b)) / (V(b)^2 + 3*V(b) + 2)"),
    ("diode", "1e-14 * (exp(V(a,b) / 25.85m) - 1)"),
    ("selection", "limit(V(a) * 2, 0, 5) + max(V(b), I(Vs)) + (V(a) > 1 ? V(a) : 1)"),
    ("transcendental", "sqrt(1 + V(a)^2) * atan(V(b)) + sin(V(a) * V(b))"),
    (
        "very_complex",
        "(V(a)^3 + V(b)^2*I(Vs) - 2*V(a)*V(b) + I(Vs)) / ((V(a)+V(b))*(V(b)+I(Vs))*(V(a)+I(Vs)) + 1) + sqrt(V(a)*V(b)*I(Vs))",
    ),
];

/// Shared values all expressions read from
fn values() -> (VariableMap<f64>, [SharedValue<f64>; 5]) {
    let mut values = VariableMap::new();
    let cells = [
        values.insert(VariableNode::voltage("in"), 0.5),
        values.insert(VariableNode::voltage("a"), 1.2),
        values.insert(VariableNode::voltage("b"), 0.7),
        values.insert(VariableNode::voltage_between("a", "b"), 0.6),
        values.insert(VariableNode::current("Vs"), 0.3),
    ];
    (values, cells)
}

/// Hand-written counterparts of `EXPRESSIONS`, reading the same cells.
fn direct(index: usize, cells: &[SharedValue<f64>; 5]) -> f64 {
    let [input, a, b, ab, vs] = cells.each_ref().map(SharedValue::get);
    match index {
        0 => input * 10.0,
        1 => 2.2 * a + 1.1 * b,
        2 => a.powi(3) + 2.0 * a * a - 5.0 * a + 1.0,
        3 => (a * a - b) / (b * b + 3.0 * b + 2.0),
        4 => 1e-14 * ((ab / 25.85e-3).exp() - 1.0),
        5 => {
            (a * 2.0).clamp(0.0, 5.0) + b.max(vs) + if a > 1.0 { a } else { 1.0 }
        }
        6 => (1.0 + a * a).sqrt() * b.atan() + (a * b).sin(),
        7 => {
            (a.powi(3) + b * b * vs - 2.0 * a * b + vs) / ((a + b) * (b + vs) * (a + vs) + 1.0)
                + (a * b * vs).sqrt()
        }
        _ => unreachable!(),
    }
}

fn benchmark_evaluation(c: &mut Criterion) {
    let (mut values, cells) = values();
    let builder = Builder::new(RealBackend::new());
    let equations = EXPRESSIONS
        .iter()
        .map(|(_, text)| {
            Equation::new(text, &builder, &mut values).expect("Failed to create equation")
        })
        .collect::<Vec<_>>();

    let mut group = c.benchmark_group("Evaluation");
    for (i, (name, _)) in EXPRESSIONS.iter().enumerate() {
        group.bench_with_input(BenchmarkId::new("Direct", name), &i, |b, &i| {
            b.iter(|| black_box(direct(black_box(i), &cells)))
        });

        let fun = equations[i].fun().clone();
        group.bench_function(BenchmarkId::new("Compiled", name), |b| {
            b.iter(|| black_box(fun()))
        });
    }
    group.finish();
}

fn benchmark_gradient(c: &mut Criterion) {
    let (mut values, _cells) = values();
    let builder = Builder::new(RealBackend::new());

    let mut group = c.benchmark_group("Gradient");
    for (name, text) in EXPRESSIONS {
        let equation = Equation::new(text, &builder, &mut values).expect("Failed to create equation");
        if !equation.is_differentiable() {
            continue;
        }
        group.bench_function(name, |b| b.iter(|| black_box(equation.gradient())));
    }
    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let (mut values, _cells) = values();
    let parser = Parser::new();
    let differentiator = Differentiator::new();
    let builder = Builder::new(RealBackend::new());

    let mut group = c.benchmark_group("Pipeline");
    for (name, text) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::new("Parse", name), text, |b, text| {
            b.iter(|| black_box(parser.parse(black_box(text))))
        });

        let node = parser.parse(text).expect("Failed to parse expression");
        let variables: HashSet<VariableNode> = NodeFinder::new().build(&node).into_iter().collect();
        group.bench_with_input(BenchmarkId::new("Derive", name), &node, |b, node| {
            b.iter(|| black_box(differentiator.derive(node, &variables)))
        });

        group.bench_with_input(BenchmarkId::new("Build", name), &node, |b, node| {
            b.iter(|| black_box(builder.build(node, &mut values)))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_evaluation, benchmark_gradient, benchmark_pipeline);
criterion_main!(benches);
