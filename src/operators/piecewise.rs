//! Piecewise functions: absolute value, sign, rounding and selections.
//!
//! Rounding functions and `sgn` are piecewise constant, so their derivative is zero.
//! `min`, `max` and `limit` differentiate to a conditional that picks the derivative of the
//! selected argument. Complex arguments are compared by their real parts.

use num_complex::Complex64;

use super::{DerivativeRule, FunctionDef, FunctionRegistry};
use crate::node::{BinaryKind, Node};

/// Signum with `sign(0) = 0`.
pub fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn min_real(a: f64, b: f64) -> f64 {
    if a < b {
        a
    } else {
        b
    }
}

fn max_real(a: f64, b: f64) -> f64 {
    if a > b {
        a
    } else {
        b
    }
}

fn min_complex(a: Complex64, b: Complex64) -> Complex64 {
    if a.re < b.re {
        a
    } else {
        b
    }
}

fn max_complex(a: Complex64, b: Complex64) -> Complex64 {
    if a.re > b.re {
        a
    } else {
        b
    }
}

fn derivative_or_zero(derivative: &Option<Node>) -> Node {
    derivative.clone().unwrap_or_else(Node::zero)
}

fn rounding(name: &str, real: fn(f64) -> f64) -> FunctionDef {
    FunctionDef::new(name, 1)
        .with_real(move |args, _| real(args[0]))
        .with_complex(move |args, _| Complex64::new(real(args[0].re), 0.0))
        .with_derivative(DerivativeRule::Constant)
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    // d/dx(|f|) = sgn(f) * df/dx
    registry.register(
        FunctionDef::new("abs", 1)
            .with_real(|args, _| args[0].abs())
            .with_complex(|args, _| Complex64::new(args[0].norm(), 0.0))
            .with_derivative(DerivativeRule::chain(|u| Node::call("sgn", [u.clone()]))),
    );

    registry.register(rounding("sgn", sign));
    registry.register(rounding("floor", f64::floor));
    registry.register(rounding("ceil", f64::ceil));
    registry.register(rounding("round", f64::round));
    registry.register(rounding("trunc", f64::trunc));

    // d(min(a, b)) = a < b ? da : db
    registry.register(
        FunctionDef::new("min", 2)
            .with_real(|args, _| min_real(args[0], args[1]))
            .with_complex(|args, _| min_complex(args[0], args[1]))
            .with_derivative(DerivativeRule::direct(|args, derivatives| {
                Some(Node::select(
                    Node::binary(BinaryKind::Lt, args[0].clone(), args[1].clone()),
                    derivative_or_zero(&derivatives[0]),
                    derivative_or_zero(&derivatives[1]),
                ))
            })),
    );

    // d(max(a, b)) = a > b ? da : db
    registry.register(
        FunctionDef::new("max", 2)
            .with_real(|args, _| max_real(args[0], args[1]))
            .with_complex(|args, _| max_complex(args[0], args[1]))
            .with_derivative(DerivativeRule::direct(|args, derivatives| {
                Some(Node::select(
                    Node::binary(BinaryKind::Gt, args[0].clone(), args[1].clone()),
                    derivative_or_zero(&derivatives[0]),
                    derivative_or_zero(&derivatives[1]),
                ))
            })),
    );

    // limit(x, lo, hi) = min(max(x, lo), hi)
    // d = max(x, lo) < hi ? (x > lo ? dx : dlo) : dhi
    registry.register(
        FunctionDef::new("limit", 3)
            .with_real(|args, _| min_real(max_real(args[0], args[1]), args[2]))
            .with_complex(|args, _| min_complex(max_complex(args[0], args[1]), args[2]))
            .with_derivative(DerivativeRule::direct(|args, derivatives| {
                let (x, lo, hi) = (&args[0], &args[1], &args[2]);
                let clamped_low = Node::call("max", [x.clone(), lo.clone()]);
                let inner = Node::select(
                    Node::binary(BinaryKind::Gt, x.clone(), lo.clone()),
                    derivative_or_zero(&derivatives[0]),
                    derivative_or_zero(&derivatives[1]),
                );
                Some(Node::select(
                    Node::binary(BinaryKind::Lt, clamped_low, hi.clone()),
                    inner,
                    derivative_or_zero(&derivatives[2]),
                ))
            })),
    );
}
