//! Logarithms.
//!
//! `log` and `ln` are both the natural logarithm, `log10` is base ten.

use std::f64::consts::LN_10;

use super::{DerivativeRule, FunctionDef, FunctionRegistry};
use crate::node::Node;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    for name in ["log", "ln"] {
        // d/dx(ln(f)) = 1/f * df/dx
        registry.register(
            FunctionDef::new(name, 1)
                .with_real(|args, _| args[0].ln())
                .with_complex(|args, _| args[0].ln())
                .with_derivative(DerivativeRule::chain(|u| Node::one() / u.clone())),
        );
    }

    registry.register(
        FunctionDef::new("log10", 1)
            .with_real(|args, _| args[0].log10())
            .with_complex(|args, _| args[0].log10())
            .with_derivative(DerivativeRule::chain(|u| {
                Node::one() / (u.clone() * Node::constant(LN_10))
            })),
    );
}
