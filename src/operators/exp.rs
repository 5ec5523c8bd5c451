//! The exponential function.

use super::{DerivativeRule, FunctionDef, FunctionRegistry};
use crate::node::Node;

/// Registers `exp`, which is its own derivative: d/dx(e^f) = e^f * df/dx.
pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register(
        FunctionDef::new("exp", 1)
            .with_real(|args, _| args[0].exp())
            .with_complex(|args, _| args[0].exp())
            .with_derivative(DerivativeRule::chain(|u| Node::call("exp", [u.clone()]))),
    );
}
