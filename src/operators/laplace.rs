//! Time-derivative and time-integral operators.
//!
//! `ddt` and `idt` carry no real implementation: a transient simulator registers its own
//! integration-method specific versions. The complex backend evaluates them in the Laplace
//! domain when it is given the Laplace variable. Both are linear, so their derivative is the
//! operator applied to the derivative of the argument.

use super::{DerivativeRule, FunctionDef, FunctionRegistry};
use crate::node::Node;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    for name in ["ddt", "idt"] {
        registry.register(
            FunctionDef::new(name, 1).with_derivative(DerivativeRule::direct(
                move |_, derivatives| {
                    derivatives[0]
                        .clone()
                        .map(|derivative| Node::call(name, [derivative]))
                },
            )),
        );
    }
}
