//! Square root and Euclidean norm.

use super::{DerivativeRule, FunctionDef, FunctionRegistry};
use crate::node::Node;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    // d/dx(sqrt(f)) = 0.5/sqrt(f) * df/dx
    registry.register(
        FunctionDef::new("sqrt", 1)
            .with_real(|args, _| args[0].sqrt())
            .with_complex(|args, _| args[0].sqrt())
            .with_derivative(DerivativeRule::chain(|u| {
                Node::constant(0.5) / Node::call("sqrt", [u.clone()])
            })),
    );

    // d(hypot(x, y)) = (x dx + y dy) / hypot(x, y)
    registry.register(
        FunctionDef::new("hypot", 2)
            .with_real(|args, _| args[0].hypot(args[1]))
            .with_complex(|args, _| (args[0] * args[0] + args[1] * args[1]).sqrt())
            .with_derivative(DerivativeRule::partials(|args| {
                let norm = Node::call("hypot", [args[0].clone(), args[1].clone()]);
                vec![
                    Some(args[0].clone() / norm.clone()),
                    Some(args[1].clone() / norm),
                ]
            })),
    );
}
