//! Circular and hyperbolic functions with their inverses.

use num_complex::Complex64;

use super::{DerivativeRule, FunctionDef, FunctionRegistry};
use crate::node::Node;

fn square(u: &Node) -> Node {
    u.clone().pow(Node::constant(2.0))
}

fn unary(
    name: &str,
    real: fn(f64) -> f64,
    complex: fn(Complex64) -> Complex64,
    derivative: impl Fn(&Node) -> Node + Send + Sync + 'static,
) -> FunctionDef {
    FunctionDef::new(name, 1)
        .with_real(move |args, _| real(args[0]))
        .with_complex(move |args, _| complex(args[0]))
        .with_derivative(DerivativeRule::chain(derivative))
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    // d/dx(sin(f)) = cos(f) * df/dx
    registry.register(unary("sin", f64::sin, Complex64::sin, |u| {
        Node::call("cos", [u.clone()])
    }));
    // d/dx(cos(f)) = -sin(f) * df/dx
    registry.register(unary("cos", f64::cos, Complex64::cos, |u| {
        -Node::call("sin", [u.clone()])
    }));
    // d/dx(tan(f)) = 1/cos(f)^2 * df/dx
    registry.register(unary("tan", f64::tan, Complex64::tan, |u| {
        Node::one() / square(&Node::call("cos", [u.clone()]))
    }));
    registry.register(unary("asin", f64::asin, Complex64::asin, |u| {
        Node::one() / Node::call("sqrt", [Node::one() - square(u)])
    }));
    registry.register(unary("acos", f64::acos, Complex64::acos, |u| {
        Node::constant(-1.0) / Node::call("sqrt", [Node::one() - square(u)])
    }));
    registry.register(unary("atan", f64::atan, Complex64::atan, |u| {
        Node::one() / (Node::one() + square(u))
    }));

    registry.register(unary("sinh", f64::sinh, Complex64::sinh, |u| {
        Node::call("cosh", [u.clone()])
    }));
    registry.register(unary("cosh", f64::cosh, Complex64::cosh, |u| {
        Node::call("sinh", [u.clone()])
    }));
    // d/dx(tanh(f)) = (1 - tanh(f)^2) * df/dx
    registry.register(unary("tanh", f64::tanh, Complex64::tanh, |u| {
        Node::one() - square(&Node::call("tanh", [u.clone()]))
    }));
    registry.register(unary("asinh", f64::asinh, Complex64::asinh, |u| {
        Node::one() / Node::call("sqrt", [square(u) + Node::one()])
    }));
    registry.register(unary("acosh", f64::acosh, Complex64::acosh, |u| {
        Node::one() / Node::call("sqrt", [square(u) - Node::one()])
    }));
    registry.register(unary("atanh", f64::atanh, Complex64::atanh, |u| {
        Node::one() / (Node::one() - square(u))
    }));

    // d(atan2(y, x)) = (x dy - y dx) / (x^2 + y^2)
    registry.register(
        FunctionDef::new("atan2", 2)
            .with_real(|args, _| args[0].atan2(args[1]))
            .with_complex(|args, _| Complex64::new(args[0].re.atan2(args[1].re), 0.0))
            .with_derivative(DerivativeRule::partials(|args| {
                let (y, x) = (&args[0], &args[1]);
                let denominator = square(x) + square(y);
                vec![
                    Some(x.clone() / denominator.clone()),
                    Some(-y.clone() / denominator),
                ]
            })),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_real_and_complex_agree_on_real_axis() {
        let registry = FunctionRegistry::default();
        for name in ["sin", "cos", "tan", "atan", "sinh", "cosh", "tanh", "asinh"] {
            let def = registry.get(name).unwrap();
            let real = (def.real().unwrap())(&[0.3], 0.0);
            let complex = (def.complex().unwrap())(&[Complex64::new(0.3, 0.0)], 0.0);
            assert_relative_eq!(real, complex.re, max_relative = 1e-12);
            assert_relative_eq!(complex.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_atan2_partials() {
        let registry = FunctionRegistry::default();
        let Some(DerivativeRule::Partials(partials)) = registry.get("atan2").unwrap().derivative()
        else {
            panic!("atan2 should have partial derivatives");
        };
        let partials = partials(&[Node::constant(3.0), Node::constant(4.0)]);
        assert_eq!(partials[0], Some(Node::constant(4.0 / 25.0)));
        assert_eq!(partials[1], Some(Node::constant(-3.0 / 25.0)));
    }
}
