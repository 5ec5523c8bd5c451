//! Power functions and the numeric kernels behind the `^` operator.
//!
//! Integer exponents are evaluated by repeated squaring. Non-integer exponents of real bases use
//! the magnitude of the base, so the result stays real. Wherever a base could reach zero under
//! a negative or fractional exponent, it is nudged away from zero by the fudge factor.

use std::ops::{Div, Mul};

use num_complex::Complex64;
use num_traits::One;

use super::{DerivativeRule, FunctionDef, FunctionRegistry};
use crate::node::Node;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register(
        FunctionDef::new("pow", 2)
            .with_real(|args, fudge| real_pow(args[0], args[1], fudge))
            .with_complex(|args, fudge| complex_pow(args[0], args[1], fudge))
            .with_derivative(DerivativeRule::partials(|args| {
                power_partials(&args[0], &args[1]).to_vec()
            })),
    );

    // Sign-preserving power: pwr(f, g) = sgn(f) * |f|^g
    registry.register(
        FunctionDef::new("pwr", 2)
            .with_real(|args, fudge| real_pwr(args[0], args[1], fudge))
            .with_complex(|args, fudge| {
                let magnitude = Complex64::new(args[0].re.abs(), args[0].im);
                complex_pow(magnitude, args[1], fudge) * super::piecewise::sign(args[0].re)
            })
            .with_derivative(DerivativeRule::partials(|args| {
                let (f, g) = (&args[0], &args[1]);
                let magnitude = Node::call("abs", [f.clone()]);
                // d/df = g * |f|^(g-1)   (the sign cancels against d|f|/df)
                let d_base = g.clone() * magnitude.clone().pow(g.clone() - Node::one());
                let d_exponent = match g.as_constant() {
                    Some(_) => None,
                    None => Some(
                        Node::call("log", [magnitude])
                            * Node::call("pwr", [f.clone(), g.clone()]),
                    ),
                };
                vec![Some(d_base), d_exponent]
            })),
    );
}

/// Partial derivatives of `f ^ g` with respect to `f` and `g`.
///
/// d/df = g * f^(g-1); d/dg = ln(f) * f^g. The second partial is omitted for constant `g`.
///
/// A real base under a constant non-integer exponent evaluates as `|f|^e`, whose derivative is
/// `e * sgn(f) * |f|^(e-1)`. That is written `e * f^e / f`, which also equals `e * f^(e-1)` for
/// the principal complex power.
pub(crate) fn power_partials(f: &Node, g: &Node) -> [Option<Node>; 2] {
    let d_base = match g.as_constant() {
        Some(e) if integer_exponent(e).is_some() => {
            Node::constant(e) * f.clone().pow(Node::constant(e - 1.0))
        }
        Some(e) => Node::constant(e) * (f.clone().pow(g.clone()) / f.clone()),
        None => g.clone() * f.clone().pow(g.clone() - Node::one()),
    };
    let d_exponent = match g.as_constant() {
        Some(_) => None,
        None => Some(Node::call("log", [f.clone()]) * f.clone().pow(g.clone())),
    };
    [Some(d_base), d_exponent]
}

/// Returns the exponent as an `i32` if it is integral and in range.
pub fn integer_exponent(exponent: f64) -> Option<i32> {
    if exponent.fract() == 0.0 && exponent.abs() <= i32::MAX as f64 {
        Some(exponent as i32)
    } else {
        None
    }
}

/// `base ^ exponent` by repeated squaring.
///
/// 0, 1 and 2 are answered directly. Negative exponents take the reciprocal of the positive
/// power; callers fudge the base first when it may be zero.
pub fn powi<T>(base: T, exponent: i32) -> T
where
    T: Copy + One + Mul<Output = T> + Div<Output = T>,
{
    match exponent {
        0 => T::one(),
        1 => base,
        2 => base * base,
        n if n < 0 => T::one() / powu(base, n.unsigned_abs()),
        n => powu(base, n.unsigned_abs()),
    }
}

fn powu<T>(mut base: T, mut exponent: u32) -> T
where
    T: Copy + One + Mul<Output = T>,
{
    let mut result = T::one();
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = result * base;
        }
        exponent >>= 1;
        if exponent > 0 {
            base = base * base;
        }
    }
    result
}

/// Moves `value` away from zero by `fudge` when it is closer than `fudge`, keeping its sign.
/// Zero itself moves to `+fudge`.
pub fn fudge_real(value: f64, fudge: f64) -> f64 {
    if value.abs() >= fudge {
        value
    } else if value < 0.0 {
        value - fudge
    } else {
        value + fudge
    }
}

/// Complex counterpart of [`fudge_real`]: shifts the real part when the modulus is below `fudge`.
pub fn fudge_complex(value: Complex64, fudge: f64) -> Complex64 {
    if value.norm() >= fudge {
        value
    } else {
        Complex64::new(fudge_real(value.re, fudge), value.im)
    }
}

/// Real power with the fudge rules applied.
///
/// Integer exponents keep the sign of the base; other exponents use `|base|`.
pub fn real_pow(base: f64, exponent: f64, fudge: f64) -> f64 {
    match integer_exponent(exponent) {
        Some(n) if n < 0 => powi(fudge_real(base, fudge), n),
        Some(n) => powi(base, n),
        None => fudge_real(base.abs(), fudge).powf(exponent),
    }
}

/// `sgn(base) * |base| ^ exponent`
pub fn real_pwr(base: f64, exponent: f64, fudge: f64) -> f64 {
    super::piecewise::sign(base) * real_pow(base.abs(), exponent, fudge)
}

/// Complex power: squaring for real integer exponents, the principal value otherwise.
pub fn complex_pow(base: Complex64, exponent: Complex64, fudge: f64) -> Complex64 {
    match (exponent.im == 0.0).then(|| integer_exponent(exponent.re)).flatten() {
        Some(n) if n < 0 => powi(fudge_complex(base, fudge), n),
        Some(n) => powi(base, n),
        None => fudge_complex(base, fudge).powc(exponent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_powi_matches_powf() {
        for base in [-3.5, -1.0, 0.5, 1.0, 2.0, 7.25] {
            for exponent in -9..=9 {
                assert_relative_eq!(
                    powi(base, exponent),
                    f64::powi(base, exponent),
                    max_relative = 1e-12
                );
            }
        }
    }

    #[test]
    fn test_integer_exponent() {
        assert_eq!(integer_exponent(3.0), Some(3));
        assert_eq!(integer_exponent(-2.0), Some(-2));
        assert_eq!(integer_exponent(2.5), None);
        assert_eq!(integer_exponent(1e12), None);
        assert_eq!(integer_exponent(f64::NAN), None);
    }

    #[test]
    fn test_fudge() {
        assert_eq!(fudge_real(0.0, 1e-20), 1e-20);
        assert_eq!(fudge_real(-1e-30, 1e-20), -1e-30 - 1e-20);
        assert_eq!(fudge_real(2.0, 1e-20), 2.0);
        assert_eq!(fudge_complex(Complex64::new(0.0, 0.0), 1e-3).re, 1e-3);
    }

    #[test]
    fn test_real_pow() {
        assert_eq!(real_pow(-2.0, 3.0, 1e-20), -8.0);
        assert_eq!(real_pow(-4.0, 0.5, 1e-20), 2.0);
        assert!(real_pow(0.0, -1.0, 1e-20).is_finite());
        assert!(real_pow(0.0, -0.5, 1e-20).is_finite());
        assert_eq!(real_pwr(-4.0, 0.5, 1e-20), -2.0);
        assert_eq!(real_pwr(0.0, 2.0, 1e-20), 0.0);
    }

    #[test]
    fn test_complex_pow() {
        let j = Complex64::new(0.0, 1.0);
        let squared = complex_pow(j, Complex64::new(2.0, 0.0), 1e-20);
        assert_relative_eq!(squared.re, -1.0);
        assert_relative_eq!(squared.im, 0.0);

        let root = complex_pow(Complex64::new(-4.0, 0.0), Complex64::new(0.5, 0.0), 1e-20);
        assert_relative_eq!(root.im, 2.0, max_relative = 1e-12);
    }

    #[test]
    fn test_power_partials() {
        let x = Node::variable(crate::node::VariableNode::voltage("x"));
        let [d_base, d_exponent] = power_partials(&x, &Node::constant(3.0));
        assert_eq!(
            d_base,
            Some(Node::constant(3.0) * x.clone().pow(Node::constant(2.0)))
        );
        assert!(d_exponent.is_none());

        let [_, d_exponent] = power_partials(&Node::constant(2.0), &x);
        assert!(d_exponent.is_some());

        let [d_base, _] = power_partials(&x, &Node::constant(2.5));
        assert_eq!(
            d_base.unwrap().to_string(),
            "(2.5 * ((V(x) ^ 2.5) / V(x)))"
        );
    }
}
