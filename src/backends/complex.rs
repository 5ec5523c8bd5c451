use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;

use crate::backends::{Backend, DEFAULT_FUDGE_FACTOR};
use crate::node::BinaryKind;
use crate::operators::pow::{complex_pow, fudge_complex, powi};
use crate::operators::{FunctionDef, FunctionImpl};
use crate::types::ValueSource;

/// `Complex64` evaluation, used for small-signal (AC) analysis.
///
/// Relational operators compare real parts, except `==` and `!=` which compare both parts.
/// A value is true when its real part is non-zero.
///
/// With a Laplace source configured, `ddt(x)` evaluates to `s * x` and `idt(x)` to `x / s`,
/// where `s` is read from the source on every call.
#[derive(Clone)]
pub struct ComplexBackend {
    fudge: f64,
    laplace: Option<ValueSource<Complex64>>,
}

impl Default for ComplexBackend {
    fn default() -> Self {
        Self {
            fudge: DEFAULT_FUDGE_FACTOR,
            laplace: None,
        }
    }
}

impl fmt::Debug for ComplexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplexBackend")
            .field("fudge", &self.fudge)
            .field("laplace", &self.laplace.is_some())
            .finish()
    }
}

impl ComplexBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fudge_factor(mut self, fudge: f64) -> Self {
        self.fudge = fudge;
        self
    }

    /// Sets the source of the complex frequency `s`.
    pub fn with_laplace(mut self, laplace: ValueSource<Complex64>) -> Self {
        self.laplace = Some(laplace);
        self
    }

    fn laplace_implementation(&self, name: &str) -> Option<FunctionImpl<Complex64>> {
        let s = self.laplace.clone()?;
        let implementation: FunctionImpl<Complex64> = match name.to_lowercase().as_str() {
            "ddt" => Arc::new(move |args: &[Complex64], _: f64| s() * args[0]),
            "idt" => Arc::new(move |args: &[Complex64], fudge: f64| {
                args[0] / fudge_complex(s(), fudge)
            }),
            _ => return None,
        };
        Some(implementation)
    }
}

impl Backend for ComplexBackend {
    type Value = Complex64;

    const NAME: &'static str = "complex";

    fn fudge(&self) -> f64 {
        self.fudge
    }

    fn implementation(&self, def: &FunctionDef) -> Option<FunctionImpl<Complex64>> {
        self.laplace_implementation(def.name())
            .or_else(|| def.complex().cloned())
    }

    fn from_f64(value: f64) -> Complex64 {
        Complex64::new(value, 0.0)
    }

    fn is_true(value: Complex64) -> bool {
        value.re != 0.0
    }

    fn add(a: Complex64, b: Complex64) -> Complex64 {
        a + b
    }

    fn sub(a: Complex64, b: Complex64) -> Complex64 {
        a - b
    }

    fn mul(a: Complex64, b: Complex64) -> Complex64 {
        a * b
    }

    fn div(a: Complex64, b: Complex64, fudge: f64) -> Complex64 {
        a / fudge_complex(b, fudge)
    }

    fn rem(a: Complex64, b: Complex64) -> Complex64 {
        a % b
    }

    fn neg(a: Complex64) -> Complex64 {
        -a
    }

    fn pow(a: Complex64, b: Complex64, fudge: f64) -> Complex64 {
        complex_pow(a, b, fudge)
    }

    fn powi(a: Complex64, n: i32, fudge: f64) -> Complex64 {
        if n < 0 {
            powi(fudge_complex(a, fudge), n)
        } else {
            powi(a, n)
        }
    }

    fn compare(kind: BinaryKind, a: Complex64, b: Complex64) -> bool {
        match kind {
            BinaryKind::Eq => a == b,
            BinaryKind::Ne => a != b,
            BinaryKind::Lt => a.re < b.re,
            BinaryKind::Le => a.re <= b.re,
            BinaryKind::Gt => a.re > b.re,
            BinaryKind::Ge => a.re >= b.re,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::FunctionRegistry;
    use approx::assert_relative_eq;

    #[test]
    fn test_comparisons_use_real_parts() {
        let a = Complex64::new(1.0, 5.0);
        let b = Complex64::new(2.0, -5.0);
        assert!(ComplexBackend::compare(BinaryKind::Lt, a, b));
        assert!(ComplexBackend::compare(BinaryKind::Ge, b, a));
        assert!(!ComplexBackend::compare(
            BinaryKind::Eq,
            a,
            Complex64::new(1.0, 0.0)
        ));
        assert!(ComplexBackend::compare(BinaryKind::Eq, a, a));
        assert!(!ComplexBackend::is_true(Complex64::new(0.0, 1.0)));
    }

    #[test]
    fn test_division_is_fudged_near_zero() {
        let result = ComplexBackend::div(Complex64::new(1.0, 1.0), Complex64::new(0.0, 0.0), 1e-20);
        assert!(result.re.is_finite() && result.im.is_finite());
    }

    #[test]
    fn test_laplace_operators() {
        let registry = FunctionRegistry::default();
        let ddt = registry.get("ddt").unwrap();
        let idt = registry.get("idt").unwrap();

        assert!(ComplexBackend::new().implementation(ddt).is_none());

        let s = Complex64::new(0.0, 2.0 * std::f64::consts::PI * 1e3);
        let backend = ComplexBackend::new().with_laplace(Arc::new(move || s));
        let x = Complex64::new(2.0, 0.0);

        let derivative = (backend.implementation(ddt).unwrap())(&[x], backend.fudge());
        assert_relative_eq!(derivative.im, 2.0 * s.im);

        let integral = (backend.implementation(idt).unwrap())(&[x], backend.fudge());
        assert_relative_eq!((integral * s).re, 2.0, max_relative = 1e-12);

        // Other functions are unaffected
        assert!(backend.implementation(registry.get("sin").unwrap()).is_some());
    }
}
