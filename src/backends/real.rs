use crate::backends::{Backend, DEFAULT_FUDGE_FACTOR};
use crate::node::BinaryKind;
use crate::operators::pow::{fudge_real, powi, real_pow};
use crate::operators::{FunctionDef, FunctionImpl};

/// `f64` evaluation, used for operating-point and transient analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealBackend {
    fudge: f64,
}

impl Default for RealBackend {
    fn default() -> Self {
        Self {
            fudge: DEFAULT_FUDGE_FACTOR,
        }
    }
}

impl RealBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fudge_factor(mut self, fudge: f64) -> Self {
        self.fudge = fudge;
        self
    }
}

impl Backend for RealBackend {
    type Value = f64;

    const NAME: &'static str = "real";

    fn fudge(&self) -> f64 {
        self.fudge
    }

    fn implementation(&self, def: &FunctionDef) -> Option<FunctionImpl<f64>> {
        def.real().cloned()
    }

    fn from_f64(value: f64) -> f64 {
        value
    }

    fn is_true(value: f64) -> bool {
        value != 0.0
    }

    fn add(a: f64, b: f64) -> f64 {
        a + b
    }

    fn sub(a: f64, b: f64) -> f64 {
        a - b
    }

    fn mul(a: f64, b: f64) -> f64 {
        a * b
    }

    fn div(a: f64, b: f64, fudge: f64) -> f64 {
        a / fudge_real(b, fudge)
    }

    fn rem(a: f64, b: f64) -> f64 {
        a % b
    }

    fn neg(a: f64) -> f64 {
        -a
    }

    fn pow(a: f64, b: f64, fudge: f64) -> f64 {
        real_pow(a, b, fudge)
    }

    fn powi(a: f64, n: i32, fudge: f64) -> f64 {
        if n < 0 {
            powi(fudge_real(a, fudge), n)
        } else {
            powi(a, n)
        }
    }

    fn compare(kind: BinaryKind, a: f64, b: f64) -> bool {
        match kind {
            BinaryKind::Eq => a == b,
            BinaryKind::Ne => a != b,
            BinaryKind::Lt => a < b,
            BinaryKind::Le => a <= b,
            BinaryKind::Gt => a > b,
            BinaryKind::Ge => a >= b,
            _ => false,
        }
    }
}
