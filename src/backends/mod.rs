//! Numeric backends for the builder.
//!
//! A backend fixes the value type of compiled evaluators and the scalar semantics of every
//! operator: arithmetic, fudged division and powers, comparisons and truthiness. Function calls
//! are dispatched to the implementation the backend selects from the registry.

use std::fmt;

use crate::node::BinaryKind;
use crate::operators::{FunctionDef, FunctionImpl};

pub mod complex;
pub mod real;

pub use complex::ComplexBackend;
pub use real::RealBackend;

/// Fudge factor used when none is configured.
pub const DEFAULT_FUDGE_FACTOR: f64 = 1e-20;

/// Scalar semantics of one numeric type.
///
/// The arithmetic methods are associated functions so that compiled closures need not capture
/// the backend itself.
pub trait Backend: Send + Sync + 'static {
    /// Value type produced by evaluators built with this backend
    type Value: Copy + Send + Sync + fmt::Debug + 'static;

    /// Name used in error messages
    const NAME: &'static str;

    /// Tolerance below which denominators and bases are nudged away from zero.
    fn fudge(&self) -> f64;

    /// Selects the implementation of a registered function, if the backend has one.
    fn implementation(&self, def: &FunctionDef) -> Option<FunctionImpl<Self::Value>>;

    fn from_f64(value: f64) -> Self::Value;

    fn from_bool(value: bool) -> Self::Value {
        Self::from_f64(if value { 1.0 } else { 0.0 })
    }

    fn is_true(value: Self::Value) -> bool;

    fn add(a: Self::Value, b: Self::Value) -> Self::Value;

    fn sub(a: Self::Value, b: Self::Value) -> Self::Value;

    fn mul(a: Self::Value, b: Self::Value) -> Self::Value;

    /// `a / b` with `b` fudged away from zero.
    fn div(a: Self::Value, b: Self::Value, fudge: f64) -> Self::Value;

    /// Truncated remainder.
    fn rem(a: Self::Value, b: Self::Value) -> Self::Value;

    fn neg(a: Self::Value) -> Self::Value;

    /// `a ^ b` for a run-time exponent.
    fn pow(a: Self::Value, b: Self::Value, fudge: f64) -> Self::Value;

    /// `a ^ n` for an exponent known at build time.
    fn powi(a: Self::Value, n: i32, fudge: f64) -> Self::Value;

    /// Evaluates a relational operator (`== != < <= > >=`).
    fn compare(kind: BinaryKind, a: Self::Value, b: Self::Value) -> bool;
}
