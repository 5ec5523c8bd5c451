//! Function registry: the built-in functions and named constants of the expression language.
//!
//! Every function is described by a `FunctionDef`:
//! - a name (looked up case-insensitively) and a fixed arity
//! - an optional real and an optional complex implementation
//! - an optional `DerivativeRule` used by the differentiator
//!
//! The default registry is built once and cloned into each parser, differentiator and builder,
//! so registering a host function on one instance never affects another.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;
use once_cell::sync::Lazy;

use crate::node::Node;

pub(crate) mod exp;
pub(crate) mod laplace;
pub(crate) mod ln;
pub(crate) mod piecewise;
pub mod pow;
pub(crate) mod sqrt;
pub(crate) mod trigonometric;

/// Implementation of a function for one numeric type.
///
/// Receives the evaluated arguments and the builder's fudge factor.
pub type FunctionImpl<T> = Arc<dyn Fn(&[T], f64) -> T + Send + Sync>;

/// Computes the partial derivative of a function with respect to each argument.
/// `None` entries are zero.
pub type PartialsFn = Arc<dyn Fn(&[Node]) -> Vec<Option<Node>> + Send + Sync>;

/// Computes the derivative of a call directly from its arguments and the derivatives of its
/// arguments with respect to one variable (`None` is zero). Returns `None` for zero.
pub type DirectFn = Arc<dyn Fn(&[Node], &[Option<Node>]) -> Option<Node> + Send + Sync>;

/// How the differentiator handles calls to a function.
#[derive(Clone)]
pub enum DerivativeRule {
    /// Piecewise constant: the derivative is zero wherever it exists
    Constant,
    /// Chain rule over per-argument partial derivatives
    Partials(PartialsFn),
    /// Derivative assembled from the argument derivatives, for selection-type functions
    Direct(DirectFn),
}

impl DerivativeRule {
    pub fn partials(f: impl Fn(&[Node]) -> Vec<Option<Node>> + Send + Sync + 'static) -> Self {
        DerivativeRule::Partials(Arc::new(f))
    }

    pub fn direct(
        f: impl Fn(&[Node], &[Option<Node>]) -> Option<Node> + Send + Sync + 'static,
    ) -> Self {
        DerivativeRule::Direct(Arc::new(f))
    }

    /// Chain rule for a one-argument function given `f'(u)`.
    pub fn chain(f: impl Fn(&Node) -> Node + Send + Sync + 'static) -> Self {
        DerivativeRule::partials(move |args| vec![Some(f(&args[0]))])
    }
}

impl fmt::Debug for DerivativeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivativeRule::Constant => write!(f, "Constant"),
            DerivativeRule::Partials(_) => write!(f, "Partials"),
            DerivativeRule::Direct(_) => write!(f, "Direct"),
        }
    }
}

/// A registered function.
#[derive(Clone)]
pub struct FunctionDef {
    name: String,
    arity: usize,
    real: Option<FunctionImpl<f64>>,
    complex: Option<FunctionImpl<Complex64>>,
    derivative: Option<DerivativeRule>,
}

impl FunctionDef {
    /// A function without implementations or derivative rule.
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
            real: None,
            complex: None,
            derivative: None,
        }
    }

    pub fn with_real(mut self, f: impl Fn(&[f64], f64) -> f64 + Send + Sync + 'static) -> Self {
        self.real = Some(Arc::new(f));
        self
    }

    pub fn with_complex(
        mut self,
        f: impl Fn(&[Complex64], f64) -> Complex64 + Send + Sync + 'static,
    ) -> Self {
        self.complex = Some(Arc::new(f));
        self
    }

    pub fn with_derivative(mut self, rule: DerivativeRule) -> Self {
        self.derivative = Some(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn real(&self) -> Option<&FunctionImpl<f64>> {
        self.real.as_ref()
    }

    pub fn complex(&self) -> Option<&FunctionImpl<Complex64>> {
        self.complex.as_ref()
    }

    pub fn derivative(&self) -> Option<&DerivativeRule> {
        self.derivative.as_ref()
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("real", &self.real.is_some())
            .field("complex", &self.complex.is_some())
            .field("derivative", &self.derivative)
            .finish()
    }
}

static DEFAULT_REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::builtin);

/// Functions and named constants known to a parser, differentiator or builder.
#[derive(Clone, Debug)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<FunctionDef>>,
    constants: HashMap<String, f64>,
}

impl Default for FunctionRegistry {
    /// A copy of the built-in registry.
    fn default() -> Self {
        DEFAULT_REGISTRY.clone()
    }
}

impl FunctionRegistry {
    /// A registry without any functions or constants.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
            constants: HashMap::new(),
        }
    }

    fn builtin() -> Self {
        let mut registry = Self::empty();
        exp::register(&mut registry);
        ln::register(&mut registry);
        sqrt::register(&mut registry);
        pow::register(&mut registry);
        trigonometric::register(&mut registry);
        piecewise::register(&mut registry);
        laplace::register(&mut registry);
        registry.define_constant("pi", std::f64::consts::PI);
        registry.define_constant("e", std::f64::consts::E);
        registry
    }

    /// Adds or replaces a function, returning the replaced definition.
    pub fn register(&mut self, def: FunctionDef) -> Option<Arc<FunctionDef>> {
        self.functions
            .insert(def.name.to_lowercase(), Arc::new(def))
    }

    /// Looks up a function by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Arc<FunctionDef>> {
        self.functions.get(&name.to_lowercase())
    }

    /// Adds or replaces a named constant.
    pub fn define_constant(&mut self, name: &str, value: f64) {
        self.constants.insert(name.to_lowercase(), value);
    }

    /// Looks up a named constant, ignoring case.
    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constants.get(&name.to_lowercase()).copied()
    }

    /// Names of all registered functions, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.values().map(|def| def.name())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = FunctionRegistry::default();
        for name in [
            "exp", "log", "ln", "log10", "sqrt", "hypot", "pow", "pwr", "sin", "cos", "tan",
            "asin", "acos", "atan", "atan2", "sinh", "cosh", "tanh", "asinh", "acosh", "atanh",
            "abs", "sgn", "min", "max", "limit", "floor", "ceil", "round", "trunc", "ddt", "idt",
        ] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
        assert_eq!(registry.get("LIMIT").map(|d| d.arity()), Some(3));
        assert_eq!(registry.constant("PI"), Some(std::f64::consts::PI));
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_instances_are_independent() {
        let mut custom = FunctionRegistry::default();
        custom.register(
            FunctionDef::new("double", 1)
                .with_real(|args, _| 2.0 * args[0])
                .with_derivative(DerivativeRule::chain(|_| Node::constant(2.0))),
        );
        custom.define_constant("vt", 0.025);

        assert!(custom.get("double").is_some());
        assert!(FunctionRegistry::default().get("double").is_none());
        assert!(FunctionRegistry::default().constant("vt").is_none());
        assert_eq!(FunctionRegistry::empty().len(), 0);
    }

    #[test]
    fn test_builtin_implementations() {
        let registry = FunctionRegistry::default();
        let real = |name: &str, args: &[f64]| (registry.get(name).unwrap().real().unwrap())(args, 1e-20);

        assert_eq!(real("sqrt", &[4.0]), 2.0);
        assert_eq!(real("min", &[3.0, 5.0]), 3.0);
        assert_eq!(real("max", &[3.0, 5.0]), 5.0);
        assert_eq!(real("limit", &[7.0, 0.0, 5.0]), 5.0);
        assert_eq!(real("limit", &[-1.0, 0.0, 5.0]), 0.0);
        assert_eq!(real("limit", &[2.0, 0.0, 5.0]), 2.0);
        assert_eq!(real("sgn", &[0.0]), 0.0);
        assert_eq!(real("sgn", &[-3.0]), -1.0);
        assert_eq!(real("pwr", &[-8.0, 1.0 / 3.0]), -(8.0f64.powf(1.0 / 3.0)));
        assert_eq!(real("hypot", &[3.0, 4.0]), 5.0);
        assert_eq!(real("trunc", &[-2.5]), -2.0);

        assert!(registry.get("ddt").unwrap().real().is_none());
    }
}
