//! Compiler for SPICE behavioral expressions with symbolic differentiation.
//!
//! This crate turns expression text such as `V(out) * 10 + limit(I(R1), 0, 1m)` into:
//!
//! - an immutable expression tree ([`node::Node`]),
//! - exact symbolic partial derivatives with respect to the voltages, currents, device
//!   properties and named quantities it references ([`derivatives::Differentiator`]),
//! - zero-argument evaluators that read live values each time they are called
//!   ([`builder::Builder`]), for real (`f64`) and complex (`Complex64`) arithmetic.
//!
//! A nonlinear solver builds the value and derivative evaluators once and calls them every
//! iteration to obtain both the residual and its Jacobian contribution, without finite
//! differences.
//!
//! # Features
//!
//! - SPICE number syntax with engineering suffixes (`1k`, `2.5meg`, `10ms`)
//! - Special forms `V(node)`, `V(node,ref)`, `I(device)` and `@device[property]`
//! - Relational, logical and ternary operators, with exact handling of non-differentiable
//!   expressions
//! - Extensible function registry with derivative rules for host functions
//! - Division and power guards against singularities (the fudge factor)
//!
//! # Example
//!
//! ```rust
//! use spice_expr::prelude::*;
//!
//! let mut values = VariableMap::new();
//! let input = VariableNode::voltage("in");
//! let handle = values.insert(input.clone(), 1.0);
//!
//! let builder = Builder::new(RealBackend::new());
//! let eq = Equation::new("V(in) * 10", &builder, &mut values).unwrap();
//!
//! assert_eq!(eq.eval(), 10.0);
//! assert_eq!(eq.derivative(&input).unwrap()(), 10.0);
//!
//! // Evaluators read the current value on every call
//! handle.set(2.0);
//! assert_eq!(eq.eval(), 20.0);
//! ```

pub use equation::Equation;
pub use system::EquationSystem;

pub mod prelude {
    pub use crate::backends::{Backend, ComplexBackend, RealBackend};
    pub use crate::builder::Builder;
    pub use crate::derivatives::{derive, Differentiator};
    pub use crate::equation::Equation;
    pub use crate::errors::{BuilderError, EquationError, ParseError};
    pub use crate::finder::NodeFinder;
    pub use crate::node::{BinaryKind, Node, UnaryKind, VariableKind, VariableNode};
    pub use crate::operators::{DerivativeRule, FunctionDef, FunctionRegistry};
    pub use crate::parser::{parse, Parser};
    pub use crate::system::EquationSystem;
    pub use crate::types::{DerivativeMap, Evaluator, Resolver, SharedValue, ValueSource, VariableMap};
}

/// Real and complex numeric semantics for the builder
pub mod backends;
/// Compilation of expression trees into closures
pub mod builder;
/// Symbolic differentiation
pub mod derivatives;
/// High-level equation handling
pub mod equation;
/// Error types for the various failure modes
pub mod errors;
/// Variable discovery
pub mod finder;
/// Tokenizer for expression text
pub mod lexer;
/// Expression tree representation
pub mod node;
/// Built-in functions and the function registry
pub mod operators;
/// Precedence parser
pub mod parser;
/// System of equations
pub mod system;
/// Shared type aliases and variable resolution
pub mod types;
