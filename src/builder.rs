//! This module compiles expression trees into evaluators.
//!
//! A build walks the tree once and nests one closure per node. Variables are resolved through
//! a [`Resolver`] at build time; the resulting value sources are captured by the closures and
//! read on every evaluation, so the host can change values without rebuilding.
//!
//! The main entry point is [`Builder::build`]. The numeric type and operator semantics come
//! from the [`Backend`] the builder is created with.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};

use crate::backends::Backend;
use crate::errors::BuilderError;
use crate::node::{BinaryKind, Node, UnaryKind, VariableKind, VariableNode};
use crate::operators::pow::integer_exponent;
use crate::operators::FunctionRegistry;
use crate::types::{Evaluator, Resolver, ValueSource};

/// Compiles expression trees into zero-argument closures for one backend.
#[derive(Debug, Clone)]
pub struct Builder<B> {
    backend: B,
    registry: FunctionRegistry,
}

impl<B: Backend + Default> Default for Builder<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<B: Backend> Builder<B> {
    /// Creates a builder using the built-in functions.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            registry: FunctionRegistry::default(),
        }
    }

    /// Replaces the function registry, e.g. to add host functions.
    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Builds an evaluator for an expression tree.
    ///
    /// # Arguments
    /// * `node` - The expression to compile
    /// * `resolver` - Supplies the value source of each variable; asked once per distinct
    ///   variable
    ///
    /// # Returns
    /// A thread-safe closure returning the current value of the expression.
    ///
    /// # Errors
    /// Returns a `BuilderError` if:
    /// - A variable is neither resolved nor a named constant of the registry
    /// - A function is unknown or called with the wrong number of arguments
    /// - A function has no implementation for this backend
    ///
    /// # Example
    /// ```
    /// # use spice_expr::prelude::*;
    /// let node = parse("V(in) * 10").unwrap();
    /// let mut values = VariableMap::new();
    /// values.insert(VariableNode::voltage("in"), 1.0);
    ///
    /// let builder = Builder::new(RealBackend::new());
    /// let evaluator = builder.build(&node, &mut values).unwrap();
    /// assert_eq!(evaluator(), 10.0);
    /// ```
    pub fn build<R>(
        &self,
        node: &Node,
        resolver: &mut R,
    ) -> Result<Evaluator<B::Value>, BuilderError>
    where
        R: Resolver<B::Value> + ?Sized,
    {
        let mut compilation = Compilation {
            builder: self,
            resolver,
            sources: HashMap::new(),
        };
        let evaluator = compilation.compile(node)?;
        debug!(
            "built {} evaluator for {} nodes with {} variables",
            B::NAME,
            node.size(),
            compilation.sources.len()
        );
        Ok(evaluator)
    }
}

/// State of a single build.
struct Compilation<'a, B: Backend, R: ?Sized> {
    builder: &'a Builder<B>,
    resolver: &'a mut R,
    sources: HashMap<VariableNode, ValueSource<B::Value>>,
}

impl<B, R> Compilation<'_, B, R>
where
    B: Backend,
    R: Resolver<B::Value> + ?Sized,
{
    fn compile(&mut self, node: &Node) -> Result<Evaluator<B::Value>, BuilderError> {
        match node {
            Node::Constant(number) => Ok(constant::<B>(number.value())),
            Node::Variable(variable) => self.variable(variable),
            Node::Unary(kind, operand) => {
                let operand = self.compile(operand)?;
                let evaluator: Evaluator<B::Value> = match kind {
                    UnaryKind::Plus => operand,
                    UnaryKind::Minus => Arc::new(move || B::neg(operand())),
                    UnaryKind::Not => Arc::new(move || B::from_bool(!B::is_true(operand()))),
                };
                Ok(evaluator)
            }
            Node::Binary(BinaryKind::Pow, base, exponent) => self.power(base, exponent),
            Node::Binary(kind, left, right) => {
                let left = self.compile(left)?;
                let right = self.compile(right)?;
                Ok(self.binary(*kind, left, right))
            }
            Node::Call(name, args) => self.call(name, args),
            Node::Conditional(condition, if_true, if_false) => {
                let condition = self.compile(condition)?;
                let if_true = self.compile(if_true)?;
                let if_false = self.compile(if_false)?;
                let evaluator: Evaluator<B::Value> = Arc::new(move || {
                    if B::is_true(condition()) {
                        if_true()
                    } else {
                        if_false()
                    }
                });
                Ok(evaluator)
            }
        }
    }

    fn variable(&mut self, variable: &VariableNode) -> Result<Evaluator<B::Value>, BuilderError> {
        if let Some(source) = self.sources.get(variable) {
            return Ok(Arc::clone(source));
        }
        let source = match self.resolver.resolve(variable) {
            Some(source) => source,
            None => match variable.kind() {
                VariableKind::Named => self
                    .builder
                    .registry
                    .constant(variable.name())
                    .map(constant::<B>)
                    .ok_or_else(|| BuilderError::UnresolvedVariable(variable.to_string()))?,
                _ => return Err(BuilderError::UnresolvedVariable(variable.to_string())),
            },
        };
        trace!("resolved variable {variable}");
        self.sources.insert(variable.clone(), Arc::clone(&source));
        Ok(source)
    }

    fn binary(
        &self,
        kind: BinaryKind,
        left: Evaluator<B::Value>,
        right: Evaluator<B::Value>,
    ) -> Evaluator<B::Value> {
        let fudge = self.builder.backend.fudge();
        match kind {
            BinaryKind::Add => Arc::new(move || B::add(left(), right())),
            BinaryKind::Sub => Arc::new(move || B::sub(left(), right())),
            BinaryKind::Mul => Arc::new(move || B::mul(left(), right())),
            BinaryKind::Div => Arc::new(move || B::div(left(), right(), fudge)),
            BinaryKind::Mod => Arc::new(move || B::rem(left(), right())),
            BinaryKind::Pow => Arc::new(move || B::pow(left(), right(), fudge)),
            BinaryKind::And => {
                Arc::new(move || B::from_bool(B::is_true(left()) && B::is_true(right())))
            }
            BinaryKind::Or => {
                Arc::new(move || B::from_bool(B::is_true(left()) || B::is_true(right())))
            }
            BinaryKind::Xor => {
                Arc::new(move || B::from_bool(B::is_true(left()) != B::is_true(right())))
            }
            BinaryKind::Eq
            | BinaryKind::Ne
            | BinaryKind::Lt
            | BinaryKind::Le
            | BinaryKind::Gt
            | BinaryKind::Ge => Arc::new(move || B::from_bool(B::compare(kind, left(), right()))),
        }
    }

    /// Powers with a constant integer exponent are specialised at build time.
    fn power(&mut self, base: &Node, exponent: &Node) -> Result<Evaluator<B::Value>, BuilderError> {
        let fudge = self.builder.backend.fudge();
        let Some(n) = exponent.as_constant().and_then(integer_exponent) else {
            let base = self.compile(base)?;
            let exponent = self.compile(exponent)?;
            return Ok(self.binary(BinaryKind::Pow, base, exponent));
        };
        let base = self.compile(base)?;
        let evaluator: Evaluator<B::Value> = match n {
            0 => constant::<B>(1.0),
            1 => base,
            2 => Arc::new(move || {
                let x = base();
                B::mul(x, x)
            }),
            n => Arc::new(move || B::powi(base(), n, fudge)),
        };
        Ok(evaluator)
    }

    fn call(&mut self, name: &str, args: &[Node]) -> Result<Evaluator<B::Value>, BuilderError> {
        let registry = &self.builder.registry;
        let def = registry
            .get(name)
            .filter(|def| def.arity() == args.len())
            .ok_or_else(|| BuilderError::UnknownFunction {
                name: name.to_string(),
                arity: args.len(),
            })?;
        let function = self.builder.backend.implementation(def).ok_or_else(|| {
            BuilderError::MissingImplementation {
                name: def.name().to_string(),
                backend: B::NAME,
            }
        })?;
        let fudge = self.builder.backend.fudge();

        let mut compiled = args
            .iter()
            .map(|arg| self.compile(arg))
            .collect::<Result<Vec<_>, _>>()?;

        let evaluator: Evaluator<B::Value> = match compiled.len() {
            1 => {
                let a = compiled.remove(0);
                Arc::new(move || function(&[a()], fudge))
            }
            2 => {
                let b = compiled.remove(1);
                let a = compiled.remove(0);
                Arc::new(move || function(&[a(), b()], fudge))
            }
            _ => Arc::new(move || {
                let values = compiled.iter().map(|arg| arg()).collect::<Vec<_>>();
                function(&values, fudge)
            }),
        };
        Ok(evaluator)
    }
}

fn constant<B: Backend>(value: f64) -> Evaluator<B::Value> {
    let value = B::from_f64(value);
    Arc::new(move || value)
}
