//! Expression evaluation and differentiation for a single equation.
//!
//! This module provides the `Equation` type, which runs the whole pipeline for one expression:
//! the text is parsed, its variables are collected, it is differentiated symbolically with
//! respect to them and evaluators are built for the value and for every partial derivative.
//!
//! # Example
//!
//! ```
//! use spice_expr::prelude::*;
//!
//! let mut values = VariableMap::new();
//! let v1 = values.insert(VariableNode::named("v1"), 3.0);
//! values.insert(VariableNode::named("v2"), 5.0);
//!
//! let builder = Builder::new(RealBackend::new());
//! let eq = Equation::new("min(v1, v2)", &builder, &mut values).unwrap();
//! assert_eq!(eq.eval(), 3.0);
//! assert_eq!(eq.gradient().unwrap(), vec![1.0, 0.0]);
//!
//! v1.set(7.0);
//! assert_eq!(eq.eval(), 5.0);
//! assert_eq!(eq.gradient().unwrap(), vec![0.0, 1.0]);
//! ```
//!
//! # Variable Handling
//!
//! Variables can be specified either:
//! - Automatically collected in order of first occurrence using `new()`
//! - Explicitly listed using `with_variables()`, which also restricts differentiation to them
//!
//! Gradients follow the variable order.

use std::collections::HashSet;
use std::fmt;

use colored::Colorize;
use indexmap::IndexMap;

use crate::backends::Backend;
use crate::builder::Builder;
use crate::derivatives::Differentiator;
use crate::errors::EquationError;
use crate::finder::NodeFinder;
use crate::node::{Node, VariableNode};
use crate::parser::Parser;
use crate::types::{DerivativeMap, Evaluator, Resolver};

/// A compiled expression together with its compiled partial derivatives.
///
/// Evaluators read their inputs from the value sources handed out by the resolver at
/// construction, so evaluating never takes arguments and never fails.
pub struct Equation<B: Backend> {
    text: String,
    node: Node,
    variables: Vec<VariableNode>,
    derivatives: Option<DerivativeMap>,
    fun: Evaluator<B::Value>,
    derivative_functions: Option<IndexMap<VariableNode, Evaluator<B::Value>>>,
}

impl<B: Backend> fmt::Debug for Equation<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equation")
            .field("text", &self.text)
            .field("node", &self.node)
            .field("variables", &self.variables)
            .field("derivatives", &self.derivatives)
            .finish()
    }
}

impl<B: Backend> fmt::Display for Equation<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        writeln!(f, "    {}: {}", "Equation".cyan(), self.text)?;
        writeln!(f, "    {}: {}", "Tree".cyan(), self.node)?;
        let variables = self
            .variables
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "    {}: [{}]", "Variables".cyan(), variables)?;
        match &self.derivatives {
            Some(derivatives) => {
                writeln!(f, "    {}:", "Derivatives".cyan())?;
                for (variable, derivative) in derivatives {
                    writeln!(f, "        d/d{variable}: {derivative}")?;
                }
            }
            None => writeln!(f, "    {}: {}", "Derivatives".cyan(), "not differentiable".red())?,
        }
        writeln!(f, "}}")
    }
}

impl<B: Backend> Equation<B> {
    /// Creates a new `Equation` from expression text.
    ///
    /// The variables are collected from the expression in order of first occurrence, and the
    /// expression is differentiated with respect to all of them.
    ///
    /// # Arguments
    /// * `text` - The expression (e.g. "V(out) * 2 + I(R1)")
    /// * `builder` - Builder providing the backend and the function registry
    /// * `resolver` - Supplies the value source of each variable
    ///
    /// # Returns
    /// * `Result<Self, EquationError>` - The compiled equation or an error
    pub fn new<R>(text: &str, builder: &Builder<B>, resolver: &mut R) -> Result<Self, EquationError>
    where
        R: Resolver<B::Value> + ?Sized,
    {
        let node = Parser::with_registry(builder.registry().clone()).parse(text)?;
        let variables = NodeFinder::new().build(&node);
        Self::from_node(text, node, variables, builder, resolver)
    }

    /// Creates a new `Equation` differentiated only with respect to `variables`.
    ///
    /// Variables of interest the expression does not reference get a zero derivative; other
    /// variables referenced by the expression are still resolved for evaluation.
    ///
    /// # Arguments
    /// * `text` - The expression
    /// * `variables` - The variables of interest, in gradient order
    /// * `builder` - Builder providing the backend and the function registry
    /// * `resolver` - Supplies the value source of each variable
    pub fn with_variables<R>(
        text: &str,
        variables: &[VariableNode],
        builder: &Builder<B>,
        resolver: &mut R,
    ) -> Result<Self, EquationError>
    where
        R: Resolver<B::Value> + ?Sized,
    {
        let node = Parser::with_registry(builder.registry().clone()).parse(text)?;
        Self::from_node(text, node, variables.to_vec(), builder, resolver)
    }

    fn from_node<R>(
        text: &str,
        node: Node,
        variables: Vec<VariableNode>,
        builder: &Builder<B>,
        resolver: &mut R,
    ) -> Result<Self, EquationError>
    where
        R: Resolver<B::Value> + ?Sized,
    {
        let of_interest: HashSet<VariableNode> = variables.iter().cloned().collect();
        let derivatives = Differentiator::with_registry(builder.registry().clone())
            .derive(&node, &of_interest);
        Self::assemble(text.to_string(), node, variables, derivatives, builder, resolver)
    }

    /// Builds the evaluators of an already parsed and differentiated expression.
    pub(crate) fn assemble<R>(
        text: String,
        node: Node,
        variables: Vec<VariableNode>,
        derivatives: Option<DerivativeMap>,
        builder: &Builder<B>,
        resolver: &mut R,
    ) -> Result<Self, EquationError>
    where
        R: Resolver<B::Value> + ?Sized,
    {
        let fun = builder.build(&node, resolver)?;
        let derivative_functions = match &derivatives {
            Some(derivatives) => {
                let zero = Node::zero();
                let mut functions = IndexMap::with_capacity(variables.len());
                for variable in &variables {
                    let derivative = derivatives.get(variable).unwrap_or(&zero);
                    functions.insert(variable.clone(), builder.build(derivative, resolver)?);
                }
                Some(functions)
            }
            None => None,
        };

        Ok(Self {
            text,
            node,
            variables,
            derivatives,
            fun,
            derivative_functions,
        })
    }

    /// Evaluates the equation with the current variable values.
    pub fn eval(&self) -> B::Value {
        (self.fun)()
    }

    /// Returns the compiled evaluator of the equation.
    pub fn fun(&self) -> &Evaluator<B::Value> {
        &self.fun
    }

    /// Returns the compiled partial derivative with respect to `variable`.
    ///
    /// # Errors
    /// * `DerivativeNotFound` - `variable` is not one of the equation's variables
    /// * `NotDifferentiable` - the equation has no symbolic derivative
    pub fn derivative(&self, variable: &VariableNode) -> Result<&Evaluator<B::Value>, EquationError> {
        let functions = self
            .derivative_functions
            .as_ref()
            .ok_or_else(|| EquationError::NotDifferentiable(self.text.clone()))?;
        functions
            .get(variable)
            .ok_or_else(|| EquationError::DerivativeNotFound(variable.to_string()))
    }

    /// Evaluates all partial derivatives, in variable order.
    pub fn gradient(&self) -> Result<Vec<B::Value>, EquationError> {
        let functions = self
            .derivative_functions
            .as_ref()
            .ok_or_else(|| EquationError::NotDifferentiable(self.text.clone()))?;
        Ok(functions.values().map(|function| function()).collect())
    }

    pub fn is_differentiable(&self) -> bool {
        self.derivatives.is_some()
    }

    /// Returns the symbolic partial derivatives, or `None` if the equation is not
    /// differentiable.
    pub fn derivatives(&self) -> Option<&DerivativeMap> {
        self.derivatives.as_ref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn variables(&self) -> &[VariableNode] {
        &self.variables
    }
}
