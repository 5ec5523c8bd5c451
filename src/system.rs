//! Systems of equations sharing one variable ordering.
//!
//! This module provides `EquationSystem`, which compiles a set of expressions (e.g. the
//! branch equations of several behavioral sources) against one common list of variables, so
//! that their values form a vector and their partial derivatives a dense Jacobian matrix.
//!
//! # Features
//!
//! - Parallel parsing and differentiation of independent expressions
//! - Consistent variable ordering across equations (first occurrence over all expressions)
//! - Batch evaluation into caller-provided buffers
//! - Jacobian rows per equation, columns per variable
//!
//! # Example
//!
//! ```
//! use spice_expr::prelude::*;
//!
//! let mut values = VariableMap::new();
//! values.insert(VariableNode::named("x"), 1.0);
//! values.insert(VariableNode::named("y"), 2.0);
//! values.insert(VariableNode::named("z"), 3.0);
//!
//! let builder = Builder::new(RealBackend::new());
//! let system = EquationSystem::new(&["2*x + y", "x^2 + z"], &builder, &mut values).unwrap();
//!
//! assert_eq!(system.eval(), vec![4.0, 4.0]);
//! assert_eq!(
//!     system.jacobian().unwrap(),
//!     vec![vec![2.0, 1.0, 0.0], vec![2.0, 0.0, 1.0]]
//! );
//! ```

use std::collections::HashSet;

use itertools::Itertools;
use log::debug;
use rayon::prelude::*;

use crate::backends::Backend;
use crate::builder::Builder;
use crate::derivatives::Differentiator;
use crate::equation::Equation;
use crate::errors::EquationError;
use crate::finder::NodeFinder;
use crate::node::{Node, VariableNode};
use crate::parser::Parser;
use crate::types::Resolver;

/// A set of equations evaluated and differentiated together.
pub struct EquationSystem<B: Backend> {
    equations: Vec<Equation<B>>,
    variables: Vec<VariableNode>,
}

impl<B: Backend> std::fmt::Debug for EquationSystem<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EquationSystem")
            .field("equations", &self.equations().collect::<Vec<_>>())
            .field("variables", &self.variables)
            .finish()
    }
}

impl<B: Backend> EquationSystem<B> {
    /// Creates a new equation system from expression texts.
    ///
    /// The variables are the union of the variables of all expressions, in order of first
    /// occurrence.
    ///
    /// # Arguments
    /// * `expressions` - The expression texts, one per row of the system
    /// * `builder` - Builder providing the backend and the function registry
    /// * `resolver` - Supplies the value source of each variable
    pub fn new<S, R>(
        expressions: &[S],
        builder: &Builder<B>,
        resolver: &mut R,
    ) -> Result<Self, EquationError>
    where
        S: AsRef<str> + Sync,
        R: Resolver<B::Value> + ?Sized,
    {
        let nodes = parse_all(expressions, builder)?;
        let finder = NodeFinder::new();
        let variables = nodes
            .iter()
            .flat_map(|node| finder.build(node))
            .unique()
            .collect::<Vec<_>>();
        Self::build(expressions, nodes, variables, builder, resolver)
    }

    /// Creates a new equation system with an explicit variable ordering.
    ///
    /// The system is differentiated with respect to `variables` only, and Jacobian columns
    /// follow their order.
    pub fn with_variables<S, R>(
        expressions: &[S],
        variables: &[VariableNode],
        builder: &Builder<B>,
        resolver: &mut R,
    ) -> Result<Self, EquationError>
    where
        S: AsRef<str> + Sync,
        R: Resolver<B::Value> + ?Sized,
    {
        let nodes = parse_all(expressions, builder)?;
        Self::build(expressions, nodes, variables.to_vec(), builder, resolver)
    }

    fn build<S, R>(
        expressions: &[S],
        nodes: Vec<Node>,
        variables: Vec<VariableNode>,
        builder: &Builder<B>,
        resolver: &mut R,
    ) -> Result<Self, EquationError>
    where
        S: AsRef<str> + Sync,
        R: Resolver<B::Value> + ?Sized,
    {
        let differentiator = Differentiator::with_registry(builder.registry().clone());
        let of_interest: HashSet<VariableNode> = variables.iter().cloned().collect();
        let derivatives = nodes
            .par_iter()
            .map(|node| differentiator.derive(node, &of_interest))
            .collect::<Vec<_>>();

        let equations = expressions
            .iter()
            .zip(nodes)
            .zip(derivatives)
            .map(|((text, node), derivatives)| {
                Equation::assemble(
                    text.as_ref().to_string(),
                    node,
                    variables.clone(),
                    derivatives,
                    builder,
                    resolver,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "built system of {} equations over {} variables",
            equations.len(),
            variables.len()
        );
        Ok(Self {
            equations,
            variables,
        })
    }

    /// Evaluates all equations into `results`.
    ///
    /// # Errors
    /// `InvalidOutputLength` if `results` does not have one slot per equation.
    pub fn eval_into(&self, results: &mut [B::Value]) -> Result<(), EquationError> {
        if results.len() != self.equations.len() {
            return Err(EquationError::InvalidOutputLength {
                expected: self.equations.len(),
                got: results.len(),
            });
        }
        for (result, equation) in results.iter_mut().zip(&self.equations) {
            *result = equation.eval();
        }
        Ok(())
    }

    /// Evaluates all equations.
    pub fn eval(&self) -> Vec<B::Value> {
        self.equations.iter().map(Equation::eval).collect()
    }

    /// Evaluates the Jacobian into `results`: one row per equation, one column per variable.
    ///
    /// # Errors
    /// * `InvalidOutputLength` - `results` has the wrong number of rows or a row has the wrong
    ///   length
    /// * `NotDifferentiable` - some equation has no symbolic derivative
    pub fn jacobian_into(&self, results: &mut [Vec<B::Value>]) -> Result<(), EquationError> {
        if results.len() != self.equations.len() {
            return Err(EquationError::InvalidOutputLength {
                expected: self.equations.len(),
                got: results.len(),
            });
        }
        for (row, equation) in results.iter_mut().zip(&self.equations) {
            if row.len() != self.variables.len() {
                return Err(EquationError::InvalidOutputLength {
                    expected: self.variables.len(),
                    got: row.len(),
                });
            }
            for (slot, variable) in row.iter_mut().zip(&self.variables) {
                *slot = equation.derivative(variable)?();
            }
        }
        Ok(())
    }

    /// Evaluates the Jacobian.
    pub fn jacobian(&self) -> Result<Vec<Vec<B::Value>>, EquationError> {
        self.equations.iter().map(Equation::gradient).collect()
    }

    /// Evaluates the derivatives of all equations with respect to one variable (a Jacobian
    /// column).
    pub fn gradient(&self, variable: &VariableNode) -> Result<Vec<B::Value>, EquationError> {
        self.equations
            .iter()
            .map(|equation| equation.derivative(variable).map(|function| function()))
            .collect()
    }

    /// Returns the variables in column order.
    pub fn variables(&self) -> &[VariableNode] {
        &self.variables
    }

    /// Returns the expression texts in row order.
    pub fn equations(&self) -> impl Iterator<Item = &str> {
        self.equations.iter().map(Equation::text)
    }

    /// Returns the compiled equations in row order.
    pub fn rows(&self) -> &[Equation<B>] {
        &self.equations
    }

    pub fn is_differentiable(&self) -> bool {
        self.equations.iter().all(Equation::is_differentiable)
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }
}

fn parse_all<S, B>(expressions: &[S], builder: &Builder<B>) -> Result<Vec<Node>, EquationError>
where
    S: AsRef<str> + Sync,
    B: Backend,
{
    let parser = Parser::with_registry(builder.registry().clone());
    let nodes = expressions
        .par_iter()
        .map(|text| parser.parse(text.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(nodes)
}
