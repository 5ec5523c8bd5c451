//! Symbolic differentiation of expression trees.
//!
//! The differentiator computes the partial derivatives of a tree with respect to a set of
//! variables of interest in a single walk. Each subtree is differentiated once; the result for
//! all variables is memoised and reused wherever a structurally equal subtree occurs again.
//!
//! Results are assembled with the folding operators on [`Node`], which drop additive zeros and
//! multiplicative ones and fold constant arithmetic.
//!
//! # Non-differentiable expressions
//!
//! Relational and logical operators (`== != < <= > >= && || !` and xor) have no derivative.
//! Such a node makes the whole enclosing arithmetic expression non-differentiable, reported as
//! `None`. The same holds for calls to functions without a derivative rule whose arguments
//! depend on a variable of interest. The condition of `c ? a : b` is never differentiated, so
//! relational operators there are fine; inside either branch they are not.

use std::collections::{HashMap, HashSet};

use indexmap::map::Entry;
use itertools::Itertools;
use log::{debug, trace};

use crate::node::{BinaryKind, Node, Subtree, UnaryKind, VariableNode};
use crate::operators::pow::power_partials;
use crate::operators::{DerivativeRule, FunctionRegistry};
use crate::types::DerivativeMap;

/// Differentiates expression trees using the derivative rules of a function registry.
#[derive(Debug, Clone, Default)]
pub struct Differentiator {
    registry: FunctionRegistry,
}

impl Differentiator {
    /// A differentiator using the built-in functions.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: FunctionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Computes the partial derivatives of `node` with respect to `variables`.
    ///
    /// # Arguments
    /// * `node` - The expression to differentiate
    /// * `variables` - The variables of interest
    ///
    /// # Returns
    /// * `Some(map)` - One entry per variable of interest the expression depends on; variables
    ///   without an entry have a zero derivative
    /// * `None` - The expression is not differentiable
    ///
    /// # Example
    /// ```
    /// # use std::collections::HashSet;
    /// # use spice_expr::prelude::*;
    /// let node = parse("V(a) * V(b)").unwrap();
    /// let variables: HashSet<_> = [VariableNode::voltage("a"), VariableNode::voltage("b")].into();
    /// let derivatives = Differentiator::new().derive(&node, &variables).unwrap();
    /// assert_eq!(derivatives[&VariableNode::voltage("a")].to_string(), "V(b)");
    /// ```
    pub fn derive(
        &self,
        node: &Node,
        variables: &HashSet<VariableNode>,
    ) -> Option<DerivativeMap> {
        let mut derivation = Derivation::new(&self.registry, variables, node);
        let result = derivation.derive(node);
        match &result {
            Some(derivatives) => debug!(
                "derived {} partial derivatives over {} subtrees",
                derivatives.len(),
                derivation.memo.len()
            ),
            None => debug!("expression {node} is not differentiable"),
        }
        result
    }
}

/// Differentiates `node` with the built-in functions. See [`Differentiator::derive`].
pub fn derive(node: &Node, variables: &HashSet<VariableNode>) -> Option<DerivativeMap> {
    Differentiator::new().derive(node, variables)
}

struct Derivation<'a> {
    registry: &'a FunctionRegistry,
    variables: &'a HashSet<VariableNode>,
    subtrees: HashMap<*const Node, Subtree<'a>>,
    memo: HashMap<Subtree<'a>, Option<DerivativeMap>>,
}

impl<'a> Derivation<'a> {
    fn new(
        registry: &'a FunctionRegistry,
        variables: &'a HashSet<VariableNode>,
        root: &'a Node,
    ) -> Self {
        let subtrees = root
            .subtrees()
            .into_iter()
            .map(|subtree| (subtree.node() as *const Node, subtree))
            .collect();
        Derivation {
            registry,
            variables,
            subtrees,
            memo: HashMap::new(),
        }
    }

    fn key(&self, node: &'a Node) -> Subtree<'a> {
        self.subtrees
            .get(&(node as *const Node))
            .copied()
            .unwrap_or_else(|| Subtree::new(node))
    }

    /// Differentiates `root` bottom-up with an explicit stack. Each structurally distinct
    /// subtree is computed once, after all of its operands.
    fn derive(&mut self, root: &'a Node) -> Option<DerivativeMap> {
        let mut pending = vec![(root, false)];
        while let Some((node, expanded)) = pending.pop() {
            let key = self.key(node);
            if self.memo.contains_key(&key) {
                continue;
            }
            if expanded {
                let result = self.compute(node);
                self.memo.insert(key, result);
            } else {
                pending.push((node, true));
                pending.extend(operands(node).into_iter().rev().map(|operand| (operand, false)));
            }
        }
        self.lookup(root)
    }

    /// The memoised derivatives of an operand.
    fn lookup(&self, node: &'a Node) -> Option<DerivativeMap> {
        self.memo.get(&self.key(node)).cloned().flatten()
    }

    fn compute(&self, node: &'a Node) -> Option<DerivativeMap> {
        match node {
            Node::Constant(_) => Some(DerivativeMap::new()),

            Node::Variable(variable) => {
                let mut derivatives = DerivativeMap::new();
                if self.variables.contains(variable) {
                    derivatives.insert(variable.clone(), Node::one());
                }
                Some(derivatives)
            }

            Node::Unary(UnaryKind::Plus, operand) => self.lookup(operand),
            Node::Unary(UnaryKind::Minus, operand) => {
                let derivatives = self.lookup(operand)?;
                Some(map_terms(&derivatives, |d| -d))
            }
            Node::Unary(UnaryKind::Not, _) => poisoned(node),

            Node::Binary(kind, _, _) if kind.is_boolean() => poisoned(node),
            Node::Binary(kind, left, right) => {
                let (f, g): (&'a Node, &'a Node) = (&**left, &**right);
                let df = self.lookup(f)?;
                let dg = self.lookup(g)?;
                let derivatives = match kind {
                    // d/dx(f + g) = df/dx + dg/dx
                    BinaryKind::Add => sum([df, dg]),
                    // d/dx(f - g) = df/dx - dg/dx
                    BinaryKind::Sub => sum([df, map_terms(&dg, |d| -d)]),
                    // d/dx(f * g) = g * df/dx + f * dg/dx
                    BinaryKind::Mul => sum([
                        map_terms(&df, |d| g.clone() * d),
                        map_terms(&dg, |d| f.clone() * d),
                    ]),
                    // d/dx(f / g) = df/dx / g - f * dg/dx / g^2
                    BinaryKind::Div => sum([
                        map_terms(&df, |d| d / g.clone()),
                        map_terms(&dg, |d| -(f.clone() * d / (g.clone() * g.clone()))),
                    ]),
                    // f % g = f - trunc(f / g) * g
                    BinaryKind::Mod => {
                        let quotient = Node::call("trunc", [f.clone() / g.clone()]);
                        sum([df, map_terms(&dg, |d| -(quotient.clone() * d))])
                    }
                    BinaryKind::Pow => {
                        let [d_base, d_exponent] = power_partials(f, g);
                        chain([(d_base, &df), (d_exponent, &dg)])
                    }
                    _ => return poisoned(node),
                };
                Some(derivatives)
            }

            Node::Call(name, args) => {
                let args: &'a [Node] = args;
                let maps = args
                    .iter()
                    .map(|arg| self.lookup(arg))
                    .collect::<Option<Vec<_>>>()?;
                let rule = self
                    .registry
                    .get(name)
                    .filter(|def| def.arity() == args.len())
                    .and_then(|def| def.derivative());
                match rule {
                    Some(DerivativeRule::Constant) => Some(DerivativeMap::new()),
                    Some(DerivativeRule::Partials(partials)) => {
                        let partials = partials(args);
                        Some(chain(partials.into_iter().zip(maps.iter())))
                    }
                    Some(DerivativeRule::Direct(rule)) => {
                        let mut derivatives = DerivativeMap::new();
                        for variable in maps.iter().flat_map(|map| map.keys()).unique() {
                            let arguments = maps
                                .iter()
                                .map(|map| map.get(variable).cloned())
                                .collect::<Vec<_>>();
                            if let Some(derivative) = rule(args, &arguments) {
                                derivatives.insert(variable.clone(), derivative);
                            }
                        }
                        Some(derivatives)
                    }
                    None if maps.iter().all(DerivativeMap::is_empty) => Some(DerivativeMap::new()),
                    None => poisoned(node),
                }
            }

            // d/dx(c ? a : b) = c ? da/dx : db/dx
            Node::Conditional(condition, if_true, if_false) => {
                let da = self.lookup(if_true)?;
                let db = self.lookup(if_false)?;
                let derivatives: DerivativeMap = da
                    .keys()
                    .chain(db.keys())
                    .unique()
                    .map(|variable| {
                        let when_true = da.get(variable).cloned().unwrap_or_else(Node::zero);
                        let when_false = db.get(variable).cloned().unwrap_or_else(Node::zero);
                        (
                            variable.clone(),
                            Node::select((**condition).clone(), when_true, when_false),
                        )
                    })
                    .collect();
                Some(derivatives)
            }
        }
    }
}

/// The operands whose derivatives `node` is built from. Conditions and the operands of
/// relational and logical operators are never differentiated.
fn operands(node: &Node) -> Vec<&Node> {
    match node {
        Node::Constant(_) | Node::Variable(_) => Vec::new(),
        Node::Unary(UnaryKind::Not, _) => Vec::new(),
        Node::Unary(_, operand) => vec![operand],
        Node::Binary(kind, _, _) if kind.is_boolean() => Vec::new(),
        Node::Binary(_, left, right) => vec![left, right],
        Node::Call(_, args) => args.iter().collect(),
        Node::Conditional(_, if_true, if_false) => vec![if_true, if_false],
    }
}

fn poisoned(node: &Node) -> Option<DerivativeMap> {
    trace!("no derivative for {node}");
    None
}

fn map_terms(derivatives: &DerivativeMap, f: impl Fn(Node) -> Node) -> DerivativeMap {
    derivatives
        .iter()
        .map(|(variable, d)| (variable.clone(), f(d.clone())))
        .collect()
}

/// Adds up derivative maps entry by entry, keeping first-seen variable order.
fn sum(maps: impl IntoIterator<Item = DerivativeMap>) -> DerivativeMap {
    let mut result = DerivativeMap::new();
    for map in maps {
        for (variable, term) in map {
            match result.entry(variable) {
                Entry::Occupied(mut entry) => {
                    let current = std::mem::replace(entry.get_mut(), Node::zero());
                    *entry.get_mut() = current + term;
                }
                Entry::Vacant(entry) => {
                    entry.insert(term);
                }
            }
        }
    }
    result
}

/// Chain rule: sums `partial * d(argument)` over the arguments. A missing partial is zero.
fn chain<'m>(
    terms: impl IntoIterator<Item = (Option<Node>, &'m DerivativeMap)>,
) -> DerivativeMap {
    sum(terms.into_iter().filter_map(|(partial, derivatives)| {
        partial.map(|partial| map_terms(derivatives, |d| partial.clone() * d))
    }))
}
