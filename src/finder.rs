//! Variable discovery.

use indexmap::IndexSet;

use crate::node::{Node, VariableKind, VariableNode};

/// Collects the distinct variables referenced by an expression tree.
///
/// Variables are returned in order of first occurrence, left to right. The tree is walked
/// with an explicit stack, so arbitrarily long expressions are fine.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeFinder;

impl NodeFinder {
    pub fn new() -> Self {
        NodeFinder
    }

    /// All distinct variables in `node`.
    pub fn build(&self, node: &Node) -> Vec<VariableNode> {
        // Leaves appear in post-order in the same order as in the source text
        node.subtrees()
            .iter()
            .filter_map(|subtree| subtree.node().as_variable())
            .cloned()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// The distinct `V(...)` variables in `node`.
    pub fn voltage_nodes(&self, node: &Node) -> Vec<VariableNode> {
        self.of_kind(node, VariableKind::Voltage)
    }

    /// The distinct `I(...)` variables in `node`.
    pub fn current_nodes(&self, node: &Node) -> Vec<VariableNode> {
        self.of_kind(node, VariableKind::Current)
    }

    fn of_kind(&self, node: &Node, kind: VariableKind) -> Vec<VariableNode> {
        self.build(node)
            .into_iter()
            .filter(|variable| variable.kind() == kind)
            .collect()
    }
}
