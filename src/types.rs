use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;

use crate::node::{Node, VariableNode};

pub use crate::operators::FunctionImpl;

/// Type alias for a compiled expression.
///
/// This represents a function that:
/// - Takes no arguments; every input is read from the value sources captured at build time
/// - Returns the current value of the expression
/// - Is both Send and Sync for thread safety
pub type Evaluator<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Type alias for the live value of a variable, as handed out by a [`Resolver`].
pub type ValueSource<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Partial derivatives of an expression, keyed by variable in insertion order.
///
/// A variable without an entry has a zero derivative.
pub type DerivativeMap = IndexMap<VariableNode, Node>;

/// Supplies value sources for the variables of an expression while it is being built.
///
/// Called at most once per distinct variable per build. Returning `None` leaves the variable
/// unresolved.
pub trait Resolver<T> {
    fn resolve(&mut self, variable: &VariableNode) -> Option<ValueSource<T>>;
}

impl<T, F> Resolver<T> for F
where
    F: FnMut(&VariableNode) -> Option<ValueSource<T>>,
{
    fn resolve(&mut self, variable: &VariableNode) -> Option<ValueSource<T>> {
        self(variable)
    }
}

/// A settable value shared between a host and the evaluators reading it.
#[derive(Debug, Default)]
pub struct SharedValue<T>(Arc<RwLock<T>>);

impl<T> Clone for SharedValue<T> {
    fn clone(&self) -> Self {
        SharedValue(Arc::clone(&self.0))
    }
}

impl<T: Copy + Send + Sync + 'static> SharedValue<T> {
    pub fn new(value: T) -> Self {
        SharedValue(Arc::new(RwLock::new(value)))
    }

    pub fn get(&self) -> T {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, value: T) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// A value source reading the current value on every call.
    pub fn source(&self) -> ValueSource<T> {
        let cell = Arc::clone(&self.0);
        Arc::new(move || *cell.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// A table of variable values that resolves the variables it contains.
///
/// Values can be changed after building through [`VariableMap::set`] or the
/// [`SharedValue`] handles returned by [`VariableMap::insert`].
#[derive(Debug, Clone)]
pub struct VariableMap<T> {
    values: IndexMap<VariableNode, SharedValue<T>>,
}

impl<T> Default for VariableMap<T> {
    fn default() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }
}

impl<T: Copy + Send + Sync + 'static> VariableMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of a variable, adding it if needed, and returns its shared cell.
    pub fn insert(&mut self, variable: VariableNode, value: T) -> SharedValue<T> {
        let cell = self
            .values
            .entry(variable)
            .or_insert_with(|| SharedValue::new(value));
        cell.set(value);
        cell.clone()
    }

    /// Updates an existing variable. Returns `false` if the variable is unknown.
    pub fn set(&self, variable: &VariableNode, value: T) -> bool {
        match self.values.get(variable) {
            Some(cell) => {
                cell.set(value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, variable: &VariableNode) -> Option<T> {
        self.values.get(variable).map(SharedValue::get)
    }

    pub fn contains(&self, variable: &VariableNode) -> bool {
        self.values.contains_key(variable)
    }

    pub fn variables(&self) -> impl Iterator<Item = &VariableNode> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T: Copy + Send + Sync + 'static> Resolver<T> for VariableMap<T> {
    fn resolve(&mut self, variable: &VariableNode) -> Option<ValueSource<T>> {
        self.values.get(variable).map(SharedValue::source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_value_source_tracks_updates() {
        let cell = SharedValue::new(1.0);
        let source = cell.source();
        assert_eq!(source(), 1.0);
        cell.set(4.0);
        assert_eq!(source(), 4.0);
        assert_eq!(cell.clone().get(), 4.0);
    }

    #[test]
    fn test_variable_map_resolves_known_variables() {
        let mut map = VariableMap::new();
        let a = VariableNode::voltage("a");
        let handle = map.insert(a.clone(), 2.0);

        let source = map.resolve(&a).unwrap();
        assert_eq!(source(), 2.0);

        handle.set(3.0);
        assert_eq!(source(), 3.0);
        assert!(map.set(&a, 5.0));
        assert_eq!(source(), 5.0);

        assert!(map.resolve(&VariableNode::voltage("b")).is_none());
        assert!(!map.set(&VariableNode::voltage("b"), 1.0));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_closure_resolver() {
        let mut resolver = |variable: &VariableNode| -> Option<ValueSource<f64>> {
            (variable.name() == "x").then(|| Arc::new(|| 7.0) as ValueSource<f64>)
        };
        assert!(resolver.resolve(&VariableNode::named("x")).is_some());
        assert!(resolver.resolve(&VariableNode::named("y")).is_none());
    }
}
