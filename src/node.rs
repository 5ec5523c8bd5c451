//! Expression tree model.
//!
//! This module defines the immutable expression tree produced by the parser and consumed by
//! the differentiator and the builders. The main types are:
//!
//! - `Node`: An enum representing every kind of expression
//! - `VariableNode`: A voltage, current, device property or named quantity; the unit of
//!   differentiation
//! - `UnaryKind` / `BinaryKind`: Operator tags, including their precedence and associativity
//!
//! Children are shared through `Arc`, so cloning a tree is cheap and trees can be sent across
//! threads. Equality and hashing are structural: two separately built trees that spell the same
//! expression compare equal and hash identically, which lets nodes key derivative maps.
//!
//! # Folding constructors
//! The arithmetic operators (`+ - * /` and unary `-`) are implemented for `Node` and fold
//! trivial cases while building:
//! - Constant folding (e.g. 2 + 3 → 5)
//! - Identity rules (e.g. x + 0 → x, x * 1 → x, x * 0 → 0)
//! - Double negation (e.g. -(-x) → x)
//!
//! The parser never uses them, so parsed trees keep the shape of the source text.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

/// A floating point literal with structural equality.
///
/// Compares and hashes by bit pattern, with `-0.0` treated as `0.0` and all NaNs treated
/// as one value, so it can take part in `Eq` and `Hash`.
#[derive(Debug, Clone, Copy)]
pub struct Number(f64);

impl Number {
    pub fn new(value: f64) -> Self {
        Number(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    fn key(self) -> u64 {
        if self.0 == 0.0 {
            0
        } else if self.0.is_nan() {
            f64::NAN.to_bits()
        } else {
            self.0.to_bits()
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// The kind of quantity a variable leaf refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableKind {
    /// A node voltage, `V(node)`, or a potential difference, `V(node, reference)`
    Voltage,
    /// A branch current through a device, `I(device)`
    Current,
    /// A device property, `@device[property]`
    Property,
    /// A bare identifier resolved by the host (time, temperature, parameters)
    Named,
}

/// A variable leaf; the key of derivative maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableNode {
    kind: VariableKind,
    name: String,
    reference: Option<String>,
}

impl VariableNode {
    pub fn new(kind: VariableKind, name: impl Into<String>, reference: Option<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            reference,
        }
    }

    /// `V(node)`
    pub fn voltage(node: impl Into<String>) -> Self {
        Self::new(VariableKind::Voltage, node, None)
    }

    /// `V(node, reference)`
    pub fn voltage_between(node: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::new(VariableKind::Voltage, node, Some(reference.into()))
    }

    /// `I(device)`
    pub fn current(device: impl Into<String>) -> Self {
        Self::new(VariableKind::Current, device, None)
    }

    /// `@device[property]`
    pub fn property(device: impl Into<String>, property: impl Into<String>) -> Self {
        Self::new(VariableKind::Property, device, Some(property.into()))
    }

    /// A bare identifier such as `time`
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(VariableKind::Named, name, None)
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The reference node of a potential difference, or the property name of a property.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

impl fmt::Display for VariableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.reference) {
            (VariableKind::Voltage, None) => write!(f, "V({})", self.name),
            (VariableKind::Voltage, Some(reference)) => write!(f, "V({},{})", self.name, reference),
            (VariableKind::Current, _) => write!(f, "I({})", self.name),
            (VariableKind::Property, Some(property)) => write!(f, "@{}[{}]", self.name, property),
            (VariableKind::Property, None) => write!(f, "@{}", self.name),
            (VariableKind::Named, _) => write!(f, "{}", self.name),
        }
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryKind {
    Plus,
    Minus,
    Not,
}

impl UnaryKind {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryKind::Plus => "+",
            UnaryKind::Minus => "-",
            UnaryKind::Not => "!",
        }
    }
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryKind {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryKind::Add => "+",
            BinaryKind::Sub => "-",
            BinaryKind::Mul => "*",
            BinaryKind::Div => "/",
            BinaryKind::Mod => "%",
            BinaryKind::Pow => "^",
            BinaryKind::And => "&&",
            BinaryKind::Or => "||",
            BinaryKind::Xor => "xor",
            BinaryKind::Eq => "==",
            BinaryKind::Ne => "!=",
            BinaryKind::Lt => "<",
            BinaryKind::Le => "<=",
            BinaryKind::Gt => ">",
            BinaryKind::Ge => ">=",
        }
    }

    /// Binding strength, higher binds tighter. The ternary operator sits below all of these.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryKind::Or => 1,
            BinaryKind::And | BinaryKind::Xor => 2,
            BinaryKind::Eq | BinaryKind::Ne => 3,
            BinaryKind::Lt | BinaryKind::Le | BinaryKind::Gt | BinaryKind::Ge => 4,
            BinaryKind::Add | BinaryKind::Sub => 5,
            BinaryKind::Mul | BinaryKind::Div | BinaryKind::Mod => 6,
            BinaryKind::Pow => 7,
        }
    }

    pub fn is_right_associative(self) -> bool {
        matches!(self, BinaryKind::Pow)
    }

    /// Relational and logical operators, which produce truth values.
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            BinaryKind::And
                | BinaryKind::Or
                | BinaryKind::Xor
                | BinaryKind::Eq
                | BinaryKind::Ne
                | BinaryKind::Lt
                | BinaryKind::Le
                | BinaryKind::Gt
                | BinaryKind::Ge
        )
    }
}

/// An expression tree node.
///
/// Trees are built bottom-up and never mutated. Any change means building a new tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// A literal value
    Constant(Number),
    /// A voltage, current, property or named variable
    Variable(VariableNode),
    /// A prefix operator applied to an operand
    Unary(UnaryKind, Arc<Node>),
    /// An infix operator applied to two operands
    Binary(BinaryKind, Arc<Node>, Arc<Node>),
    /// A function call by name
    Call(String, Arc<[Node]>),
    /// `condition ? if_true : if_false`
    Conditional(Arc<Node>, Arc<Node>, Arc<Node>),
}

impl Node {
    pub fn constant(value: f64) -> Self {
        Node::Constant(Number::new(value))
    }

    pub fn zero() -> Self {
        Node::constant(0.0)
    }

    pub fn one() -> Self {
        Node::constant(1.0)
    }

    pub fn variable(variable: VariableNode) -> Self {
        Node::Variable(variable)
    }

    pub fn unary(kind: UnaryKind, operand: Node) -> Self {
        Node::Unary(kind, Arc::new(operand))
    }

    pub fn binary(kind: BinaryKind, left: Node, right: Node) -> Self {
        Node::Binary(kind, Arc::new(left), Arc::new(right))
    }

    pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Node>) -> Self {
        Node::Call(name.into(), args.into_iter().collect())
    }

    pub fn conditional(condition: Node, if_true: Node, if_false: Node) -> Self {
        Node::Conditional(Arc::new(condition), Arc::new(if_true), Arc::new(if_false))
    }

    /// Returns the literal value if this node is a constant.
    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Node::Constant(number) => Some(number.value()),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableNode> {
        match self {
            Node::Variable(variable) => Some(variable),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_constant() == Some(0.0)
    }

    pub fn is_one(&self) -> bool {
        self.as_constant() == Some(1.0)
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Constant(_) | Node::Variable(_) => Vec::new(),
            Node::Unary(_, operand) => vec![operand],
            Node::Binary(_, left, right) => vec![left, right],
            Node::Call(_, args) => args.iter().collect(),
            Node::Conditional(condition, if_true, if_false) => {
                vec![condition, if_true, if_false]
            }
        }
    }

    /// Every subtree in post-order (children left to right, then their parent), each with its
    /// structural hash. The walk uses an explicit stack, so deep trees are fine.
    pub fn subtrees(&self) -> Vec<Subtree<'_>> {
        let mut pending = vec![(self, false)];
        let mut hashes: Vec<u64> = Vec::new();
        let mut order = Vec::new();
        while let Some((node, expanded)) = pending.pop() {
            let children = node.children();
            if !expanded {
                pending.push((node, true));
                pending.extend(children.into_iter().rev().map(|child| (child, false)));
                continue;
            }

            let mut hasher = DefaultHasher::new();
            std::mem::discriminant(node).hash(&mut hasher);
            match node {
                Node::Constant(number) => number.hash(&mut hasher),
                Node::Variable(variable) => variable.hash(&mut hasher),
                Node::Unary(kind, _) => kind.hash(&mut hasher),
                Node::Binary(kind, _, _) => kind.hash(&mut hasher),
                Node::Call(name, _) => name.hash(&mut hasher),
                Node::Conditional(..) => {}
            }
            // Children finished last, so their hashes are on top, leftmost first
            let start = hashes.len() - children.len();
            hashes[start..].hash(&mut hasher);
            hashes.truncate(start);

            let hash = hasher.finish();
            hashes.push(hash);
            order.push(Subtree { node, hash });
        }
        order
    }

    /// Number of nodes in the tree, counting shared subtrees once per occurrence.
    pub fn size(&self) -> usize {
        1 + self.children().into_iter().map(Node::size).sum::<usize>()
    }

    /// `self ^ exponent`, folding x^1 → x, x^0 → 1 and constant bases.
    pub fn pow(self, exponent: Node) -> Node {
        match (self.as_constant(), exponent.as_constant()) {
            (_, Some(e)) if e == 1.0 => self,
            (_, Some(e)) if e == 0.0 => Node::one(),
            (Some(b), Some(e)) => Node::constant(b.powf(e)),
            _ => Node::binary(BinaryKind::Pow, self, exponent),
        }
    }

    /// `condition ? if_true : if_false`, collapsing identical branches and constant conditions.
    pub fn select(condition: Node, if_true: Node, if_false: Node) -> Node {
        if if_true == if_false {
            return if_true;
        }
        match condition.as_constant() {
            Some(c) if c != 0.0 => if_true,
            Some(_) => if_false,
            None => Node::conditional(condition, if_true, if_false),
        }
    }
}

impl From<VariableNode> for Node {
    fn from(variable: VariableNode) -> Self {
        Node::Variable(variable)
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Node::constant(value)
    }
}

impl Add for Node {
    type Output = Node;

    fn add(self, rhs: Node) -> Node {
        match (self.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) => Node::constant(a + b),
            (Some(a), _) if a == 0.0 => rhs,
            (_, Some(b)) if b == 0.0 => self,
            _ => Node::binary(BinaryKind::Add, self, rhs),
        }
    }
}

impl Sub for Node {
    type Output = Node;

    fn sub(self, rhs: Node) -> Node {
        match (self.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) => Node::constant(a - b),
            (_, Some(b)) if b == 0.0 => self,
            (Some(a), _) if a == 0.0 => -rhs,
            _ => Node::binary(BinaryKind::Sub, self, rhs),
        }
    }
}

impl Mul for Node {
    type Output = Node;

    fn mul(self, rhs: Node) -> Node {
        match (self.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) => Node::constant(a * b),
            (Some(a), _) | (_, Some(a)) if a == 0.0 => Node::zero(),
            (Some(a), _) if a == 1.0 => rhs,
            (_, Some(b)) if b == 1.0 => self,
            (Some(a), _) if a == -1.0 => -rhs,
            (_, Some(b)) if b == -1.0 => -self,
            _ => Node::binary(BinaryKind::Mul, self, rhs),
        }
    }
}

impl Div for Node {
    type Output = Node;

    fn div(self, rhs: Node) -> Node {
        match (self.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) if b != 0.0 => Node::constant(a / b),
            (Some(a), _) if a == 0.0 => Node::zero(),
            (_, Some(b)) if b == 1.0 => self,
            _ => Node::binary(BinaryKind::Div, self, rhs),
        }
    }
}

impl Neg for Node {
    type Output = Node;

    fn neg(self) -> Node {
        match self {
            Node::Constant(number) => Node::constant(-number.value()),
            Node::Unary(UnaryKind::Minus, operand) => (*operand).clone(),
            other => Node::unary(UnaryKind::Minus, other),
        }
    }
}

/// A subtree paired with its structural hash.
///
/// The derived `Hash` of `Node` walks the whole subtree on every call. Walks that key many
/// subtrees of one tree use [`Node::subtrees`], which hashes every subtree once, bottom-up,
/// from the hashes of its children. Equal subtrees have equal hashes.
#[derive(Debug, Clone, Copy)]
pub struct Subtree<'a> {
    node: &'a Node,
    hash: u64,
}

impl<'a> Subtree<'a> {
    pub fn new(node: &'a Node) -> Self {
        let hash = node.subtrees().last().map_or(0, |subtree| subtree.hash);
        Subtree { node, hash }
    }

    pub fn node(&self) -> &'a Node {
        self.node
    }
}

impl PartialEq for Subtree<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && (std::ptr::eq(self.node, other.node) || self.node == other.node)
    }
}

impl Eq for Subtree<'_> {}

impl Hash for Subtree<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Formats the tree as parseable text, parenthesizing every operator application.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Constant(number) => write!(f, "{}", number.value()),
            Node::Variable(variable) => write!(f, "{variable}"),
            Node::Unary(kind, operand) => write!(f, "{}({operand})", kind.symbol()),
            Node::Binary(BinaryKind::Xor, left, right) => write!(f, "xor({left}, {right})"),
            Node::Binary(kind, left, right) => write!(f, "({left} {} {right})", kind.symbol()),
            Node::Call(name, args) => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Node::Conditional(condition, if_true, if_false) => {
                write!(f, "({condition} ? {if_true} : {if_false})")
            }
        }
    }
}
