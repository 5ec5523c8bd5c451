//! Precedence-climbing parser for SPICE behavioral expressions.
//!
//! The grammar, from loosest to tightest binding:
//!
//! - `c ? a : b` (right associative, each `:` pairs with the nearest open `?`)
//! - binary operators by `BinaryKind::precedence`: `||`, `&&`, `== !=`, `< <= > >=`, `+ -`,
//!   `* / %`, `^` (right associative)
//! - prefix `+ - !`, binding tighter than every binary operator
//! - primaries: numbers, parenthesized expressions, `V(node)`, `V(node,ref)`, `I(device)`,
//!   `@device[property]`, calls `name(args...)` and identifiers
//!
//! Identifiers that name a registry constant (`pi`, `e`) become constants; all others become
//! `Named` variables for the host to resolve.

use crate::errors::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::node::{BinaryKind, Node, UnaryKind, VariableNode};
use crate::operators::FunctionRegistry;

/// Parses expression text into `Node` trees.
///
/// Holds its own copy of the function registry, which supplies the named constants.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    registry: FunctionRegistry,
}

impl Parser {
    /// Creates a parser using the default registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser using the given registry for named constants.
    pub fn with_registry(registry: FunctionRegistry) -> Self {
        Self { registry }
    }

    /// Parses a complete expression. Trailing tokens are a syntax error.
    pub fn parse(&self, text: &str) -> Result<Node, ParseError> {
        let tokens = Lexer::new(text).tokenize()?;
        let mut state = ParseState {
            tokens,
            pos: 0,
            registry: &self.registry,
        };
        let node = state.conditional()?;
        let token = state.peek();
        if token.kind != TokenKind::Eof {
            return Err(ParseError::syntax(
                token.offset,
                format!("unexpected '{}'", token.lexeme),
            ));
        }
        Ok(node)
    }
}

/// Parses text with the default registry.
pub fn parse(text: &str) -> Result<Node, ParseError> {
    Parser::new().parse(text)
}

struct ParseState<'a, 'r> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    registry: &'r FunctionRegistry,
}

fn binary_kind(kind: TokenKind) -> Option<BinaryKind> {
    Some(match kind {
        TokenKind::Plus => BinaryKind::Add,
        TokenKind::Minus => BinaryKind::Sub,
        TokenKind::Star => BinaryKind::Mul,
        TokenKind::Slash => BinaryKind::Div,
        TokenKind::Percent => BinaryKind::Mod,
        TokenKind::Caret => BinaryKind::Pow,
        TokenKind::AndAnd => BinaryKind::And,
        TokenKind::OrOr => BinaryKind::Or,
        TokenKind::EqualEqual => BinaryKind::Eq,
        TokenKind::BangEqual => BinaryKind::Ne,
        TokenKind::Less => BinaryKind::Lt,
        TokenKind::LessEqual => BinaryKind::Le,
        TokenKind::Greater => BinaryKind::Gt,
        TokenKind::GreaterEqual => BinaryKind::Ge,
        _ => return None,
    })
}

impl<'a> ParseState<'a, '_> {
    fn peek(&self) -> &Token<'a> {
        // The token stream always ends with Eof, and Eof is never consumed.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, ahead: usize) -> TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn bump(&mut self) -> Token<'a> {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token<'a>, ParseError> {
        let token = self.peek();
        if token.kind == kind {
            Ok(self.bump())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        if token.kind == TokenKind::Eof {
            ParseError::syntax(
                token.offset,
                format!("expected {expected}, found end of input"),
            )
        } else {
            ParseError::syntax(
                token.offset,
                format!("expected {expected}, found '{}'", token.lexeme),
            )
        }
    }

    /// `binary ('?' conditional ':' conditional)?`
    fn conditional(&mut self) -> Result<Node, ParseError> {
        let condition = self.binary(1)?;
        if self.peek().kind != TokenKind::Question {
            return Ok(condition);
        }
        self.bump();
        let if_true = self.conditional()?;
        self.expect(TokenKind::Colon, "':'")?;
        let if_false = self.conditional()?;
        Ok(Node::conditional(condition, if_true, if_false))
    }

    /// Precedence climbing over all binary operators with precedence >= `min_precedence`.
    fn binary(&mut self, min_precedence: u8) -> Result<Node, ParseError> {
        let mut left = self.unary()?;
        while let Some(kind) = binary_kind(self.peek().kind) {
            let precedence = kind.precedence();
            if precedence < min_precedence {
                break;
            }
            self.bump();
            let next = if kind.is_right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let right = self.binary(next)?;
            left = Node::binary(kind, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Node, ParseError> {
        let kind = match self.peek().kind {
            TokenKind::Plus => UnaryKind::Plus,
            TokenKind::Minus => UnaryKind::Minus,
            TokenKind::Bang => UnaryKind::Not,
            _ => return self.primary(),
        };
        self.bump();
        let operand = self.unary()?;
        Ok(Node::unary(kind, operand))
    }

    fn primary(&mut self) -> Result<Node, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(value) => {
                self.bump();
                Ok(Node::constant(value))
            }
            TokenKind::LeftParen => {
                self.bump();
                let inner = self.conditional()?;
                self.expect(TokenKind::RightParen, "')'")?;
                Ok(inner)
            }
            TokenKind::At => {
                self.bump();
                let device = self.name("device name")?;
                self.expect(TokenKind::LeftBracket, "'['")?;
                let property = self.name("property name")?;
                self.expect(TokenKind::RightBracket, "']'")?;
                Ok(Node::variable(VariableNode::property(device, property)))
            }
            TokenKind::Identifier => {
                self.bump();
                if self.peek().kind == TokenKind::LeftParen {
                    self.bump();
                    self.call(token.lexeme)
                } else if let Some(value) = self.registry.constant(token.lexeme) {
                    Ok(Node::constant(value))
                } else {
                    Ok(Node::variable(VariableNode::named(token.lexeme)))
                }
            }
            _ => Err(self.unexpected("an operand")),
        }
    }

    /// Parses after `name(`, handling the `V(...)` and `I(...)` forms before generic calls.
    fn call(&mut self, name: &str) -> Result<Node, ParseError> {
        if name.eq_ignore_ascii_case("v") {
            let node = self.name("node name")?;
            let variable = if self.peek().kind == TokenKind::Comma {
                self.bump();
                VariableNode::voltage_between(node, self.name("reference node name")?)
            } else {
                VariableNode::voltage(node)
            };
            self.expect(TokenKind::RightParen, "')'")?;
            return Ok(Node::variable(variable));
        }
        if name.eq_ignore_ascii_case("i") {
            let device = self.name("device name")?;
            self.expect(TokenKind::RightParen, "')'")?;
            return Ok(Node::variable(VariableNode::current(device)));
        }

        let mut args = Vec::new();
        if self.peek().kind != TokenKind::RightParen {
            loop {
                args.push(self.conditional()?);
                if self.peek().kind == TokenKind::Comma {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "')' or ','")?;
        Ok(Node::call(name, args))
    }

    /// A node, device or property name: an identifier or a bare number such as `0`.
    fn name(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek_kind_at(0) {
            TokenKind::Identifier | TokenKind::Number(_) => Ok(self.bump().lexeme.to_string()),
            _ => Err(self.unexpected(what)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::VariableKind;

    fn v(name: &str) -> Node {
        Node::variable(VariableNode::voltage(name))
    }

    fn named(name: &str) -> Node {
        Node::variable(VariableNode::named(name))
    }

    fn c(value: f64) -> Node {
        Node::constant(value)
    }

    fn bin(kind: BinaryKind, left: Node, right: Node) -> Node {
        Node::binary(kind, left, right)
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            bin(BinaryKind::Add, c(1.0), bin(BinaryKind::Mul, c(2.0), c(3.0)))
        );
        assert_eq!(
            parse("1 - 2 - 3").unwrap(),
            bin(BinaryKind::Sub, bin(BinaryKind::Sub, c(1.0), c(2.0)), c(3.0))
        );
        assert_eq!(
            parse("2 ^ 3 ^ 2").unwrap(),
            bin(BinaryKind::Pow, c(2.0), bin(BinaryKind::Pow, c(3.0), c(2.0)))
        );
        assert_eq!(
            parse("a * b ^ 2 % 4").unwrap(),
            bin(
                BinaryKind::Mod,
                bin(
                    BinaryKind::Mul,
                    named("a"),
                    bin(BinaryKind::Pow, named("b"), c(2.0))
                ),
                c(4.0)
            )
        );
    }

    #[test]
    fn test_unary_binds_tightest() {
        assert_eq!(
            parse("5+--3").unwrap(),
            bin(
                BinaryKind::Add,
                c(5.0),
                Node::unary(UnaryKind::Minus, Node::unary(UnaryKind::Minus, c(3.0)))
            )
        );
        assert_eq!(
            parse("-2^2").unwrap(),
            bin(BinaryKind::Pow, Node::unary(UnaryKind::Minus, c(2.0)), c(2.0))
        );
        assert_eq!(
            parse("2^-1").unwrap(),
            bin(BinaryKind::Pow, c(2.0), Node::unary(UnaryKind::Minus, c(1.0)))
        );
        assert_eq!(
            parse("!a && b").unwrap(),
            bin(
                BinaryKind::And,
                Node::unary(UnaryKind::Not, named("a")),
                named("b")
            )
        );
    }

    #[test]
    fn test_logical_and_relational_precedence() {
        assert_eq!(
            parse("a < b == c > d || g && h").unwrap(),
            bin(
                BinaryKind::Or,
                bin(
                    BinaryKind::Eq,
                    bin(BinaryKind::Lt, named("a"), named("b")),
                    bin(BinaryKind::Gt, named("c"), named("d"))
                ),
                bin(BinaryKind::And, named("g"), named("h"))
            )
        );
        assert_eq!(
            parse("a + 1 >= b").unwrap(),
            bin(
                BinaryKind::Ge,
                bin(BinaryKind::Add, named("a"), c(1.0)),
                named("b")
            )
        );
    }

    #[test]
    fn test_ternary_is_right_associative() {
        assert_eq!(
            parse("a ? b : c ? d : g").unwrap(),
            Node::conditional(
                named("a"),
                named("b"),
                Node::conditional(named("c"), named("d"), named("g"))
            )
        );
        assert_eq!(
            parse("a ? b ? c : d : g").unwrap(),
            Node::conditional(
                named("a"),
                Node::conditional(named("b"), named("c"), named("d")),
                named("g")
            )
        );
        assert_eq!(
            parse("x > 0 || y ? 1 : 2").unwrap(),
            Node::conditional(
                bin(
                    BinaryKind::Or,
                    bin(BinaryKind::Gt, named("x"), c(0.0)),
                    named("y")
                ),
                c(1.0),
                c(2.0)
            )
        );
    }

    #[test]
    fn test_special_forms() {
        assert_eq!(parse("V(in)").unwrap(), v("in"));
        assert_eq!(parse("v(IN)").unwrap(), v("IN"));
        assert_eq!(
            parse("V(1, 0)").unwrap(),
            Node::variable(VariableNode::voltage_between("1", "0"))
        );
        assert_eq!(
            parse("I(V1)").unwrap(),
            Node::variable(VariableNode::current("V1"))
        );
        assert_eq!(
            parse("@M1[gm]").unwrap(),
            Node::variable(VariableNode::property("M1", "gm"))
        );

        let tree = parse("V(in)*10").unwrap();
        assert_eq!(tree, bin(BinaryKind::Mul, v("in"), c(10.0)));
    }

    #[test]
    fn test_calls_and_identifiers() {
        assert_eq!(
            parse("max(V(a), 0)").unwrap(),
            Node::call("max", [v("a"), c(0.0)])
        );
        assert_eq!(parse("rnd()").unwrap(), Node::call("rnd", []));
        assert_eq!(
            parse("f(a, b ? 1 : 2, -c)").unwrap(),
            Node::call(
                "f",
                [
                    named("a"),
                    Node::conditional(named("b"), c(1.0), c(2.0)),
                    Node::unary(UnaryKind::Minus, named("c"))
                ]
            )
        );
        let time = parse("time").unwrap();
        assert_eq!(time.as_variable().unwrap().kind(), VariableKind::Named);
        assert_eq!(parse("pi").unwrap(), c(std::f64::consts::PI));
    }

    #[test]
    fn test_suffixed_literals() {
        assert_eq!(parse("2.5g").unwrap(), c(2.5e9));
        assert_eq!(
            parse("1k*V(a)").unwrap(),
            bin(BinaryKind::Mul, c(1e3), v("a"))
        );
    }

    #[test]
    fn test_display_round_trip() {
        for text in [
            "V(a) * (V(b) - 3) / I(V1)",
            "a ? max(V(x), 1) : @R1[r] ^ 2",
            "!(a < b) || c % 2 == 1",
            "-(V(1,0))",
        ] {
            let tree = parse(text).unwrap();
            assert_eq!(parse(&tree.to_string()).unwrap(), tree, "{text}");
        }
    }

    #[test]
    fn test_syntax_errors() {
        let err = parse("(1 + 2").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { offset: 6, .. }));

        let err = parse("1 + 2)").unwrap_err();
        assert_eq!(err.offset(), 5);

        let err = parse("1 : 2").unwrap_err();
        assert_eq!(err.offset(), 2);

        let err = parse("a ? b").unwrap_err();
        assert_eq!(err.offset(), 5);

        let err = parse("1 +").unwrap_err();
        assert!(err.to_string().contains("end of input"));

        assert!(parse("").is_err());
        assert!(parse("V()").is_err());
        assert!(parse("V(a,)").is_err());
        assert!(parse("@M1[gm").is_err());
        assert!(parse("max(1,)").is_err());
        assert!(parse("1 2").is_err());
    }

    #[test]
    fn test_lexical_errors_propagate() {
        let err = parse("V(a) # 2").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Lexical {
                character: '#',
                offset: 5
            }
        ));
    }
}
