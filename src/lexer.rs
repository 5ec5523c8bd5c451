//! Lexer for SPICE behavioral expressions.
//!
//! Turns expression text into a flat token stream. Numeric literals are scaled by their
//! engineering suffix while lexing, so the parser only ever sees plain `f64` values.

use crate::errors::ParseError;

/// Token types for expression text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    /// Numeric literal, already multiplied by its suffix scale
    Number(f64),
    /// Identifier (`V`, `sin`, `time`, `R1`)
    Identifier,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Bang,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AndAnd,
    OrOr,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Question,
    At,
    /// End of input
    Eof,
}

/// A token with its source text and byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub offset: usize,
}

/// Lexer over a single expression.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>, ParseError> {
        self.skip_whitespace();

        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(self.token(TokenKind::Eof, start));
        };

        let kind = match c {
            '0'..='9' => return self.read_number(start),
            '.' if self.peek_nth(1).is_some_and(|d| d.is_ascii_digit()) => {
                return self.read_number(start)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                self.read_identifier();
                TokenKind::Identifier
            }
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            '^' => self.single(TokenKind::Caret),
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            '[' => self.single(TokenKind::LeftBracket),
            ']' => self.single(TokenKind::RightBracket),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            '?' => self.single(TokenKind::Question),
            '@' => self.single(TokenKind::At),
            '!' => self.one_or_two('=', TokenKind::Bang, TokenKind::BangEqual),
            '<' => self.one_or_two('=', TokenKind::Less, TokenKind::LessEqual),
            '>' => self.one_or_two('=', TokenKind::Greater, TokenKind::GreaterEqual),
            '=' => self.pair('=', TokenKind::EqualEqual, start)?,
            '&' => self.pair('&', TokenKind::AndAnd, start)?,
            '|' => self.pair('|', TokenKind::OrOr, start)?,
            other => {
                return Err(ParseError::Lexical {
                    character: other,
                    offset: start,
                })
            }
        };

        Ok(self.token(kind, start))
    }

    /// Tokenize the entire input. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token<'a>>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token<'a> {
        Token {
            kind,
            lexeme: &self.input[start..self.pos],
            offset: start,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn one_or_two(&mut self, second: char, one: TokenKind, two: TokenKind) -> TokenKind {
        self.advance();
        if self.peek() == Some(second) {
            self.advance();
            two
        } else {
            one
        }
    }

    /// Two-character operators whose first character is not a token on its own.
    fn pair(&mut self, second: char, kind: TokenKind, start: usize) -> Result<TokenKind, ParseError> {
        let first = self.advance();
        if self.peek() == Some(second) {
            self.advance();
            Ok(kind)
        } else {
            Err(ParseError::Lexical {
                character: first.unwrap_or(second),
                offset: start,
            })
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn read_identifier(&mut self) {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
    }

    fn read_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn read_number(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.read_digits();
        if self.peek() == Some('.') {
            self.advance();
            self.read_digits();
        }

        // An 'e' only starts an exponent when digits follow; otherwise it is a suffix letter.
        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent = match self.peek_nth(1) {
                Some(d) if d.is_ascii_digit() => true,
                Some('+' | '-') => self.peek_nth(2).is_some_and(|d| d.is_ascii_digit()),
                _ => false,
            };
            if exponent {
                self.advance();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
                self.read_digits();
            }
        }

        let mantissa = &self.input[start..self.pos];
        let value: f64 = mantissa
            .parse()
            .map_err(|_| ParseError::syntax(start, format!("invalid number '{mantissa}'")))?;

        let suffix_start = self.pos;
        while self.peek().is_some_and(char::is_alphabetic) {
            self.advance();
        }
        let scale = suffix_scale(&self.input[suffix_start..self.pos]);

        Ok(self.token(TokenKind::Number(value * scale), start))
    }
}

/// Scale factor of an engineering suffix. Letters after the recognized prefix are ignored,
/// and an unrecognized suffix scales by one.
pub fn suffix_scale(suffix: &str) -> f64 {
    let lower = suffix.to_lowercase();
    if lower.starts_with("meg") {
        return 1e6;
    }
    if lower.starts_with("mil") {
        return 25.4e-6;
    }
    match lower.chars().next() {
        Some('t') => 1e12,
        Some('g') => 1e9,
        Some('x') => 1e6,
        Some('k') => 1e3,
        Some('m') => 1e-3,
        Some('u' | 'µ' | 'μ') => 1e-6,
        Some('n') => 1e-9,
        Some('p') => 1e-12,
        Some('f') => 1e-15,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn number(input: &str) -> f64 {
        match kinds(input)[0] {
            TokenKind::Number(value) => value,
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_expression() {
        assert_eq!(
            kinds("V(in)*10"),
            vec![
                TokenKind::Identifier,
                TokenKind::LeftParen,
                TokenKind::Identifier,
                TokenKind::RightParen,
                TokenKind::Star,
                TokenKind::Number(10.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_two_character_operators() {
        assert_eq!(
            kinds("a==b != c<=d>=e && f || !g < h > i"),
            vec![
                TokenKind::Identifier,
                TokenKind::EqualEqual,
                TokenKind::Identifier,
                TokenKind::BangEqual,
                TokenKind::Identifier,
                TokenKind::LessEqual,
                TokenKind::Identifier,
                TokenKind::GreaterEqual,
                TokenKind::Identifier,
                TokenKind::AndAnd,
                TokenKind::Identifier,
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Identifier,
                TokenKind::Less,
                TokenKind::Identifier,
                TokenKind::Greater,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("@M1[gm] ? a : b, %^"),
            vec![
                TokenKind::At,
                TokenKind::Identifier,
                TokenKind::LeftBracket,
                TokenKind::Identifier,
                TokenKind::RightBracket,
                TokenKind::Question,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::Percent,
                TokenKind::Caret,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_offsets_and_lexemes() {
        let tokens = Lexer::new("  sin( 1k )").tokenize().unwrap();
        assert_eq!(tokens[0].lexeme, "sin");
        assert_eq!(tokens[0].offset, 2);
        assert_eq!(tokens[2].lexeme, "1k");
        assert_eq!(tokens[2].offset, 7);
        assert_eq!(tokens[4].kind, TokenKind::Eof);
        assert_eq!(tokens[4].offset, 11);
    }

    #[test]
    fn test_number_forms() {
        assert_eq!(number("42"), 42.0);
        assert_eq!(number("1.5"), 1.5);
        assert_eq!(number(".5"), 0.5);
        assert_eq!(number("1e-3"), 1e-3);
        assert_eq!(number("2.5E+4"), 2.5e4);
    }

    #[test]
    fn test_suffix_scaling() {
        let table = [
            ("T", 1e12),
            ("G", 1e9),
            ("MEG", 1e6),
            ("X", 1e6),
            ("K", 1e3),
            ("M", 1e-3),
            ("MIL", 25.4e-6),
            ("U", 1e-6),
            ("µ", 1e-6),
            ("N", 1e-9),
            ("P", 1e-12),
            ("F", 1e-15),
        ];
        for (suffix, scale) in table {
            for text in [suffix.to_string(), suffix.to_lowercase()] {
                assert_eq!(number(&format!("2.5{text}")), 2.5 * scale, "suffix {text}");
            }
        }
        assert_eq!(number("2.5g"), 2.5e9);
    }

    #[test]
    fn test_suffix_trailing_letters_ignored() {
        assert_eq!(number("10ms"), 10.0 * 1e-3);
        assert_eq!(number("1megohm"), 1e6);
        assert_eq!(number("3pF"), 3.0 * 1e-12);
        assert_eq!(number("5V"), 5.0);
        assert_eq!(number("1e3k"), 1e3 * 1e3);
    }

    #[test]
    fn test_e_without_digits_is_a_suffix() {
        assert_eq!(number("2e"), 2.0);
        assert_eq!(kinds("2e+x").len(), 4);
    }

    #[test]
    fn test_lexical_errors() {
        let err = Lexer::new("1 + $").tokenize().unwrap_err();
        assert_eq!(
            err,
            ParseError::Lexical {
                character: '$',
                offset: 4
            }
        );

        let err = Lexer::new("a = b").tokenize().unwrap_err();
        assert_eq!(err.offset(), 2);

        assert!(Lexer::new("a & b").tokenize().is_err());
        assert!(Lexer::new("a | b").tokenize().is_err());
    }
}
