//! Design expression tokenizer and parser.
//!
//! Produces a binary operator tree over facet names. Operator chains fold to
//! the left; both operators are associative for the relations they induce,
//! so `i:h:p` and `i:(h:p)` describe the same design. Mixing the two
//! operators at one parenthesis level is rejected.

use std::fmt;

use super::FacetId;
use crate::error::{Error, Result};

/// Parsed design expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A single facet.
    Facet(FacetId),
    /// Two sub-designs crossed with each other.
    Crossed(Box<Expr>, Box<Expr>),
    /// Every facet of `inner` is nested within every facet of `outer`.
    Nested {
        /// The nested sub-design.
        inner: Box<Expr>,
        /// The sub-design providing the nesting levels.
        outer: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Cross,
    Nest,
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(name) => write!(f, "'{name}'"),
            Token::Cross => f.write_str("'x'"),
            Token::Nest => f.write_str("':'"),
            Token::Open => f.write_str("'('"),
            Token::Close => f.write_str("')'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Cross,
    Nest,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            ':' => {
                tokens.push(Token::Nest);
                chars.next();
            }
            c if is_name_char(c) => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_name_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                if word == "x" {
                    tokens.push(Token::Cross);
                } else {
                    tokens.push(Token::Name(word));
                }
            }
            other => {
                return Err(Error::invalid_design(format!(
                    "unexpected character '{other}' at position {pos}"
                )));
            }
        }
    }

    Ok(tokens)
}

/// Parse `input`, registering facet names in order of first appearance.
///
/// Returns the expression tree and the facet names indexed by [`FacetId`].
pub(crate) fn parse(input: &str) -> Result<(Expr, Vec<String>)> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(Error::invalid_design("design expression is empty"));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        names: Vec::new(),
        depth: 0,
    };
    let expr = parser.expression()?;

    if let Some(token) = parser.peek() {
        let message = if *token == Token::Close {
            "unbalanced parentheses: unmatched ')'".to_string()
        } else {
            format!("unexpected {token} after complete expression")
        };
        return Err(Error::invalid_design(message));
    }

    Ok((expr, parser.names))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    names: Vec<String>,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expression(&mut self) -> Result<Expr> {
        let first = self.term()?;
        let mut rest = Vec::new();
        let mut op: Option<Op> = None;

        loop {
            let next_op = match self.peek() {
                Some(Token::Cross) => Op::Cross,
                Some(Token::Nest) => Op::Nest,
                _ => break,
            };
            if op.is_some_and(|current| current != next_op) {
                return Err(Error::invalid_design(
                    "crossing and nesting combined without parentheses; \
                     group one side, e.g. 'p x (i:h)' or '(p x i):h'",
                ));
            }
            op = Some(next_op);
            self.next();
            rest.push(self.term()?);
        }

        Ok(rest.into_iter().fold(first, |lhs, rhs| match op {
            Some(Op::Nest) => Expr::Nested {
                inner: Box::new(lhs),
                outer: Box::new(rhs),
            },
            _ => Expr::Crossed(Box::new(lhs), Box::new(rhs)),
        }))
    }

    fn term(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Name(name)) => {
                if self.names.contains(&name) {
                    return Err(Error::invalid_design(format!(
                        "facet '{name}' appears more than once"
                    )));
                }
                self.names.push(name);
                Ok(Expr::Facet(FacetId(self.names.len() - 1)))
            }
            Some(Token::Open) => {
                self.depth += 1;
                let inner = self.expression()?;
                match self.next() {
                    Some(Token::Close) => {
                        self.depth -= 1;
                        Ok(inner)
                    }
                    Some(other) => Err(Error::invalid_design(format!(
                        "expected ')' but found {other}"
                    ))),
                    None => Err(Error::invalid_design(
                        "unbalanced parentheses: missing ')'",
                    )),
                }
            }
            Some(Token::Close) => Err(Error::invalid_design(if self.depth == 0 {
                "unbalanced parentheses: unmatched ')'"
            } else {
                "empty parentheses or missing operand before ')'"
            })),
            Some(op @ (Token::Cross | Token::Nest)) => Err(Error::invalid_design(format!(
                "missing facet before operator {op}"
            ))),
            None => Err(Error::invalid_design(
                "expression ends with an operator; a facet name is missing",
            )),
        }
    }
}
