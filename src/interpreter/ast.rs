use std::fmt::{Debug, Formatter};
use crate::interpreter::lexer::Token;

/// One parsed expression: either a single token (a number, string or
/// identifier atom) or a parenthesized list of sub-expressions.
#[derive(Clone, PartialEq)]
pub enum Expr {
    Atom(Token),
    List(Vec<Expr>),
}

impl Debug for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Atom(token) => write!(f, "{}", token),
            Expr::List(elements) => write!(f, "({})", elements.iter()
                .map(|element| format!("{:?}", element))
                .collect::<Vec<String>>().join(" ")),
        }
    }
}
