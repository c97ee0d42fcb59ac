use std::fmt::{Display, Formatter};
use crate::interpreter::ast::Expr;
use crate::interpreter::lexer::{Lexer, Token, TokenPos, TokenType};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The token stream ended where an expression was expected.
    UnexpectedEof,
    /// A list was still open when the token stream ended; carries the
    /// position of the opening parenthesis.
    MissingClosingParen { pos: TokenPos },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnexpectedEof => write!(f, "Unexpected end of code"),
            ParseError::MissingClosingParen { pos } => write!(f, "{} Missing closing parenthesis ')'", pos),
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'source> {
    lexer: Lexer<'source>,
    current: Token,
}

impl<'source> Parser<'source> {
    pub fn new(mut lexer: Lexer<'source>) -> Parser<'source> {
        let current = lexer.scan_token();
        Parser { lexer, current }
    }

    /// Parses the whole token stream into the ordered sequence of
    /// top-level expressions.
    pub fn parse(&mut self) -> ParseResult<Vec<Expr>> {
        let mut expressions = Vec::new();

        while !self.is_eof() {
            expressions.push(self.parse_expression()?);
        }

        Ok(expressions)
    }

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        if self.is_eof() {
            return Err(ParseError::UnexpectedEof);
        }

        let token = self.advance();

        match token.token_type() {
            // `N'expr` is sugar for the character lookup `(get expr N)`
            TokenType::IndexMarker => {
                let keyword = Token::new(TokenType::Identifier, String::from("get"), *token.start(), *token.end());
                let index = Token::new(TokenType::Number, token.source().to_owned(), *token.start(), *token.end());
                let subject = self.parse_expression()?;

                Ok(Expr::List(vec![Expr::Atom(keyword), subject, Expr::Atom(index)]))
            },
            TokenType::ParenthesisLeft => {
                let open_pos = *token.start();
                let mut elements = Vec::new();

                while !self.check(TokenType::ParenthesisRight) {
                    if self.is_eof() {
                        return Err(ParseError::MissingClosingParen { pos: open_pos });
                    }

                    elements.push(self.parse_expression()?);
                }

                self.advance(); // the ')'
                Ok(Expr::List(elements))
            },
            _ => Ok(Expr::Atom(token)),
        }
    }

    fn advance(&mut self) -> Token {
        std::mem::replace(&mut self.current, self.lexer.scan_token())
    }

    #[inline]
    fn check(&self, token_type: TokenType) -> bool {
        self.current.token_type() == token_type
    }

    fn is_eof(&self) -> bool {
        self.check(TokenType::Eof)
    }
}
