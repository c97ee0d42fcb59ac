use std::fmt::{Display, Formatter};
use std::str::Chars;
use crate::util;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenPos {
    pub line: i32,
    pub column: i32,
}

impl TokenPos {
    pub fn new(line: i32, column: i32) -> TokenPos {
        TokenPos { line, column }
    }

    pub fn begin() -> TokenPos {
        TokenPos::new(1, 1)
    }
}

impl Display for TokenPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[line {} column {}]", self.line, self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenType {
    ParenthesisLeft, ParenthesisRight,

    Number,
    String,
    Identifier,
    Operator,
    /// A digit run immediately followed by `'`, as in `2'word`. The digits
    /// are carried by the token; the parser attaches the indexed expression.
    IndexMarker,

    // EOF
    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    token_type: TokenType,
    source: String,
    start: TokenPos, end: TokenPos,
}

impl Token {
    pub fn new(token_type: TokenType, source: String, start: TokenPos, end: TokenPos) -> Token {
        Token {
            token_type, source,
            start, end
        }
    }

    pub fn token_type(&self) -> TokenType { self.token_type }
    pub fn source(&self) -> &str { &self.source }
    pub fn start(&self) -> &TokenPos { &self.start }
    pub fn end(&self) -> &TokenPos { &self.end }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.token_type {
            TokenType::Eof => f.write_str("Eof"),
            TokenType::String => write!(f, "\"{}\"", self.source),
            TokenType::IndexMarker => write!(f, "{}'", self.source),
            _ => f.write_str(&self.source),
        }
    }
}

pub struct Lexer<'source> {
    input: &'source str,

    chars: Chars<'source>,
    peek_1: Option<char>,

    start_index: usize,
    current_index: usize,

    start_pos: TokenPos,
    current_pos: TokenPos,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Lexer<'source> {
        Lexer {
            input: source,

            chars: source.chars(),
            peek_1: None,

            start_index: 0,
            current_index: 0,

            start_pos: TokenPos::begin(),
            current_pos: TokenPos::begin(),
        }
    }

    /// Scans the next token. Tokenizing is total: unrecognized characters
    /// are skipped, an unterminated string runs to the end of input, and
    /// exhausting the input yields an `Eof` token.
    pub fn scan_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            self.start_index = self.current_index;
            self.start_pos = self.current_pos;

            let c = match self.consume() {
                Some(c) => c,
                None => return self.make_token(TokenType::Eof),
            };

            return match c {
                // `;` comments out the rest of the line
                ';' => {
                    self.skip_line();
                    continue;
                },

                '(' => self.make_token(TokenType::ParenthesisLeft),
                ')' => self.make_token(TokenType::ParenthesisRight),

                '+' | '-' | '*' | '/' | '%' => self.make_token(TokenType::Operator),

                // `= ! < >` pair with a trailing `=` into `== != <= >=`
                '=' | '!' | '<' | '>' => {
                    self.expect('=');
                    self.make_token(TokenType::Operator)
                },

                '"' => self.scan_string(),
                '0'..='9' => self.scan_number(),
                c if util::is_identifier_start(c) => self.scan_identifier(),

                _ => continue,
            };
        }
    }

    fn scan_string(&mut self) -> Token {
        let mut text = String::new();

        loop {
            match self.peek() {
                None | Some('"') => break,
                Some('\\') => {
                    self.consume();

                    match self.consume() {
                        Some(escaped) => text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        }),
                        // A backslash at the very end of input stands for itself
                        None => text.push('\\'),
                    }
                },
                Some(c) => {
                    self.consume();
                    text.push(c);
                },
            }
        }

        self.expect('"');
        Token::new(TokenType::String, text, self.start_pos, self.current_pos)
    }

    fn scan_number(&mut self) -> Token {
        while let Some('0'..='9') = self.peek() {
            self.consume();
        }

        let digits = self.input[self.start_index..self.current_index].to_owned();

        if self.expect('\'') {
            Token::new(TokenType::IndexMarker, digits, self.start_pos, self.current_pos)
        } else {
            Token::new(TokenType::Number, digits, self.start_pos, self.current_pos)
        }
    }

    fn scan_identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if !util::is_identifier_char(c) {
                break;
            }

            self.consume();
        }

        self.make_token(TokenType::Identifier)
    }

    fn make_token(&self, token_type: TokenType) -> Token {
        Token {
            token_type,
            source: self.input[self.start_index..self.current_index].to_owned(),

            start: self.start_pos, end: self.current_pos,
        }
    }

    fn consume(&mut self) -> Option<char> {
        let c = match self.peek_1.take() {
            Some(c) => c,
            None => self.chars.next()?,
        };

        self.current_index += c.len_utf8();

        if c == '\n' {
            self.current_pos.line += 1;
            self.current_pos.column = 1;
        } else {
            self.current_pos.column += 1;
        }

        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        if self.peek_1.is_none() {
            self.peek_1 = self.chars.next();
        }

        self.peek_1
    }

    fn expect(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.consume();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                return;
            }

            self.consume();
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.consume() {
            if c == '\n' {
                return;
            }
        }
    }
}
