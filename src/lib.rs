pub mod util;
pub mod interpreter;

use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;
use clap::Parser as ClapParser;
use crate::interpreter::environment::Environment;
use crate::interpreter::evaluator::{Evaluator, RuntimeError};
use crate::interpreter::lexer::Lexer;
use crate::interpreter::parser::{ParseError, Parser};

#[derive(ClapParser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Config {
    #[clap(help = "Program to run (a .bl file)")]
    pub input: PathBuf,
}

/// Any failure the interpreter can surface to its caller. Tokenizing never
/// fails; everything originates in IO, parsing or evaluation.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Parse(ParseError),
    Runtime(RuntimeError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "{}", err),
            Error::Parse(err) => write!(f, "{}", err),
            Error::Runtime(err) => write!(f, "{}", err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Error {
        Error::Runtime(err)
    }
}

/// Runs a whole source text: tokenize, parse, then evaluate every top-level
/// expression in order against one freshly created global environment. The
/// first error aborts the remaining expressions.
pub fn interpret(source: &str) -> Result<(), Error> {
    let lexer = Lexer::new(source);
    let mut parser = Parser::new(lexer);
    let program = parser.parse()?;

    let mut environment = Environment::new();
    let mut evaluator = Evaluator::new();

    for expression in &program {
        evaluator.evaluate(expression, &mut environment)?;
    }

    Ok(())
}

pub fn run(config: &Config) -> Result<(), Error> {
    let source = std::fs::read_to_string(&config.input)?;
    interpret(&source)
}
