use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::io::{self, BufRead, Stdout, Write};
use std::process::Command;
use std::rc::Rc;
use lazy_static::lazy_static;
use rand::rngs::ThreadRng;
use rand::Rng;
use crate::interpreter::ast::Expr;
use crate::interpreter::environment::Environment;
use crate::interpreter::lexer::{Token, TokenType};
use crate::interpreter::value::{Function, Value};

lazy_static! {
    /// Names checked before ordinary list evaluation. `"Random"` is
    /// recognized here but has no handler in `evaluate_list`, so a
    /// `(Random ...)` call drops through to ordinary evaluation and fails
    /// as an undefined variable; the language has always behaved this way.
    static ref KEYWORDS: HashSet<&'static str> = [
        "def", "print", "if", "loop", "do",
        "String", "Number", "typeof", "fun", "input",
        "len", "get", "set", "sys", "random", "Random", "ord", "chr",
    ].into_iter().collect();
}

#[derive(Debug)]
pub enum RuntimeError {
    UndefinedVariable(String),
    /// A special form received the wrong number of arguments.
    FormArity {
        form: &'static str,
        expected: &'static str,
        received: usize,
    },
    /// A user function call received the wrong number of arguments.
    CallArity {
        expected: usize,
        received: usize,
    },
    /// An operand or argument had the wrong kind for an operation.
    TypeError(String),
    IndexOutOfBounds {
        index: i64,
        length: usize,
    },
    DivisionByZero,
    MalformedNumber(String),
    UnknownOperator(String),
    /// An operator chain ended on an operator with no right-hand operand.
    DanglingOperator(String),
    InvalidRandomRange {
        min: i64,
        max: i64,
    },
    /// The `sys` child process could not be launched.
    CommandFailed(io::Error),
    /// Fallback for expressions no evaluation rule applies to, such as a
    /// stray `)` atom.
    Unevaluable,
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::UndefinedVariable(name) => write!(f, "Undefined variable: '{}'", name),
            RuntimeError::FormArity { form, expected, received } =>
                write!(f, "'{}' requires {}, but received {}", form, expected, received),
            RuntimeError::CallArity { expected, received } =>
                write!(f, "Incorrect number of arguments for function call. Expected {}, but got {}", expected, received),
            RuntimeError::TypeError(message) => write!(f, "Type error: {}", message),
            RuntimeError::IndexOutOfBounds { index, length } =>
                write!(f, "Index {} is out of bounds for a string of length {}", index, length),
            RuntimeError::DivisionByZero => write!(f, "Division by zero"),
            RuntimeError::MalformedNumber(text) => write!(f, "Malformed number literal: '{}'", text),
            RuntimeError::UnknownOperator(operator) => write!(f, "Unknown operator: '{}'", operator),
            RuntimeError::DanglingOperator(operator) =>
                write!(f, "Operator '{}' is missing a right-hand operand", operator),
            RuntimeError::InvalidRandomRange { min, max } =>
                write!(f, "'random' range is empty: {} is greater than {}", min, max),
            RuntimeError::CommandFailed(err) => write!(f, "Failed to execute system command: {}", err),
            RuntimeError::Unevaluable => write!(f, "Cannot evaluate this expression"),
        }
    }
}

type EvalResult = Result<Value, RuntimeError>;

/// The tree-walking evaluator.
///
/// Owns the interpreter's input/output handles and the process-lifetime
/// random generator. The variable environment is passed down through
/// `evaluate` by mutable reference, so bindings created while evaluating
/// one expression are visible to its siblings.
pub struct Evaluator<In, Out> {
    input: In,
    output: Out,
    rng: ThreadRng,
}

impl Evaluator<io::StdinLock<'static>, Stdout> {
    pub fn new() -> Self {
        Evaluator::with_io(io::stdin().lock(), io::stdout())
    }
}

impl Default for Evaluator<io::StdinLock<'static>, Stdout> {
    fn default() -> Self {
        Evaluator::new()
    }
}

impl<In: BufRead, Out: Write> Evaluator<In, Out> {
    pub fn with_io(input: In, output: Out) -> Self {
        Evaluator {
            input, output,
            rng: rand::thread_rng(),
        }
    }

    /// Consumes the evaluator and hands back its output sink.
    pub fn into_output(self) -> Out {
        self.output
    }

    pub fn evaluate(&mut self, expr: &Expr, env: &mut Environment) -> EvalResult {
        match expr {
            Expr::Atom(token) => Self::evaluate_atom(token, env),
            Expr::List(list) => self.evaluate_list(list, env),
        }
    }

    fn evaluate_atom(token: &Token, env: &Environment) -> EvalResult {
        match token.token_type() {
            TokenType::Number => parse_number(token.source()),
            TokenType::String => Ok(Value::String(token.source().to_owned())),
            TokenType::Identifier => env.find_variable(token.source()).cloned()
                .ok_or_else(|| RuntimeError::UndefinedVariable(token.source().to_owned())),
            _ => Err(RuntimeError::Unevaluable),
        }
    }

    fn evaluate_list(&mut self, list: &[Expr], env: &mut Environment) -> EvalResult {
        let Some((head, rest)) = list.split_first() else {
            return Ok(Value::Nil);
        };

        if let Expr::Atom(token) = head {
            if token.token_type() == TokenType::Identifier && KEYWORDS.contains(token.source()) {
                match token.source() {
                    "def" => return self.eval_def(rest, env),
                    "print" => return self.eval_print(rest, env),
                    "if" => return self.eval_if(rest, env),
                    "loop" => return self.eval_loop(rest, env),
                    "do" => return self.eval_do(rest, env),
                    "fun" => return self.eval_fun(rest, env),
                    "input" => return self.eval_input(rest, env),
                    "Number" => return self.eval_number(rest, env),
                    "String" => return self.eval_string(rest, env),
                    "typeof" => return self.eval_typeof(rest, env),
                    "len" => return self.eval_len(rest, env),
                    "get" => return self.eval_get(rest, env),
                    "set" => return self.eval_set(rest, env),
                    "sys" => return self.eval_sys(rest, env),
                    "random" => return self.eval_random(rest, env),
                    "ord" => return self.eval_ord(rest, env),
                    "chr" => return self.eval_chr(rest, env),
                    // "Random" has no handler and falls through
                    _ => {},
                }
            }
        }

        let head_value = self.evaluate(head, env)?;

        if let Value::Function(function) = head_value {
            self.call_function(&function, rest, env)
        } else {
            self.evaluate_operator_chain(head_value, rest, env)
        }
    }

    // Special forms

    fn eval_def(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 2 {
            return Err(RuntimeError::FormArity { form: "def", expected: "2 arguments (name, value)", received: args.len() });
        }

        let Expr::Atom(name) = &args[0] else {
            return Err(RuntimeError::TypeError(String::from("the first argument to 'def' must be a name")));
        };

        let value = self.evaluate(&args[1], env)?;
        env.put_variable(name.source(), value.clone());
        Ok(value)
    }

    fn eval_print(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        let mut text = String::new();

        for arg in args {
            text.push_str(&self.evaluate(arg, env)?.to_string());
        }

        let _ = write!(self.output, "{}", text);
        Ok(Value::Nil)
    }

    fn eval_if(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 2 {
            return Err(RuntimeError::FormArity { form: "if", expected: "2 arguments (condition, body)", received: args.len() });
        }

        // there is no else branch
        if self.evaluate(&args[0], env)?.truthy() {
            self.evaluate(&args[1], env)
        } else {
            Ok(Value::Nil)
        }
    }

    fn eval_loop(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 2 {
            return Err(RuntimeError::FormArity { form: "loop", expected: "2 arguments (condition, body)", received: args.len() });
        }

        let mut last = Value::Nil;

        // yields the last body value, or nil if the body never ran
        while self.evaluate(&args[0], env)?.truthy() {
            last = self.evaluate(&args[1], env)?;
        }

        Ok(last)
    }

    fn eval_do(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        let mut last = Value::Nil;

        for arg in args {
            last = self.evaluate(arg, env)?;
        }

        Ok(last)
    }

    fn eval_fun(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 2 {
            return Err(RuntimeError::FormArity { form: "fun", expected: "2 arguments (parameters, body)", received: args.len() });
        }

        let Expr::List(params) = &args[0] else {
            return Err(RuntimeError::TypeError(String::from("the parameter list of 'fun' must be a list of names")));
        };

        let mut parameters = Vec::with_capacity(params.len());

        for param in params {
            match param {
                Expr::Atom(token) if token.token_type() == TokenType::Identifier =>
                    parameters.push(token.source().to_owned()),
                _ => return Err(RuntimeError::TypeError(String::from("the parameter list of 'fun' must be a list of names"))),
            }
        }

        Ok(Value::Function(Function {
            parameters,
            body: Rc::new(args[1].clone()),
            // the defining environment is snapshotted here; later changes
            // to it are invisible to the function
            closure: env.clone(),
        }))
    }

    fn eval_input(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() > 1 {
            return Err(RuntimeError::FormArity { form: "input", expected: "0 or 1 arguments", received: args.len() });
        }

        if let Some(prompt) = args.first() {
            let prompt = self.evaluate(prompt, env)?;
            let _ = write!(self.output, "{}", prompt);
            let _ = self.output.flush();
        }

        let mut line = String::new();
        let _ = self.input.read_line(&mut line);

        if line.ends_with('\n') {
            line.pop();
        }
        if line.ends_with('\r') {
            line.pop();
        }

        Ok(Value::String(line))
    }

    fn eval_number(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 1 {
            return Err(RuntimeError::FormArity { form: "Number", expected: "1 argument", received: args.len() });
        }

        match self.evaluate(&args[0], env)? {
            Value::String(text) => parse_number(text.trim()),
            value => Ok(value),
        }
    }

    fn eval_string(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 1 {
            return Err(RuntimeError::FormArity { form: "String", expected: "1 argument", received: args.len() });
        }

        Ok(Value::String(self.evaluate(&args[0], env)?.to_string()))
    }

    fn eval_typeof(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 1 {
            return Err(RuntimeError::FormArity { form: "typeof", expected: "1 argument", received: args.len() });
        }

        Ok(Value::String(self.evaluate(&args[0], env)?.type_name().to_owned()))
    }

    fn eval_len(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 1 {
            return Err(RuntimeError::FormArity { form: "len", expected: "1 argument (string)", received: args.len() });
        }

        match self.evaluate(&args[0], env)? {
            Value::String(s) => Ok(Value::Number(s.chars().count() as i64)),
            _ => Err(RuntimeError::TypeError(String::from("'len' only operates on strings"))),
        }
    }

    fn eval_get(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 2 {
            return Err(RuntimeError::FormArity { form: "get", expected: "2 arguments (string, index)", received: args.len() });
        }

        let Value::String(text) = self.evaluate(&args[0], env)? else {
            return Err(RuntimeError::TypeError(String::from("the first argument to 'get' must be a string")));
        };

        let Value::Number(index) = self.evaluate(&args[1], env)? else {
            return Err(RuntimeError::TypeError(String::from("the second argument to 'get' must be a number (index)")));
        };

        match char_at(&text, index) {
            Some(c) => Ok(Value::String(c.to_string())),
            None => Err(RuntimeError::IndexOutOfBounds { index, length: text.chars().count() }),
        }
    }

    fn eval_set(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 3 {
            return Err(RuntimeError::FormArity { form: "set", expected: "3 arguments (identifier, index, value)", received: args.len() });
        }

        let name = match &args[0] {
            Expr::Atom(token) if token.token_type() == TokenType::Identifier => token.source().to_owned(),
            _ => return Err(RuntimeError::TypeError(String::from("the first argument to 'set' must be a variable identifier"))),
        };

        if !matches!(env.find_variable(&name), Some(Value::String(_))) {
            return Err(RuntimeError::TypeError(String::from("the variable for 'set' must exist and hold a string")));
        }

        let Value::Number(index) = self.evaluate(&args[1], env)? else {
            return Err(RuntimeError::TypeError(String::from("the second argument to 'set' must be a number (index)")));
        };

        let replacement = match self.evaluate(&args[2], env)? {
            Value::String(s) => {
                let mut chars = s.chars();

                match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => return Err(RuntimeError::TypeError(String::from("the third argument to 'set' must be a single-character string"))),
                }
            },
            _ => return Err(RuntimeError::TypeError(String::from("the third argument to 'set' must be a single-character string"))),
        };

        // the index/value expressions ran in `env` and may have rebound the
        // target, so look it up again before mutating
        let Some(Value::String(stored)) = env.find_variable_mut(&name) else {
            return Err(RuntimeError::TypeError(String::from("the variable for 'set' must exist and hold a string")));
        };

        let mut chars: Vec<char> = stored.chars().collect();

        match usize::try_from(index).ok().filter(|i| *i < chars.len()) {
            Some(i) => chars[i] = replacement,
            None => return Err(RuntimeError::IndexOutOfBounds { index, length: chars.len() }),
        }

        let updated: String = chars.into_iter().collect();
        *stored = updated.clone();
        Ok(Value::String(updated))
    }

    fn eval_sys(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 1 {
            return Err(RuntimeError::FormArity { form: "sys", expected: "1 argument (a command string)", received: args.len() });
        }

        let Value::String(command) = self.evaluate(&args[0], env)? else {
            return Err(RuntimeError::TypeError(String::from("the argument to 'sys' must be a string")));
        };

        // blocks until the child exits; only stdout is captured and the
        // exit status is not surfaced to the language
        let output = Command::new("sh").arg("-c").arg(&command).output()
            .map_err(RuntimeError::CommandFailed)?;

        Ok(Value::String(String::from_utf8_lossy(&output.stdout).into_owned()))
    }

    fn eval_random(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 2 {
            return Err(RuntimeError::FormArity { form: "random", expected: "2 arguments (min, max)", received: args.len() });
        }

        let (Value::Number(min), Value::Number(max)) =
            (self.evaluate(&args[0], env)?, self.evaluate(&args[1], env)?) else {
            return Err(RuntimeError::TypeError(String::from("the arguments to 'random' must be numbers")));
        };

        if min > max {
            return Err(RuntimeError::InvalidRandomRange { min, max });
        }

        Ok(Value::Number(self.rng.gen_range(min..=max)))
    }

    fn eval_ord(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 1 {
            return Err(RuntimeError::FormArity { form: "ord", expected: "1 argument (string)", received: args.len() });
        }

        match self.evaluate(&args[0], env)? {
            Value::String(s) => match s.chars().next() {
                Some(c) => Ok(Value::Number(c as i64)),
                None => Err(RuntimeError::TypeError(String::from("the argument to 'ord' must be a non-empty string"))),
            },
            _ => Err(RuntimeError::TypeError(String::from("the argument to 'ord' must be a non-empty string"))),
        }
    }

    fn eval_chr(&mut self, args: &[Expr], env: &mut Environment) -> EvalResult {
        if args.len() != 1 {
            return Err(RuntimeError::FormArity { form: "chr", expected: "1 argument (number)", received: args.len() });
        }

        match self.evaluate(&args[0], env)? {
            // the code is truncated to a single byte, like a C char cast
            Value::Number(code) => Ok(Value::String(char::from(code as u8).to_string())),
            _ => Err(RuntimeError::TypeError(String::from("the argument to 'chr' must be a number"))),
        }
    }

    // Calls and operator chains

    fn call_function(&mut self, function: &Function, args: &[Expr], env: &mut Environment) -> EvalResult {
        if function.parameters.len() != args.len() {
            return Err(RuntimeError::CallArity { expected: function.parameters.len(), received: args.len() });
        }

        // each call starts from a fresh copy of the definition-time
        // snapshot; nothing the body does leaks back out
        let mut call_env = function.closure.clone();

        for (parameter, arg) in function.parameters.iter().zip(args) {
            let value = self.evaluate(arg, env)?;
            call_env.put_variable(parameter, value);
        }

        self.evaluate(&function.body, &mut call_env)
    }

    /// Evaluates `value0 op1 value1 op2 value2 ...`, folding strictly left
    /// to right. There is no precedence: `(2 + 3 * 4)` is `(2 + 3) * 4`.
    fn evaluate_operator_chain(&mut self, first: Value, rest: &[Expr], env: &mut Environment) -> EvalResult {
        let mut result = first;

        for pair in rest.chunks(2) {
            let operator = match &pair[0] {
                Expr::Atom(token) => token.source(),
                Expr::List(_) => return Err(RuntimeError::TypeError(String::from("expected an operator between operands"))),
            };

            let Some(operand) = pair.get(1) else {
                return Err(RuntimeError::DanglingOperator(operator.to_owned()));
            };

            let rhs = self.evaluate(operand, env)?;
            result = apply_operator(operator, result, rhs)?;
        }

        Ok(result)
    }
}

/// Applies one binary operator to the running result and the next operand.
fn apply_operator(operator: &str, lhs: Value, rhs: Value) -> EvalResult {
    match operator {
        // `+` concatenates when either side is a string
        "+" => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.wrapping_add(b))),
            (lhs @ Value::String(_), rhs) | (lhs, rhs @ Value::String(_)) =>
                Ok(Value::String(format!("{}{}", lhs, rhs))),
            _ => Err(numeric_operands_error("+")),
        },

        // equality compares the text form of both sides, so it is defined
        // for every value kind
        "==" => Ok(Value::Number((lhs.to_string() == rhs.to_string()) as i64)),
        "!=" => Ok(Value::Number((lhs.to_string() != rhs.to_string()) as i64)),

        _ => {
            let (Value::Number(a), Value::Number(b)) = (lhs, rhs) else {
                return Err(numeric_operands_error(operator));
            };

            match operator {
                "-" => Ok(Value::Number(a.wrapping_sub(b))),
                "*" => Ok(Value::Number(a.wrapping_mul(b))),
                "/" if b == 0 => Err(RuntimeError::DivisionByZero),
                "/" => Ok(Value::Number(a.wrapping_div(b))),
                "%" if b == 0 => Err(RuntimeError::DivisionByZero),
                "%" => Ok(Value::Number(a.wrapping_rem(b))),
                ">" => Ok(Value::Number((a > b) as i64)),
                "<" => Ok(Value::Number((a < b) as i64)),
                ">=" => Ok(Value::Number((a >= b) as i64)),
                "<=" => Ok(Value::Number((a <= b) as i64)),
                _ => Err(RuntimeError::UnknownOperator(operator.to_owned())),
            }
        },
    }
}

fn numeric_operands_error(operator: &str) -> RuntimeError {
    RuntimeError::TypeError(format!("operator '{}' requires numeric operands", operator))
}

fn parse_number(text: &str) -> EvalResult {
    text.parse::<i64>()
        .map(Value::Number)
        .map_err(|_| RuntimeError::MalformedNumber(text.to_owned()))
}

fn char_at(text: &str, index: i64) -> Option<char> {
    usize::try_from(index).ok().and_then(|index| text.chars().nth(index))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use super::*;
    use crate::interpreter::lexer::Lexer;
    use crate::interpreter::parser::Parser;

    fn parse(source: &str) -> Vec<Expr> {
        Parser::new(Lexer::new(source)).parse().expect("test program should parse")
    }

    /// Runs every top-level expression of `source` with the given stdin
    /// text; returns the last result and the captured output.
    fn run_with_input(source: &str, input: &str) -> (EvalResult, String) {
        let mut evaluator = Evaluator::with_io(Cursor::new(input.to_owned()), Vec::new());
        let mut env = Environment::new();
        let mut result = Ok(Value::Nil);

        for expr in &parse(source) {
            result = evaluator.evaluate(expr, &mut env);

            if result.is_err() {
                break;
            }
        }

        let output = String::from_utf8(evaluator.into_output()).expect("output should be UTF-8");
        (result, output)
    }

    fn eval(source: &str) -> Value {
        let (result, _) = run_with_input(source, "");
        result.expect("test program should evaluate")
    }

    fn eval_err(source: &str) -> RuntimeError {
        let (result, _) = run_with_input(source, "");
        result.expect_err("test program should fail")
    }

    fn output_of(source: &str) -> String {
        let (result, output) = run_with_input(source, "");
        result.expect("test program should evaluate");
        output
    }

    #[test]
    fn operator_chains_fold_left_to_right_without_precedence() {
        assert_eq!(eval("(2 + 3 * 4)"), Value::Number(20));
        assert_eq!(eval("(10 - 2 - 3)"), Value::Number(5));
        assert_eq!(eval("(1 + 2 == 3)"), Value::Number(1));
        assert_eq!(eval("(7)"), Value::Number(7));
    }

    #[test]
    fn plus_concatenates_when_either_side_is_a_string() {
        assert_eq!(eval("(\"a\" + 1 + 2)"), Value::String(String::from("a12")));
        assert_eq!(eval("(1 + 2 + \"a\")"), Value::String(String::from("3a")));
    }

    #[test]
    fn equality_compares_text_forms() {
        assert_eq!(eval("(1 == \"1\")"), Value::Number(1));
        assert_eq!(eval("(1 != \"1\")"), Value::Number(0));
        assert_eq!(eval("((if 0 1) == \"nil\")"), Value::Number(1));
    }

    #[test]
    fn comparison_operators_yield_zero_or_one() {
        assert_eq!(eval("(2 < 3)"), Value::Number(1));
        assert_eq!(eval("(2 >= 3)"), Value::Number(0));
        assert_eq!(eval("(3 <= 3)"), Value::Number(1));
    }

    #[test]
    fn division_and_modulo_by_zero_fail() {
        assert!(matches!(eval_err("(1 / 0)"), RuntimeError::DivisionByZero));
        assert!(matches!(eval_err("(1 % 0)"), RuntimeError::DivisionByZero));
        assert_eq!(eval("(7 / 2)"), Value::Number(3));
        assert_eq!(eval("(7 % 2)"), Value::Number(1));
    }

    #[test]
    fn arithmetic_wraps_at_sixty_four_bits() {
        assert_eq!(eval("(9223372036854775807 + 1)"), Value::Number(i64::MIN));
    }

    #[test]
    fn non_numeric_operands_are_type_errors() {
        assert!(matches!(eval_err("(\"a\" - 1)"), RuntimeError::TypeError(_)));
        assert!(matches!(eval_err("(1 * \"a\")"), RuntimeError::TypeError(_)));
        assert!(matches!(eval_err("((if 0 1) + 1)"), RuntimeError::TypeError(_)));
    }

    #[test]
    fn unknown_operators_fail_by_name() {
        match eval_err("(1 foo 2)") {
            RuntimeError::UnknownOperator(operator) => assert_eq!(operator, "foo"),
            other => panic!("expected an unknown operator error, got {:?}", other),
        }
    }

    #[test]
    fn trailing_operator_fails() {
        assert!(matches!(eval_err("(1 +)"), RuntimeError::DanglingOperator(_)));
    }

    #[test]
    fn operators_are_infix_only() {
        // an operator atom cannot head a list; there is no prefix syntax
        assert!(matches!(eval_err("(< 1 2)"), RuntimeError::Unevaluable));
        assert!(matches!(eval_err("(+ 1 2)"), RuntimeError::Unevaluable));
    }

    #[test]
    fn def_binds_and_returns_the_value() {
        assert_eq!(eval("(def x 5)"), Value::Number(5));
        assert_eq!(eval("(def x 5) x"), Value::Number(5));
        // re-defing overwrites in the same environment
        assert_eq!(eval("(def x 5) (def x 6) x"), Value::Number(6));
    }

    #[test]
    fn undefined_variables_fail_by_name() {
        match eval_err("missing") {
            RuntimeError::UndefinedVariable(name) => assert_eq!(name, "missing"),
            other => panic!("expected an undefined variable error, got {:?}", other),
        }
    }

    #[test]
    fn empty_list_is_nil() {
        assert_eq!(eval("()"), Value::Nil);
    }

    #[test]
    fn if_without_else_yields_nil() {
        assert_eq!(eval("(if 1 5)"), Value::Number(5));
        assert_eq!(eval("(if 0 5)"), Value::Nil);
    }

    #[test]
    fn nil_and_functions_are_truthy_conditions() {
        // the condition `()` evaluates to nil, which counts as truthy
        assert_eq!(eval("(if () 5)"), Value::Number(5));
        assert_eq!(eval("(if (fun () 1) 5)"), Value::Number(5));
        assert_eq!(eval("(if \"\" 5)"), Value::Nil);
    }

    #[test]
    fn do_yields_the_last_value() {
        assert_eq!(eval("(do 1 2 3)"), Value::Number(3));
        assert_eq!(eval("(do)"), Value::Nil);
    }

    #[test]
    fn loop_yields_the_last_body_value() {
        // the last body value is what the final `def` returned
        assert_eq!(eval("(def i 0) (loop (i < 3) (do (print i) (def i (i + 1))))"), Value::Number(3));
        // a loop whose body never runs yields nil
        assert_eq!(eval("(loop 0 1)"), Value::Nil);
    }

    #[test]
    fn loop_prints_each_iteration() {
        assert_eq!(output_of("(def i 0) (loop (i < 3) (do (print i) (def i (i + 1))))"), "012");
    }

    #[test]
    fn closures_snapshot_their_environment() {
        assert_eq!(eval("(def x 1) (def f (fun () x)) (def x 2) (f)"), Value::Number(1));
    }

    #[test]
    fn function_bodies_cannot_leak_bindings() {
        assert_eq!(eval("(def x 1) (def f (fun () (def x 99))) (f) x"), Value::Number(1));
    }

    #[test]
    fn arguments_evaluate_in_the_caller_environment() {
        assert_eq!(eval("(def f (fun (a) a)) (def y 7) (f (y + 1))"), Value::Number(8));
    }

    #[test]
    fn call_arity_is_exact() {
        match eval_err("(def f (fun (a b) (a + b))) (f 1)") {
            RuntimeError::CallArity { expected, received } => {
                assert_eq!(expected, 2);
                assert_eq!(received, 1);
            },
            other => panic!("expected a call arity error, got {:?}", other),
        }
    }

    #[test]
    fn calls_rebind_parameters_each_time() {
        assert_eq!(eval("(def f (fun (a) (a * a))) (f 3) (f 5)"), Value::Number(25));
    }

    #[test]
    fn special_form_arity_is_checked() {
        assert!(matches!(eval_err("(def x)"), RuntimeError::FormArity { form: "def", .. }));
        assert!(matches!(eval_err("(if 1)"), RuntimeError::FormArity { form: "if", .. }));
        assert!(matches!(eval_err("(len)"), RuntimeError::FormArity { form: "len", .. }));
    }

    #[test]
    fn capitalized_random_is_not_a_special_form() {
        // "Random" is in the keyword set but has no handler, so it falls
        // back to an ordinary identifier lookup
        match eval_err("(Random 1 2)") {
            RuntimeError::UndefinedVariable(name) => assert_eq!(name, "Random"),
            other => panic!("expected an undefined variable error, got {:?}", other),
        }
    }

    #[test]
    fn random_stays_in_range() {
        for _ in 0..64 {
            let Value::Number(n) = eval("(random 1 6)") else { panic!() };
            assert!((1..=6).contains(&n));
        }

        assert_eq!(eval("(random 4 4)"), Value::Number(4));
        assert!(matches!(eval_err("(random 5 2)"), RuntimeError::InvalidRandomRange { min: 5, max: 2 }));
    }

    #[test]
    fn typeof_names_every_kind() {
        assert_eq!(eval("(typeof 5)"), Value::String(String::from("number")));
        assert_eq!(eval("(typeof \"a\")"), Value::String(String::from("string")));
        assert_eq!(eval("(typeof (fun () 1))"), Value::String(String::from("function")));
        assert_eq!(eval("(typeof (if 0 1))"), Value::String(String::from("nil")));
    }

    #[test]
    fn number_parses_strings_and_passes_everything_else_through() {
        assert_eq!(eval("(Number \"42\")"), Value::Number(42));
        assert_eq!(eval("(Number \"-3\")"), Value::Number(-3));
        assert_eq!(eval("(Number 7)"), Value::Number(7));
        assert_eq!(eval("(Number (if 0 1))"), Value::Nil);
        assert!(matches!(eval_err("(Number \"abc\")"), RuntimeError::MalformedNumber(_)));
    }

    #[test]
    fn string_converts_to_text() {
        assert_eq!(eval("(String 42)"), Value::String(String::from("42")));
        assert_eq!(eval("(String (if 0 1))"), Value::String(String::from("nil")));
    }

    #[test]
    fn len_counts_characters() {
        assert_eq!(eval("(len \"hello\")"), Value::Number(5));
        assert_eq!(eval("(len \"\")"), Value::Number(0));
        assert!(matches!(eval_err("(len 5)"), RuntimeError::TypeError(_)));
    }

    #[test]
    fn get_indexes_characters() {
        assert_eq!(eval("(get \"abc\" 1)"), Value::String(String::from("b")));
        assert!(matches!(eval_err("(get \"\" 0)"), RuntimeError::IndexOutOfBounds { .. }));
        assert!(matches!(eval_err("(get \"abc\" 3)"), RuntimeError::IndexOutOfBounds { .. }));
        assert!(matches!(eval_err("(get \"abc\" (0 - 1))"), RuntimeError::IndexOutOfBounds { .. }));
        assert!(matches!(eval_err("(get 5 0)"), RuntimeError::TypeError(_)));
    }

    #[test]
    fn set_mutates_the_stored_string() {
        assert_eq!(eval("(def s \"abc\") (set s 1 \"X\")"), Value::String(String::from("aXc")));
        assert_eq!(eval("(def s \"abc\") (set s 1 \"X\") (get s 1)"), Value::String(String::from("X")));
        assert!(matches!(eval_err("(def s \"abc\") (set s 9 \"X\")"), RuntimeError::IndexOutOfBounds { .. }));
        assert!(matches!(eval_err("(def s \"abc\") (set s 0 \"XY\")"), RuntimeError::TypeError(_)));
        assert!(matches!(eval_err("(set missing 0 \"X\")"), RuntimeError::TypeError(_)));
        assert!(matches!(eval_err("(def n 5) (set n 0 \"X\")"), RuntimeError::TypeError(_)));
    }

    #[test]
    fn ord_and_chr_convert_character_codes() {
        assert_eq!(eval("(ord \"A\")"), Value::Number(65));
        assert_eq!(eval("(ord \"ABC\")"), Value::Number(65));
        assert_eq!(eval("(chr 65)"), Value::String(String::from("A")));
        // the code is truncated to one byte
        assert_eq!(eval("(chr 321)"), Value::String(String::from("A")));
        assert!(matches!(eval_err("(ord \"\")"), RuntimeError::TypeError(_)));
        assert!(matches!(eval_err("(chr \"A\")"), RuntimeError::TypeError(_)));
    }

    #[test]
    fn index_marker_syntax_reads_characters() {
        assert_eq!(eval("(def t \"abc\") 1't"), Value::String(String::from("b")));
    }

    #[test]
    fn print_concatenates_without_separators_or_newline() {
        assert_eq!(output_of("(print \"a\" 1 (2 + 3))"), "a15");
        assert_eq!(output_of("(print)"), "");
        assert_eq!(output_of("(print (fun () 1))"), "nil");
        assert_eq!(eval("(print 1)"), Value::Nil);
    }

    #[test]
    fn input_reads_one_line_and_prints_the_prompt() {
        let (result, output) = run_with_input("(input \"name: \")", "world\nrest");
        assert_eq!(result.expect("input should succeed"), Value::String(String::from("world")));
        assert_eq!(output, "name: ");
    }

    #[test]
    fn input_strips_a_trailing_carriage_return() {
        let (result, _) = run_with_input("(input)", "dos line\r\n");
        assert_eq!(result.expect("input should succeed"), Value::String(String::from("dos line")));
    }

    #[test]
    fn input_at_end_of_input_yields_an_empty_string() {
        let (result, _) = run_with_input("(input)", "");
        assert_eq!(result.expect("input should succeed"), Value::String(String::new()));
    }

    #[test]
    fn sys_captures_child_stdout() {
        assert_eq!(eval("(sys \"printf x\")"), Value::String(String::from("x")));
        assert!(matches!(eval_err("(sys 5)"), RuntimeError::TypeError(_)));
    }

    #[test]
    fn stray_closing_paren_cannot_be_evaluated() {
        assert!(matches!(eval_err(")"), RuntimeError::Unevaluable));
    }

    #[test]
    fn number_literals_overflowing_sixty_four_bits_fail() {
        assert!(matches!(eval_err("99999999999999999999"), RuntimeError::MalformedNumber(_)));
    }
}
