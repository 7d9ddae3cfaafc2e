mod ast;
mod environment;
mod error;
mod interpreter;
mod parser;
mod resolver;
mod scanner;
mod token;
mod value;

use std::io::Write;

pub use ast::{Expr, ExprId, Stmt};
pub use error::LoxError;
pub use parser::Parser;
pub use resolver::{Resolutions, Resolver};
pub use scanner::{KEYWORDS, Scanner, is_identifier_char, is_identifier_start};
pub use token::{Literal, Span, Token, TokenType};
pub use value::Value;

/// Name of the initializer method, called automatically on instantiation
pub const INITIALIZER_NAME: &str = "init";

/// An interpreter session: scan, parse, resolve, execute.
///
/// State (globals, resolution table, node-id counter) persists across `run`
/// calls, so a REPL feeds each line to the same `Lox`.
pub struct Lox {
    interpreter: interpreter::Interpreter,
    next_expr_id: u32,
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox {
    pub fn new() -> Self {
        Self {
            interpreter: interpreter::Interpreter::new(),
            next_expr_id: 0,
        }
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.interpreter.variable_names()
    }

    /// Run a program, writing its output to `stdout`.
    ///
    /// Returns every error of the first stratum that failed: all lexical
    /// errors, else all parse errors, else all resolution errors, else the
    /// runtime error that aborted execution. An empty vector means success.
    pub fn run<O: Write>(&mut self, source: &str, mut stdout: O) -> Vec<LoxError> {
        let mut errors = Vec::new();

        let mut tokens = Vec::new();
        for result in scanner::Scanner::new(source) {
            match result {
                Ok(token) => tokens.push(token),
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return errors;
        }

        let mut parser = parser::Parser::with_first_id(tokens, self.next_expr_id);
        let statements = parser.parse();
        self.next_expr_id = parser.next_id();

        errors.extend(parser.take_errors());
        if !errors.is_empty() {
            return errors;
        }

        let resolutions = match resolver::Resolver::new().resolve(&statements) {
            Ok(resolutions) => resolutions,
            Err(errs) => return errs,
        };
        self.interpreter.add_resolutions(resolutions);

        for stmt in &statements {
            match self.interpreter.execute(stmt, &mut stdout) {
                Ok(()) => {}
                // A return at top level has no call site; it just ends the run
                Err(LoxError::Return(_)) => break,
                Err(e) => {
                    errors.push(e);
                    break;
                }
            }
        }

        errors
    }
}
