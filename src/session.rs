//! Front-to-back driver: source text in, side effects out.
//!
//! A [`Session`] owns one [`Interpreter`], so globals defined by one `run`
//! are visible to the next.  Every static diagnostic of a run (lexical,
//! syntactic, resolution) is gathered before anything executes; if there is
//! at least one, nothing runs.

use log::{debug, info};

use crate::ast::{Expr, Stmt};
use crate::error::{LoxError, Result};
use crate::interpreter::{Interpreter, Output};
use crate::parser::Parser;
use crate::resolver::{Resolver, ResolverOptions};
use crate::scanner::Scanner;
use crate::token::Token;

/// Scan all of `source`, returning the tokens that were recognised and the
/// lexical errors met along the way.
pub fn scan(source: &str) -> (Vec<Token>, Vec<LoxError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for result in Scanner::new(source) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }

    debug!("Scanned {} token(s), {} error(s)", tokens.len(), errors.len());

    (tokens, errors)
}

/// Scan and parse a whole program.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>> {
    let (tokens, mut errors) = scan(source);

    match Parser::new(&tokens).parse() {
        Ok(statements) if errors.is_empty() => Ok(statements),
        Ok(_) => Err(LoxError::Compile(errors)),
        Err(parse_errors) => {
            errors.extend(parse_errors);
            Err(LoxError::Compile(errors))
        }
    }
}

/// Scan and parse a single expression.
pub fn parse_expression(source: &str) -> Result<Expr> {
    let (tokens, mut errors) = scan(source);

    match Parser::new(&tokens).parse_expression() {
        Ok(expr) if errors.is_empty() => Ok(expr),
        Ok(_) => Err(LoxError::Compile(errors)),
        Err(parse_errors) => {
            errors.extend(parse_errors);
            Err(LoxError::Compile(errors))
        }
    }
}

pub struct Session {
    interpreter: Interpreter,
    options: ResolverOptions,
    warnings: Vec<LoxError>,
}

impl Session {
    pub fn new(options: ResolverOptions) -> Self {
        Self::with_output(Output::Stdout, options)
    }

    pub fn with_output(output: Output, options: ResolverOptions) -> Self {
        info!("Session created with {:?}", options);

        Self {
            interpreter: Interpreter::with_output(output),
            options,
            warnings: Vec::new(),
        }
    }

    /// Echo top-level expression statements, as an interactive prompt does.
    pub fn set_repl(&mut self, repl: bool) {
        self.interpreter.set_repl(repl);
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Lint warnings collected since the last call.
    pub fn take_warnings(&mut self) -> Vec<LoxError> {
        std::mem::take(&mut self.warnings)
    }

    /// Compile and execute one source text.
    pub fn run(&mut self, source: &str) -> Result<()> {
        let statements = parse_program(source)?;

        let resolution = Resolver::new(self.options)
            .resolve(&statements)
            .map_err(LoxError::Compile)?;

        self.interpreter.note_locals(&resolution);
        self.warnings.extend(resolution.into_warnings());

        info!("Executing {} statement(s)", statements.len());

        self.interpreter.interpret(&statements)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ResolverOptions::default())
    }
}
