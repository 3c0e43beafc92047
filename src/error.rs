//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic inter‑operation
//! with `anyhow`, while still preserving rich diagnostic detail.
//!
//! Three tiers never mix: static diagnostics (`Lex`, `Parse`, `Resolve`, and
//! their batch form `Compile`) are produced before anything runs, while
//! [`RuntimeError`] is raised by the evaluator and aborts only the current
//! `interpret` call.
//!
//! The module **does not** print diagnostics itself

use std::fmt;
use std::io;
use thiserror::Error;

use log::info;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error: {message}")]
    Parse { message: String, line: usize },

    /// Static‑analysis or resolution failure (e.g. early‑binding errors).
    #[error("[line {line}] Error: {message}")]
    Resolve { message: String, line: usize },

    /// Every static diagnostic of one run, in the order they were found.
    #[error("{}", Diagnostics(.0))]
    Compile(Vec<LoxError>),

    /// Runtime evaluation error.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", line, message);

        LoxError::Parse { message, line }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", line, message);

        LoxError::Resolve { message, line }
    }

    /// Source line of a static diagnostic or runtime error, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Lex { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolve { line, .. } => Some(*line),
            LoxError::Runtime(e) => e.line(),
            _ => None,
        }
    }

    /// The bare message, without the `[line N] Error:` prefix.
    pub fn message(&self) -> String {
        match self {
            LoxError::Lex { message, .. }
            | LoxError::Parse { message, .. }
            | LoxError::Resolve { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// One diagnostic per line, used to render [`LoxError::Compile`].
struct Diagnostics<'e>(&'e [LoxError]);

impl fmt::Display for Diagnostics<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }

            write!(f, "{}", error)?;
        }

        Ok(())
    }
}

/// Typed failures raised while evaluating a program.
///
/// Each variant carries the line of the token that caused it so the caller
/// can point at the offending operator, call, or property.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    #[error("[line {line}] Operand of '{operator}' must be a number.")]
    OperandMustBeNumber { operator: String, line: usize },

    #[error("[line {line}] Operands of '{operator}' must be numbers.")]
    OperandsMustBeNumbers { operator: String, line: usize },

    #[error("[line {line}] Operands of '+' must be two numbers or include a string.")]
    InvalidAddition { line: usize },

    #[error("[line {line}] Can't divide by zero.")]
    DivisionByZero { line: usize },

    #[error("[line {line}] Undefined variable '{name}'.")]
    UndefinedVariable { name: String, line: usize },

    #[error("[line {line}] Undefined property '{name}'.")]
    UndefinedProperty { name: String, line: usize },

    #[error("[line {line}] Expected {expected} arguments but got {got}.")]
    ArityMismatch {
        expected: usize,
        got: usize,
        line: usize,
    },

    #[error("[line {line}] Can only call functions and classes.")]
    NotCallable { line: usize },

    #[error("[line {line}] Only instances have properties.")]
    NotAnInstance { line: usize },

    #[error("[line {line}] Only instances have fields.")]
    FieldOnNonInstance { line: usize },

    #[error("[line {line}] Superclass must be a class.")]
    SuperclassNotClass { line: usize },

    #[error("[line {line}] Native function '{name}' failed: {message}")]
    Native {
        name: String,
        message: String,
        line: usize,
    },

    /// A resolved address pointed outside the live frame chain.  Frames
    /// raise it; the interpreter turns it into `UndefinedVariable` at the
    /// token that asked, so it never reaches a user without a line.
    #[error("No local slot {slot} at depth {depth}.")]
    InvalidSlot { depth: usize, slot: usize },
}

impl RuntimeError {
    pub fn line(&self) -> Option<usize> {
        match self {
            RuntimeError::OperandMustBeNumber { line, .. }
            | RuntimeError::OperandsMustBeNumbers { line, .. }
            | RuntimeError::InvalidAddition { line }
            | RuntimeError::DivisionByZero { line }
            | RuntimeError::UndefinedVariable { line, .. }
            | RuntimeError::UndefinedProperty { line, .. }
            | RuntimeError::ArityMismatch { line, .. }
            | RuntimeError::NotCallable { line }
            | RuntimeError::NotAnInstance { line }
            | RuntimeError::FieldOnNonInstance { line }
            | RuntimeError::SuperclassNotClass { line }
            | RuntimeError::Native { line, .. } => Some(*line),
            RuntimeError::InvalidSlot { .. } => None,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
