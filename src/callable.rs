//! Things that can be called: host-provided natives and user functions.
//! Classes are callable too; their impl lives in [`crate::class`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::FunctionExpr;
use crate::class::LoxInstance;
use crate::environment::{Environment, Frame};
use crate::error::{Result, RuntimeError};
use crate::interpreter::{Flow, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// Signature of a host function: receives the already-evaluated arguments.
pub type NativeFn = fn(&[Value]) -> std::result::Result<Value, String>;

/// Common calling convention.  The interpreter checks the argument count
/// against `arity` before calling `call`.
pub trait Callable {
    fn arity(&self) -> usize;

    /// `paren` is the call's closing parenthesis, for error locations.
    fn call(&self, interpreter: &mut Interpreter, paren: &Token, arguments: Vec<Value>)
        -> Result<Value>;
}

/// A function implemented by the host.
pub struct NativeFunction {
    name: String,
    arity: usize,
    func: NativeFn,
}

impl NativeFunction {
    pub fn new(name: &str, arity: usize, func: NativeFn) -> Self {
        Self {
            name: name.to_string(),
            arity,
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}/{}>", self.name, self.arity)
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(
        &self,
        _interpreter: &mut Interpreter,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);

        let result = (self.func)(&arguments).map_err(|message| RuntimeError::Native {
            name: self.name.clone(),
            message,
            line: paren.line,
        })?;

        info!("Native function '{}' returned: {}", self.name, result);

        Ok(result)
    }
}

/// A user-defined function or method together with the frame it closes
/// over.
#[derive(Clone)]
pub struct LoxFunction {
    /// `None` for anonymous `fun` expressions.
    name: Option<String>,
    declaration: Rc<FunctionExpr>,
    /// `None` when defined at top level, where only globals are visible.
    closure: Option<Frame>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        name: Option<String>,
        declaration: Rc<FunctionExpr>,
        closure: Option<Frame>,
        is_initializer: bool,
    ) -> Self {
        Self {
            name,
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Copy of this method whose closure gains a one-slot frame holding
    /// `this`, so the body finds it at depth 0, slot 0 of that frame.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let frame = Environment::frame(self.closure.clone());
        frame.borrow_mut().define(Value::Instance(instance));

        LoxFunction {
            closure: Some(frame),
            ..self.clone()
        }
    }

    /// The bound instance of an initializer.
    fn this(&self, paren: &Token) -> Result<Value> {
        let missing = || RuntimeError::UndefinedVariable {
            name: "this".to_string(),
            line: paren.line,
        };

        let closure = self.closure.as_ref().ok_or_else(missing)?;

        Ok(Environment::get_at(closure, 0, 0).map_err(|_| missing())?)
    }
}

impl fmt::Debug for LoxFunction {
    // The closure is left out: frames can reach this function again.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name)
            .field("arity", &self.declaration.params.len())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        debug!(
            "Calling user-defined function '{}'",
            self.name.as_deref().unwrap_or("<anonymous>")
        );

        // Parameters fill the first slots of a frame chained to the
        // definition site, not the call site.
        let frame = Environment::frame(self.closure.clone());
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            debug!("Binding parameter '{}' to {}", param.lexeme, argument);
            frame.borrow_mut().define(argument);
        }

        let flow = interpreter.execute_block(&self.declaration.body, frame)?;

        if self.is_initializer {
            return self.this(paren);
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break => Ok(Value::Nil),
        }
    }
}
