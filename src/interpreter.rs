//! Tree-walking evaluator.
//!
//! Locals are read and written through the frame chain at the `(depth, slot)`
//! addresses recorded by the resolver; anything without an address lives in
//! the flat global table.  `return` and `break` travel outward as [`Flow`]
//! values instead of errors.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::callable::{Callable, LoxFunction, NativeFn, NativeFunction};
use crate::class::{LoxClass, LoxInstance, INITIALIZER};
use crate::environment::{Environment, Frame};
use crate::error::{Result, RuntimeError};
use crate::resolver::{Resolution, Slot};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Fell through to the next statement.
    Normal,
    /// `break`: caught by the nearest enclosing loop.
    Break,
    /// `return`: caught by the nearest enclosing call.
    Return(Value),
}

/// Where `print` (and REPL echo) output goes.
#[derive(Debug, Clone, Default)]
pub enum Output {
    #[default]
    Stdout,
    /// Capture into a shared buffer (tests, embedding hosts).
    Buffer(Rc<RefCell<String>>),
}

impl Output {
    /// Fresh capture buffer plus the sink that writes into it.
    pub fn buffer() -> (Self, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        (Output::Buffer(Rc::clone(&buffer)), buffer)
    }

    fn println(&self, text: &str) -> std::io::Result<()> {
        match self {
            Output::Stdout => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{}", text)
            }
            Output::Buffer(buffer) => {
                let mut buffer = buffer.borrow_mut();
                buffer.push_str(text);
                buffer.push('\n');
                Ok(())
            }
        }
    }
}

pub struct Interpreter {
    globals: HashMap<String, Value>,
    /// Innermost frame; `None` while running top-level code.
    environment: Option<Frame>,
    locals: HashMap<ExprId, Slot>,
    output: Output,
    repl: bool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates a new Interpreter printing to stdout, with native functions
    /// such as `clock` defined.
    pub fn new() -> Self {
        Self::with_output(Output::Stdout)
    }

    pub fn with_output(output: Output) -> Self {
        info!("Initializing Interpreter");

        let mut interpreter = Self {
            globals: HashMap::new(),
            environment: None,
            locals: HashMap::new(),
            output,
            repl: false,
        };

        interpreter.define_native("clock", 0, |_args: &[Value]| {
            let now = Utc::now();
            let seconds = now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6;
            Ok(Value::Number(seconds))
        });

        interpreter
    }

    /// Register a host function in the global namespace.
    pub fn define_native(&mut self, name: &str, arity: usize, func: NativeFn) {
        debug!("Defining native function '{}'", name);

        self.globals.insert(
            name.to_string(),
            Value::Native(Rc::new(NativeFunction::new(name, arity, func))),
        );
    }

    /// In interactive mode top-level expression statements echo their value.
    pub fn set_repl(&mut self, repl: bool) {
        self.repl = repl;
    }

    /// Merge the addresses produced by a resolver pass.
    pub fn note_locals(&mut self, resolution: &Resolution) {
        debug!("Noting {} resolved local(s)", resolution.locals().len());

        self.locals
            .extend(resolution.locals().iter().map(|(id, slot)| (*id, *slot)));
    }

    /// Read a global by name (hosts and tests use this to inspect results).
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Interprets a list of statements (a "program").  Stops at the first
    /// runtime error.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match stmt {
                Stmt::Expression(expr) if self.repl => {
                    let value = self.evaluate(expr)?;
                    self.output.println(&value.to_string())?;
                }
                _ => {
                    self.execute(stmt)?;
                }
            }
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                self.output.println(&value.to_string())?;
                debug!("Printed value: {}", value);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.define(name, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let frame = Environment::frame(self.environment.clone());
                self.execute_block(statements, frame)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                debug!("Entering while loop");

                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }

                debug!("Exited while loop");
                Ok(Flow::Normal)
            }

            Stmt::Break(_) => Ok(Flow::Break),

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Function(FunctionDecl { name, function }) => {
                let function = LoxFunction::new(
                    Some(name.lexeme.clone()),
                    Rc::clone(function),
                    self.environment.clone(),
                    false,
                );

                info!(
                    "Function '{}' defined with {} parameters",
                    name.lexeme,
                    function.arity()
                );

                self.define(name, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.execute_class(name, superclass.as_ref(), methods)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` with `frame` as the current frame, restoring the
    /// previous frame on every exit path.
    pub fn execute_block(&mut self, statements: &[Stmt], frame: Frame) -> Result<Flow> {
        let previous = self.environment.replace(frame);

        let result = self.execute_all(statements);

        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }

        Ok(Flow::Normal)
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[FunctionDecl],
    ) -> Result<()> {
        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    return Err(RuntimeError::SuperclassNotClass { line: expr.line() }.into());
                }
            },
            None => None,
        };

        // Defined first so methods can refer to the class by name.
        let slot = self.define(name, Value::Nil);

        // Methods close over a frame holding the superclass, mirroring the
        // resolver's `super` scope.
        let method_closure: Option<Frame> = match &superclass {
            Some(superclass) => {
                let frame = Environment::frame(self.environment.clone());
                frame
                    .borrow_mut()
                    .define(Value::Class(Rc::clone(superclass)));
                Some(frame)
            }
            None => self.environment.clone(),
        };

        let methods: HashMap<String, LoxFunction> = methods
            .iter()
            .map(|method| {
                let function = LoxFunction::new(
                    Some(method.name.lexeme.clone()),
                    Rc::clone(&method.function),
                    method_closure.clone(),
                    method.name.lexeme == INITIALIZER,
                );

                (method.name.lexeme.clone(), function)
            })
            .collect();

        let class = Value::Class(Rc::new(LoxClass::new(&name.lexeme, superclass, methods)));

        info!("Class '{}' defined", name.lexeme);

        match (slot, &self.environment) {
            (Some(index), Some(frame)) => Environment::assign_at(frame, 0, index, class)?,
            _ => {
                self.globals.insert(name.lexeme.clone(), class);
            }
        }

        Ok(())
    }

    /// Bind a new name in the current frame (appending a slot), or in the
    /// globals at top level.  Returns the slot when a frame was used.
    fn define(&mut self, name: &Token, value: Value) -> Option<usize> {
        match &self.environment {
            Some(frame) => Some(frame.borrow_mut().define(value)),
            None => {
                self.globals.insert(name.lexeme.clone(), value);
                None
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        let value = match expr {
            Expr::Literal(literal) => match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            },

            Expr::Grouping(inner) => self.evaluate(inner)?,

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right)?,

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right)?,

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                let short_circuit = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    left
                } else {
                    self.evaluate(right)?
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name)?,

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                self.assign_variable(*id, name, value.clone())?;
                value
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.invoke_callable(&callee, paren, values)?
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name)?,
                _ => return Err(RuntimeError::NotAnInstance { line: name.line }.into()),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(RuntimeError::FieldOnNonInstance { line: name.line }.into());
                };

                let value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                value
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword)?,

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method)?,

            Expr::Function(function) => Value::Function(Rc::new(LoxFunction::new(
                None,
                Rc::clone(function),
                self.environment.clone(),
                false,
            ))),
        };

        Ok(value)
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let right = self.evaluate(right)?;

        match (&operator.token_type, right) {
            (TokenType::BANG, value) => Ok(Value::Bool(!value.is_truthy())),
            (TokenType::MINUS, Value::Number(n)) => Ok(Value::Number(-n)),
            _ => Err(RuntimeError::OperandMustBeNumber {
                operator: operator.lexeme.clone(),
                line: operator.line,
            }
            .into()),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        debug!("Binary '{}' on {} and {}", operator.lexeme, left, right);

        let numbers_only = || RuntimeError::OperandsMustBeNumbers {
            operator: operator.lexeme.clone(),
            line: operator.line,
        };

        let value = match operator.token_type {
            TokenType::EQUAL_EQUAL => Value::Bool(left == right),
            TokenType::BANG_EQUAL => Value::Bool(left != right),

            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                (Value::String(a), Value::String(b)) => Value::String(a + &b),
                // Any other pairing with a string concatenates textual forms.
                (a @ Value::String(_), b) | (a, b @ Value::String(_)) => {
                    Value::String(format!("{}{}", a, b))
                }
                _ => return Err(RuntimeError::InvalidAddition { line: operator.line }.into()),
            },

            _ => {
                let (Value::Number(a), Value::Number(b)) = (left, right) else {
                    return Err(numbers_only().into());
                };

                match operator.token_type {
                    TokenType::MINUS => Value::Number(a - b),
                    TokenType::STAR => Value::Number(a * b),
                    TokenType::SLASH => {
                        if b == 0.0 {
                            return Err(RuntimeError::DivisionByZero { line: operator.line }.into());
                        }
                        Value::Number(a / b)
                    }
                    TokenType::GREATER => Value::Bool(a > b),
                    TokenType::GREATER_EQUAL => Value::Bool(a >= b),
                    TokenType::LESS => Value::Bool(a < b),
                    TokenType::LESS_EQUAL => Value::Bool(a <= b),
                    _ => return Err(numbers_only().into()),
                }
            }
        };

        Ok(value)
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let slot = self.slot_of(id, keyword)?;
        let frame = self.current_frame(keyword)?;

        let superclass = Environment::get_at(&frame, slot.depth, slot.index)
            .map_err(|e| unbound_at(e, keyword))?;
        let Value::Class(superclass) = superclass else {
            return Err(RuntimeError::SuperclassNotClass { line: keyword.line }.into());
        };

        // `this` lives in the frame just inside the one holding `super`.
        let missing_this = || RuntimeError::UndefinedVariable {
            name: "this".to_string(),
            line: keyword.line,
        };
        let this_depth = slot.depth.checked_sub(1).ok_or_else(missing_this)?;
        let Ok(Value::Instance(instance)) = Environment::get_at(&frame, this_depth, 0) else {
            return Err(missing_this().into());
        };

        let method = superclass
            .find_method(&method.lexeme)
            .ok_or_else(|| RuntimeError::UndefinedProperty {
                name: method.lexeme.clone(),
                line: method.line,
            })?;

        Ok(Value::Function(Rc::new(method.bind(instance))))
    }

    fn invoke_callable(&mut self, callee: &Value, paren: &Token, arguments: Vec<Value>) -> Result<Value> {
        let callable: &dyn Callable = match callee {
            Value::Native(native) => native.as_ref(),
            Value::Function(function) => function.as_ref(),
            Value::Class(class) => class,
            _ => return Err(RuntimeError::NotCallable { line: paren.line }.into()),
        };

        if arguments.len() != callable.arity() {
            return Err(RuntimeError::ArityMismatch {
                expected: callable.arity(),
                got: arguments.len(),
                line: paren.line,
            }
            .into());
        }

        let result = callable.call(self, paren, arguments)?;
        debug!("Call at line {} returned {}", paren.line, result);

        Ok(result)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Variable access
    // ─────────────────────────────────────────────────────────────────────────

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(slot) => {
                let frame = self.current_frame(name)?;
                Ok(Environment::get_at(&frame, slot.depth, slot.index)
                    .map_err(|e| unbound_at(e, name))?)
            }
            None => self.globals.get(&name.lexeme).cloned().ok_or_else(|| {
                RuntimeError::UndefinedVariable {
                    name: name.lexeme.clone(),
                    line: name.line,
                }
                .into()
            }),
        }
    }

    fn assign_variable(&mut self, id: ExprId, name: &Token, value: Value) -> Result<()> {
        match self.locals.get(&id) {
            Some(slot) => {
                let frame = self.current_frame(name)?;
                Environment::assign_at(&frame, slot.depth, slot.index, value)
                    .map_err(|e| unbound_at(e, name))?;
            }
            None => match self.globals.get_mut(&name.lexeme) {
                Some(cell) => *cell = value,
                None => {
                    return Err(RuntimeError::UndefinedVariable {
                        name: name.lexeme.clone(),
                        line: name.line,
                    }
                    .into());
                }
            },
        }

        Ok(())
    }

    fn slot_of(&self, id: ExprId, token: &Token) -> Result<Slot> {
        self.locals.get(&id).copied().ok_or_else(|| {
            RuntimeError::UndefinedVariable {
                name: token.lexeme.clone(),
                line: token.line,
            }
            .into()
        })
    }

    fn current_frame(&self, name: &Token) -> Result<Frame> {
        self.environment.clone().ok_or_else(|| {
            RuntimeError::UndefinedVariable {
                name: name.lexeme.clone(),
                line: name.line,
            }
            .into()
        })
    }
}

/// A resolved address with no cell behind it: the name was reached before
/// its declaration finished, e.g. a closure called from the variable's own
/// initializer.  Reported against the source token.
fn unbound_at(error: RuntimeError, name: &Token) -> RuntimeError {
    match error {
        RuntimeError::InvalidSlot { depth, slot } => {
            debug!(
                "No cell at ({}, {}) for '{}' on line {}",
                depth, slot, name.lexeme, name.line
            );

            RuntimeError::UndefinedVariable {
                name: name.lexeme.clone(),
                line: name.line,
            }
        }
        other => other,
    }
}
