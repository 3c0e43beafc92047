//! Static resolver pass for the **Lox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<String, Variable>` tracking
//!    declared → defined → used and the slot each name occupies).
//! 2. Report static errors (redeclaration, forward‑read in initializer, invalid
//!    `return`/`this`/`super`, unused locals).
//! 3. Record, for *each* variable occurrence, the `(depth, slot)` address of the
//!    frame cell it refers to, or nothing for a global, so the interpreter never
//!    falls back to dynamic lookup that would see a later shadowing local.
//!
//! Slots are handed out in declaration order per scope.  The interpreter
//! appends frame cells in exactly the same order, which is what makes the
//! addresses valid at run time.

use std::collections::HashMap;

use clap::ValueEnum;
use log::{debug, info, warn};

use crate::ast::{Expr, ExprId, FunctionDecl, FunctionExpr, Stmt};
use crate::error::LoxError;
use crate::token::Token;

/// Static address of a local variable: `depth` enclosing-frame hops, then
/// `index` into that frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub depth: usize,
    pub index: usize,
}

/// How seriously to take a lint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LintLevel {
    /// Do not report.
    Allow,
    /// Report, but still run the program.
    #[default]
    Warn,
    /// Report as an error.
    Deny,
}

/// Knobs for the resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverOptions {
    /// Locals that go out of scope without ever being read.
    pub unused_variables: LintLevel,
}

/// Output of a successful resolve pass.
#[derive(Debug, Default)]
pub struct Resolution {
    locals: HashMap<ExprId, Slot>,
    warnings: Vec<LoxError>,
}

impl Resolution {
    /// Address recorded for a node; `None` means "global, look up by name".
    pub fn slot(&self, id: ExprId) -> Option<Slot> {
        self.locals.get(&id).copied()
    }

    pub fn locals(&self) -> &HashMap<ExprId, Slot> {
        &self.locals
    }

    pub fn warnings(&self) -> &[LoxError] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<LoxError> {
        self.warnings
    }
}

/// Are we inside a user function?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

/// Are we inside a class body?  Used to validate `this` and `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Per-name lifecycle inside a scope: `Declared` until its initializer has
/// been resolved, `Defined` afterwards.  Reads are tracked separately so a
/// closure that captures a name before it is defined still counts as a use.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum VarState {
    Declared,
    Defined,
}

#[derive(Debug)]
struct Variable {
    state: VarState,
    used: bool,
    slot: usize,
    line: usize,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// addresses for the interpreter.
pub struct Resolver {
    scopes: Vec<HashMap<String, Variable>>,
    current_function: FunctionType,
    current_class: ClassType,
    options: ResolverOptions,
    locals: HashMap<ExprId, Slot>,
    errors: Vec<LoxError>,
    warnings: Vec<LoxError>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ResolverOptions::default())
    }
}

impl Resolver {
    pub fn new(options: ResolverOptions) -> Self {
        info!("Resolver instantiated with {:?}", options);

        Resolver {
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            options,
            locals: HashMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Walk all top‑level statements.  Every diagnostic is collected before
    /// returning; the walk never stops at the first one.
    pub fn resolve(
        &mut self,
        statements: &[Stmt],
    ) -> std::result::Result<Resolution, Vec<LoxError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_stmts(statements);

        let locals = std::mem::take(&mut self.locals);
        let warnings = std::mem::take(&mut self.warnings);
        let errors = std::mem::take(&mut self.errors);

        if errors.is_empty() {
            info!(
                "Resolved {} local reference(s), {} warning(s)",
                locals.len(),
                warnings.len()
            );

            Ok(Resolution { locals, warnings })
        } else {
            info!("Resolve pass found {} error(s)", errors.len());

            Err(errors)
        }
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so `var a = a;`
                // sees its own half-built binding and is rejected.
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Function(FunctionDecl { name, function }) => {
                // name is visible *inside* its own body
                self.declare(name);
                self.define(name);
                self.resolve_function(function, FunctionType::Function);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            // Placement was checked by the parser.
            Stmt::Break(_) => {}

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword.line, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword.line, "Can't return a value from an initializer.");
                    }

                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_class(&mut self, name: &Token, superclass: Option<&Expr>, methods: &[FunctionDecl]) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable { name: super_name, .. } = superclass {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name.line, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            // Outer synthetic scope: the superclass, one hop beyond `this`.
            self.begin_scope();
            self.insert_synthetic("super", name.line);
        }

        // Inner synthetic scope: `this` at slot 0.
        self.begin_scope();
        self.insert_synthetic("this", name.line);

        for method in methods {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            debug!("Resolving method '{}' as {:?}", method.name.lexeme, kind);

            self.resolve_function(&method.function, kind);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                if self.in_own_initializer(name) {
                    self.error(
                        name.line,
                        "Can't read local variable in its own initializer.",
                    );
                }

                self.resolve_local(*id, name, true);
            }

            Expr::Assign { id, name, value } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value);

                if self.in_own_initializer(name) {
                    self.error(
                        name.line,
                        "Can't assign to local variable in its own initializer.",
                    );
                }

                self.resolve_local(*id, name, false);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            // Properties are dynamic; only the object is resolved.
            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword.line, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(*id, keyword, true);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword.line, "Can't use 'super' outside of a class.");
                        return;
                    }
                    ClassType::Class => {
                        self.error(
                            keyword.line,
                            "Can't use 'super' in a class with no superclass.",
                        );
                        return;
                    }
                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword, true);
            }

            Expr::Function(function) => self.resolve_function(function, FunctionType::Function),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Parameters and body share one scope, matching the single frame a call
    /// creates.
    fn resolve_function(&mut self, function: &FunctionExpr, kind: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &function.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&function.body);
        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };

        if self.options.unused_variables == LintLevel::Allow {
            return;
        }

        let mut unused: Vec<(&String, &Variable)> = scope
            .iter()
            .filter(|(_, var)| !var.used)
            .collect();
        unused.sort_by_key(|(_, var)| var.slot);

        for (name, var) in unused {
            let diagnostic = LoxError::resolve(var.line, format!("Unused variable '{}'.", name));

            match self.options.unused_variables {
                LintLevel::Deny => self.errors.push(diagnostic),
                LintLevel::Warn => {
                    warn!("{}", diagnostic);
                    self.warnings.push(diagnostic);
                }
                LintLevel::Allow => {}
            }
        }
    }

    /// Declared in the innermost scope but its initializer is still being
    /// resolved, so the interpreter has no cell for it yet.
    fn in_own_initializer(&self, name: &Token) -> bool {
        self.scopes
            .last()
            .and_then(|scope| scope.get(&name.lexeme))
            .is_some_and(|var| var.state == VarState::Declared)
    }

    /// Add a name to the innermost scope, taking the next free slot.
    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        if scope.contains_key(&name.lexeme) {
            self.error(
                name.line,
                "Already a variable with this name in this scope.",
            );
            return;
        }

        let slot = scope.len();
        debug!("Declared '{}' at slot {}", name.lexeme, slot);

        scope.insert(
            name.lexeme.clone(),
            Variable {
                state: VarState::Declared,
                used: false,
                slot,
                line: name.line,
            },
        );
    }

    fn define(&mut self, name: &Token) {
        if let Some(var) = self
            .scopes
            .last_mut()
            .and_then(|scope| scope.get_mut(&name.lexeme))
        {
            var.state = VarState::Defined;
        }
    }

    /// `this` / `super`: always slot 0 of a fresh synthetic scope, and never
    /// reported as unused.
    fn insert_synthetic(&mut self, name: &str, line: usize) {
        if let Some(scope) = self.scopes.last_mut() {
            let slot = scope.len();
            scope.insert(
                name.to_string(),
                Variable {
                    state: VarState::Defined,
                    used: true,
                    slot,
                    line,
                },
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑address helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this variable occurrence as either:
    ///  - a local at `(depth, slot)`, or
    ///  - a global if not found in *any* scope (no record written).
    fn resolve_local(&mut self, id: ExprId, name: &Token, is_read: bool) {
        for (depth, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(var) = scope.get_mut(&name.lexeme) {
                let slot = Slot {
                    depth,
                    index: var.slot,
                };

                debug!("Resolved '{}' at {:?}", name.lexeme, slot);

                if is_read {
                    var.used = true;
                }

                self.locals.insert(id, slot);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }

    fn error(&mut self, line: usize, message: &str) {
        self.errors.push(LoxError::resolve(line, message));
    }
}
