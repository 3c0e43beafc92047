use crate::ast::{Expr, FunctionExpr, LiteralValue, Stmt};
use crate::token::Token;

/// Renders syntax trees either in parenthesised prefix form (for the
/// `parse` command and debugging) or back to Lox source.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal(lit) => match lit {
                LiteralValue::True => "true".into(),

                LiteralValue::False => "false".into(),

                LiteralValue::Nil => "nil".into(),

                LiteralValue::Str(s) => s.clone(),

                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        // 3 → 3.0
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }
            },

            // ── grouping ────────────────────────────────────────────────
            Expr::Grouping(inner) => format!("(group {})", Self::print(inner)),

            // ── operators ───────────────────────────────────────────────
            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, Self::print(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                Self::print(left),
                Self::print(right)
            ),

            // ── names ───────────────────────────────────────────────────
            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, Self::print(value))
            }

            Expr::This { .. } => "this".into(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),

            // ── calls and properties ────────────────────────────────────
            Expr::Call {
                callee, arguments, ..
            } => {
                let mut s = format!("(call {}", Self::print(callee));
                for arg in arguments {
                    s.push(' ');
                    s.push_str(&Self::print(arg));
                }
                s.push(')');
                s
            }

            Expr::Get { object, name } => format!("(. {} {})", Self::print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),

            Expr::Function(function) => format!("(fun {})", Self::print_function(function)),
        }
    }

    /// Prefix form of a statement.
    pub fn print_stmt(stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("(; {})", Self::print(expr)),

            Stmt::Print(expr) => format!("(print {})", Self::print(expr)),

            Stmt::Var { name, initializer } => match initializer {
                Some(init) => format!("(var {} {})", name.lexeme, Self::print(init)),
                None => format!("(var {})", name.lexeme),
            },

            Stmt::Block(statements) => Self::list("block", statements),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    Self::print(condition),
                    Self::print_stmt(then_branch),
                    Self::print_stmt(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    Self::print(condition),
                    Self::print_stmt(then_branch)
                ),
            },

            Stmt::While { condition, body } => format!(
                "(while {} {})",
                Self::print(condition),
                Self::print_stmt(body)
            ),

            Stmt::Break(_) => "(break)".into(),

            Stmt::Return { value, .. } => match value {
                Some(value) => format!("(return {})", Self::print(value)),
                None => "(return)".into(),
            },

            Stmt::Function(decl) => format!(
                "(fun {} {})",
                decl.name.lexeme,
                Self::print_function(&decl.function)
            ),

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let mut s = format!("(class {}", name.lexeme);
                if let Some(superclass) = superclass {
                    s.push_str(&format!(" < {}", Self::print(superclass)));
                }
                for method in methods {
                    s.push_str(&format!(
                        " (method {} {})",
                        method.name.lexeme,
                        Self::print_function(&method.function)
                    ));
                }
                s.push(')');
                s
            }
        }
    }

    fn print_function(function: &FunctionExpr) -> String {
        format!(
            "({}) {}",
            Self::params(&function.params),
            Self::list("block", &function.body)
        )
    }

    fn list(head: &str, statements: &[Stmt]) -> String {
        let mut s = format!("({}", head);
        for stmt in statements {
            s.push(' ');
            s.push_str(&Self::print_stmt(stmt));
        }
        s.push(')');
        s
    }

    fn params(params: &[Token]) -> String {
        params
            .iter()
            .map(|p| p.lexeme.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render an expression as Lox source.
    ///
    /// No parentheses are invented: only `Grouping` nodes print them, so
    /// re-parsing the output of a parsed tree gives the same tree back.
    pub fn to_source(expr: &Expr) -> String {
        match expr {
            Expr::Literal(lit) => match lit {
                LiteralValue::True => "true".into(),
                LiteralValue::False => "false".into(),
                LiteralValue::Nil => "nil".into(),
                LiteralValue::Str(s) => format!("\"{}\"", s),
                LiteralValue::Number(n) => n.to_string(),
            },

            Expr::Grouping(inner) => format!("({})", Self::to_source(inner)),

            Expr::Unary { operator, right } => {
                format!("{}{}", operator.lexeme, Self::to_source(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "{} {} {}",
                Self::to_source(left),
                operator.lexeme,
                Self::to_source(right)
            ),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("{} = {}", name.lexeme, Self::to_source(value))
            }

            Expr::This { .. } => "this".into(),

            Expr::Super { method, .. } => format!("super.{}", method.lexeme),

            Expr::Call {
                callee, arguments, ..
            } => format!(
                "{}({})",
                Self::to_source(callee),
                arguments
                    .iter()
                    .map(Self::to_source)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),

            Expr::Get { object, name } => format!("{}.{}", Self::to_source(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "{}.{} = {}",
                Self::to_source(object),
                name.lexeme,
                Self::to_source(value)
            ),

            Expr::Function(function) => format!(
                "fun ({}) {{ {} }}",
                Self::params(&function.params),
                function
                    .body
                    .iter()
                    .map(Self::stmt_source)
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
        }
    }

    fn stmt_source(stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("{};", Self::to_source(expr)),

            Stmt::Print(expr) => format!("print {};", Self::to_source(expr)),

            Stmt::Var { name, initializer } => match initializer {
                Some(init) => format!("var {} = {};", name.lexeme, Self::to_source(init)),
                None => format!("var {};", name.lexeme),
            },

            Stmt::Block(statements) => format!(
                "{{ {} }}",
                statements
                    .iter()
                    .map(Self::stmt_source)
                    .collect::<Vec<_>>()
                    .join(" ")
            ),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut s = format!(
                    "if ({}) {}",
                    Self::to_source(condition),
                    Self::stmt_source(then_branch)
                );
                if let Some(else_branch) = else_branch {
                    s.push_str(" else ");
                    s.push_str(&Self::stmt_source(else_branch));
                }
                s
            }

            Stmt::While { condition, body } => format!(
                "while ({}) {}",
                Self::to_source(condition),
                Self::stmt_source(body)
            ),

            Stmt::Break(_) => "break;".into(),

            Stmt::Return { value, .. } => match value {
                Some(value) => format!("return {};", Self::to_source(value)),
                None => "return;".into(),
            },

            Stmt::Function(decl) => format!(
                "fun {}({}) {{ {} }}",
                decl.name.lexeme,
                Self::params(&decl.function.params),
                decl.function
                    .body
                    .iter()
                    .map(Self::stmt_source)
                    .collect::<Vec<_>>()
                    .join(" ")
            ),

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let mut s = format!("class {}", name.lexeme);
                if let Some(superclass) = superclass {
                    s.push_str(" < ");
                    s.push_str(&Self::to_source(superclass));
                }
                s.push_str(" {");
                for method in methods {
                    s.push_str(&format!(
                        " {}({}) {{ {} }}",
                        method.name.lexeme,
                        Self::params(&method.function.params),
                        method
                            .function
                            .body
                            .iter()
                            .map(Self::stmt_source)
                            .collect::<Vec<_>>()
                            .join(" ")
                    ));
                }
                s.push_str(" }");
                s
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn number(n: f64) -> Expr {
        Expr::Literal(LiteralValue::Number(n))
    }

    #[test]
    fn prints_prefix_form() {
        let expr = Expr::Binary {
            left: Box::new(Expr::Unary {
                operator: Token::new(TokenType::MINUS, "-", 1),
                right: Box::new(number(123.0)),
            }),
            operator: Token::new(TokenType::STAR, "*", 1),
            right: Box::new(Expr::Grouping(Box::new(number(45.67)))),
        };

        assert_eq!(AstPrinter::print(&expr), "(* (- 123.0) (group 45.67))");
        assert_eq!(AstPrinter::to_source(&expr), "-123 * (45.67)");
    }

    #[test]
    fn strings_are_quoted_only_in_source_form() {
        let expr = Expr::Literal(LiteralValue::Str("hi".into()));

        assert_eq!(AstPrinter::print(&expr), "hi");
        assert_eq!(AstPrinter::to_source(&expr), "\"hi\"");
    }
}
