use pretty_assertions::assert_eq;

use rox::ast::{Expr, LiteralValue, Stmt};
use rox::ast_printer::AstPrinter;
use rox::error::LoxError;
use rox::session::{parse_expression, parse_program};
use rox::token::TokenType;

fn program(source: &str) -> Vec<Stmt> {
    parse_program(source).unwrap_or_else(|e| panic!("unexpected parse failure:\n{}", e))
}

fn diagnostics(source: &str) -> Vec<String> {
    match parse_program(source) {
        Ok(statements) => panic!("expected errors, parsed {:?}", statements),
        Err(LoxError::Compile(errors)) => errors.iter().map(ToString::to_string).collect(),
        Err(other) => panic!("unexpected error kind: {:?}", other),
    }
}

fn printed(source: &str) -> Vec<String> {
    program(source).iter().map(AstPrinter::print_stmt).collect()
}

#[test]
fn precedence_and_associativity() {
    let expr = parse_expression("1 - 2 - 3 * 4 == !true").unwrap();

    assert_eq!(
        AstPrinter::print(&expr),
        "(== (- (- 1.0 2.0) (* 3.0 4.0)) (! true))"
    );
}

#[test]
fn for_loop_desugars_to_block_and_while() {
    let statements = program("for (var i = 0; i < 3; i = i + 1) print i;");

    assert_eq!(statements.len(), 1);

    let Stmt::Block(outer) = &statements[0] else {
        panic!("expected block, got {:?}", statements[0]);
    };
    assert!(matches!(outer[0], Stmt::Var { .. }));

    let Stmt::While { body, .. } = &outer[1] else {
        panic!("expected while, got {:?}", outer[1]);
    };
    let Stmt::Block(inner) = body.as_ref() else {
        panic!("expected block body, got {:?}", body);
    };
    assert!(matches!(inner[0], Stmt::Print(_)));
    assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
}

#[test]
fn for_loop_without_clauses_loops_on_true() {
    assert_eq!(printed("for (;;) break;"), vec!["(while true (break))"]);
}

#[test]
fn class_with_superclass_and_methods() {
    assert_eq!(
        printed("class B < A { init(x) { this.x = x; } get() { return super.get(); } }"),
        vec![
            "(class B < A \
             (method init (x) (block (; (= (. this x) x)))) \
             (method get () (block (return (call (super get))))))"
        ]
    );
}

#[test]
fn anonymous_function_expression() {
    assert_eq!(
        printed("var f = fun (a, b) { return a + b; };"),
        vec!["(var f (fun (a, b) (block (return (+ a b)))))"]
    );
}

#[test]
fn break_outside_loop_is_rejected() {
    assert_eq!(
        diagnostics("break;"),
        vec!["[line 1] Error: Can't use 'break' outside of a loop."]
    );
}

#[test]
fn break_inside_function_inside_loop_is_rejected() {
    let errors = diagnostics("while (true) { fun f() { break; } }");

    assert_eq!(
        errors,
        vec!["[line 1] Error: Can't use 'break' outside of a loop."]
    );
}

#[test]
fn nested_break_is_accepted() {
    let statements = program("while (true) { if (true) { break; } }");

    assert_eq!(statements.len(), 1);
}

#[test]
fn errors_are_collected_across_statements() {
    let errors = diagnostics("var = 1;\nprint 2\nvar ok = 3;\n1 + ;");

    assert_eq!(
        errors,
        vec![
            "[line 1] Error: Expect variable name.",
            "[line 3] Error: Expect ';' after value.",
            "[line 4] Error: Expect expression.",
        ]
    );
}

#[test]
fn invalid_assignment_target() {
    assert_eq!(
        diagnostics("1 + 2 = 3;"),
        vec!["[line 1] Error: Invalid assignment target."]
    );
}

#[test]
fn missing_left_operand() {
    assert_eq!(
        diagnostics("* 3;"),
        vec!["[line 1] Error: Missing left operand for binary operator."]
    );
}

#[test]
fn lexical_and_syntax_errors_are_reported_together() {
    let errors = diagnostics("var a = @;");

    assert_eq!(
        errors,
        vec![
            "[line 1] Error: Unexpected character: @",
            "[line 1] Error: Expect expression.",
        ]
    );
}

#[test]
fn parse_expression_requires_end_of_input() {
    assert!(parse_expression("1 + 2").is_ok());
    assert!(parse_expression("1 + 2 3").is_err());
}

#[test]
fn too_many_arguments() {
    let args = vec!["1"; 256].join(", ");
    let errors = diagnostics(&format!("f({});", args));

    assert_eq!(
        errors,
        vec!["[line 1] Error: Can't have more than 255 arguments."]
    );
}

#[test]
fn source_round_trip() {
    for source in [
        "1 + 2 * 3",
        "(1 + 2) * 3",
        "-(-4.5) / 2 >= 1",
        "!(true == false) != nil",
        "\"a\" + \"b\" + \"c\"",
        "1 - (2 - 3)",
        "true and false or !nil",
    ] {
        let first = parse_expression(source).unwrap();
        let rendered = AstPrinter::to_source(&first);
        let second = parse_expression(&rendered).unwrap();

        assert_eq!(first, second, "round trip through {:?}", rendered);
    }
}

#[test]
fn literals_keep_their_values() {
    let expr = parse_expression("\"text\"").unwrap();
    assert_eq!(expr, Expr::Literal(LiteralValue::Str("text".into())));

    let Expr::Binary { operator, .. } = parse_expression("1 <= 2").unwrap() else {
        panic!("expected binary");
    };
    assert_eq!(operator.token_type, TokenType::LESS_EQUAL);
}
