use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use rox::error::{LoxError, RuntimeError};
use rox::interpreter::Output;
use rox::resolver::{LintLevel, ResolverOptions};
use rox::session::Session;
use rox::value::Value;

fn session() -> (Session, Rc<RefCell<String>>) {
    let (output, buffer) = Output::buffer();
    let options = ResolverOptions {
        unused_variables: LintLevel::Allow,
    };

    (Session::with_output(output, options), buffer)
}

/// Run a program that must succeed and return what it printed.
fn run(source: &str) -> String {
    let (mut session, buffer) = session();

    if let Err(e) = session.run(source) {
        panic!("program failed: {}\noutput so far:\n{}", e, buffer.borrow());
    }

    let out = buffer.borrow().clone();
    out
}

/// Run a program that must fail at run time; return the error and the
/// output produced before it.
fn run_err(source: &str) -> (RuntimeError, String) {
    let (mut session, buffer) = session();

    match session.run(source) {
        Err(LoxError::Runtime(e)) => {
            let out = buffer.borrow().clone();
            (e, out)
        }
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

#[test]
fn arithmetic_and_printing() {
    assert_eq!(
        run("print 1 + 2 * 3; print 7 / 2; print -(4 - 6); print \"a\" + \"b\";"),
        "7\n3.5\n2\nab\n"
    );
}

#[test]
fn very_large_numbers_print_in_exponent_form() {
    assert_eq!(
        run("print 100000000000000000000000; print 1000000 * 1000000;"),
        "1.0E23\n1000000000000\n"
    );
}

#[test]
fn truthiness_and_logic_short_circuit() {
    let out = run(
        "print nil or \"fallback\";
         print 0 and \"zero is truthy\";
         print false and undefined_name;
         print !\"\";",
    );

    assert_eq!(out, "fallback\nzero is truthy\nfalse\nfalse\n");
}

#[test]
fn equality_never_coerces() {
    assert_eq!(
        run("print 1 == 1; print 1 == \"1\"; print nil == false; print nil == nil;"),
        "true\nfalse\nfalse\ntrue\n"
    );
}

#[test]
fn string_concatenation_coerces_the_other_side() {
    assert_eq!(run("print 1 + \"a\"; print \"n=\" + 2.5;"), "1a\nn=2.5\n");
}

#[test]
fn subtracting_from_a_string_is_an_error() {
    let (error, _) = run_err("print \"a\" - 1;");

    assert_eq!(
        error,
        RuntimeError::OperandsMustBeNumbers {
            operator: "-".into(),
            line: 1,
        }
    );
}

#[test]
fn dividing_by_zero_is_an_error() {
    let (error, out) = run_err("print 1;\nprint 1 / 0;");

    assert_eq!(error, RuntimeError::DivisionByZero { line: 2 });
    assert_eq!(out, "1\n");
}

#[test]
fn adding_incompatible_values_is_an_error() {
    let (error, _) = run_err("print nil + 1;");

    assert_eq!(error, RuntimeError::InvalidAddition { line: 1 });
}

#[test]
fn negating_a_non_number_is_an_error() {
    let (error, _) = run_err("print -true;");

    assert_eq!(
        error,
        RuntimeError::OperandMustBeNumber {
            operator: "-".into(),
            line: 1,
        }
    );
}

#[test]
fn shadowing_prints_outer_then_inner() {
    let out = run(
        "var a = \"outer\";
         {
           print a;
           var a = \"inner\";
           print a;
         }
         print a;",
    );

    assert_eq!(out, "outer\ninner\nouter\n");
}

#[test]
fn self_initializer_in_local_scope_is_rejected_before_running() {
    let (mut session, buffer) = session();

    let result = session.run("print \"before\"; { var a = a; }");

    assert!(matches!(result, Err(LoxError::Compile(ref errors)) if errors.len() == 1));
    assert_eq!(buffer.borrow().as_str(), "");
}

#[test]
fn closures_capture_by_reference_and_share_frames() {
    let out = run(
        "fun counter() {
           var count = 0;
           fun increment() { count = count + 1; return count; }
           fun peek() { return count; }
           class Pair { init(a, b) { this.a = a; this.b = b; } }
           return Pair(increment, peek);
         }
         var c = counter();
         var inc = c.a;
         var look = c.b;
         inc(); inc();
         print look();
         var other = counter();
         print other.b();",
    );

    assert_eq!(out, "2\n0\n");
}

#[test]
fn closure_sees_binding_at_definition_not_later_shadow() {
    let out = run(
        "var a = \"global\";
         {
           fun show() { print a; }
           show();
           var a = \"block\";
           show();
         }",
    );

    assert_eq!(out, "global\nglobal\n");
}

#[test]
fn recursion() {
    assert_eq!(
        run("fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(15);"),
        "610\n"
    );
}

#[test]
fn anonymous_functions_are_values() {
    assert_eq!(
        run("var twice = fun (f, x) { return f(f(x)); }; print twice(fun (n) { return n * 3; }, 2);"),
        "18\n"
    );
}

#[test]
fn function_without_return_yields_nil() {
    assert_eq!(run("fun f() {} print f(); print f;"), "nil\n<fn f>\n");
}

#[test]
fn break_leaves_only_the_innermost_loop() {
    let out = run(
        "for (var i = 0; i < 3; i = i + 1) {
           for (var j = 0; j < 10; j = j + 1) {
             if (j == 2) break;
             print i * 10 + j;
           }
         }",
    );

    assert_eq!(out, "0\n1\n10\n11\n20\n21\n");
}

#[test]
fn break_inside_nested_blocks_in_a_while() {
    let out = run(
        "var n = 0;
         while (true) {
           { { n = n + 1; if (n == 4) { break; } } }
         }
         print n;",
    );

    assert_eq!(out, "4\n");
}

#[test]
fn return_exits_loops_in_the_callee_only() {
    let out = run(
        "fun find() {
           var i = 0;
           while (true) { i = i + 1; if (i == 3) return i; }
         }
         print find();
         print \"after\";",
    );

    assert_eq!(out, "3\nafter\n");
}

#[test]
fn top_level_break_is_a_static_error() {
    let (mut session, _) = session();

    assert!(matches!(session.run("break;"), Err(LoxError::Compile(_))));
}

#[test]
fn classes_fields_and_methods() {
    let out = run(
        "class Point {
           init(x, y) { this.x = x; this.y = y; }
           sum() { return this.x + this.y; }
         }
         var p = Point(1, 2);
         print p.sum();
         p.x = 10;
         print p.sum();
         print Point;
         print p;",
    );

    assert_eq!(out, "3\n12\nPoint\nPoint instance\n");
}

#[test]
fn bound_methods_remember_their_instance() {
    let out = run(
        "class Greeter {
           init(name) { this.name = name; }
           greet() { print \"hi \" + this.name; }
         }
         var greet = Greeter(\"ann\").greet;
         greet();",
    );

    assert_eq!(out, "hi ann\n");
}

#[test]
fn fields_shadow_methods() {
    assert_eq!(
        run("class A { m() { return \"method\"; } } var a = A(); a.m = \"field\"; print a.m;"),
        "field\n"
    );
}

#[test]
fn super_dispatches_to_the_superclass_method() {
    let out = run(
        "class A { name() { return \"A\"; } }
         class B < A { name() { return super.name() + \"B\"; } }
         print B().name();",
    );

    assert_eq!(out, "AB\n");
}

#[test]
fn super_is_lexical_not_dynamic() {
    let out = run(
        "class A { method() { print \"A method\"; } }
         class B < A { method() { print \"B method\"; } test() { super.method(); } }
         class C < B {}
         C().test();",
    );

    assert_eq!(out, "A method\n");
}

#[test]
fn local_subclass_with_locals_between_the_classes() {
    let out = run(
        "fun f() {
           var pad = \"p\";
           class A { g() { return \"A\" + pad; } }
           var mid = 1;
           class B < A {
             g() { var k = mid; return super.g() + \"B\" + k; }
           }
           return B().g();
         }
         print f();",
    );

    assert_eq!(out, "ApB1\n");
}

#[test]
fn local_initializer_chains_to_the_superclass_initializer() {
    let out = run(
        "{
           var base = 1;
           class A { init(x) { this.x = x + base; } }
           var gap = 2;
           class B < A {
             init(x) { super.init(x * gap); this.y = gap; }
           }
           var b = B(1);
           print b.x + b.y;
           print b.init(2) == b;
           print b.x;
         }",
    );

    assert_eq!(out, "5\ntrue\n5\n");
}

#[test]
fn closure_called_inside_its_own_initializer_reports_the_name() {
    let (error, _) = run_err("{\n  var f = (fun () { return f; })();\n}");

    assert_eq!(
        error,
        RuntimeError::UndefinedVariable {
            name: "f".into(),
            line: 2,
        }
    );
    assert_eq!(error.line(), Some(2));
}

#[test]
fn inherited_initializer_and_methods() {
    let out = run(
        "class Base { init(v) { this.v = v; } show() { print this.v; } }
         class Derived < Base {}
         Derived(7).show();",
    );

    assert_eq!(out, "7\n");
}

#[test]
fn initializer_always_returns_the_instance() {
    let out = run(
        "class Box {
           init(v) { this.v = v; if (v > 0) return; this.v = \"neg\"; }
         }
         var b = Box(1);
         print b.v;
         print b.init(-1) == b;
         print b.v;",
    );

    assert_eq!(out, "1\ntrue\nneg\n");
}

#[test]
fn local_class_declarations_work() {
    let out = run(
        "fun make() {
           class Local { hello() { return \"hello\"; } }
           return Local();
         }
         print make().hello();",
    );

    assert_eq!(out, "hello\n");
}

#[test]
fn arity_is_checked() {
    let (error, _) = run_err("fun f(a, b) {} f(1);");

    assert_eq!(
        error,
        RuntimeError::ArityMismatch {
            expected: 2,
            got: 1,
            line: 1,
        }
    );

    let (error, _) = run_err("class A { init(x) {} } A();");
    assert!(matches!(error, RuntimeError::ArityMismatch { expected: 1, got: 0, .. }));
}

#[test]
fn calling_a_non_callable() {
    let (error, _) = run_err("\"text\"();");

    assert_eq!(error, RuntimeError::NotCallable { line: 1 });
}

#[test]
fn property_errors() {
    let (error, _) = run_err("var n = 1; print n.x;");
    assert_eq!(error, RuntimeError::NotAnInstance { line: 1 });

    let (error, _) = run_err("var n = 1; n.x = 2;");
    assert_eq!(error, RuntimeError::FieldOnNonInstance { line: 1 });

    let (error, _) = run_err("class A {} print A().missing;");
    assert_eq!(
        error,
        RuntimeError::UndefinedProperty {
            name: "missing".into(),
            line: 1,
        }
    );
}

#[test]
fn superclass_must_be_a_class() {
    let (error, _) = run_err("var NotAClass = 1; class B < NotAClass {}");

    assert_eq!(error, RuntimeError::SuperclassNotClass { line: 1 });
}

#[test]
fn undefined_variables() {
    let (error, _) = run_err("print missing;");
    assert_eq!(
        error,
        RuntimeError::UndefinedVariable {
            name: "missing".into(),
            line: 1,
        }
    );

    let (error, _) = run_err("missing = 1;");
    assert!(matches!(error, RuntimeError::UndefinedVariable { .. }));
}

#[test]
fn clock_is_a_native_function() {
    assert_eq!(
        run("print clock; var t = clock(); print t > 0;"),
        "<native fn clock>\ntrue\n"
    );
}

#[test]
fn host_natives_can_be_registered() {
    let (mut session, buffer) = session();

    session
        .interpreter_mut()
        .define_native("double", 1, |args: &[Value]| match args {
            [Value::Number(n)] => Ok(Value::Number(n * 2.0)),
            _ => Err("expected a number".to_string()),
        });

    session.run("print double(21);").unwrap();
    assert_eq!(buffer.borrow().as_str(), "42\n");

    match session.run("double(\"x\");") {
        Err(LoxError::Runtime(RuntimeError::Native { name, message, .. })) => {
            assert_eq!(name, "double");
            assert_eq!(message, "expected a number");
        }
        other => panic!("expected native error, got {:?}", other),
    }
}

#[test]
fn globals_persist_across_runs_and_repl_echoes() {
    let (mut session, buffer) = session();
    session.set_repl(true);

    session.run("var x = 40;").unwrap();
    session.run("fun add(n) { return x + n; }").unwrap();
    session.run("add(2);").unwrap();

    assert!(session.run("print nope;").is_err());
    session.run("x + 1;").unwrap();

    assert_eq!(buffer.borrow().as_str(), "42\n41\n");
    assert_eq!(session.interpreter().global("x"), Some(Value::Number(40.0)));
}

#[test]
fn warnings_do_not_stop_execution() {
    let (output, buffer) = Output::buffer();
    let mut session = Session::with_output(
        output,
        ResolverOptions {
            unused_variables: LintLevel::Warn,
        },
    );

    session.run("{ var unused = 1; print \"ran\"; }").unwrap();

    assert_eq!(buffer.borrow().as_str(), "ran\n");

    let warnings = session.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message(), "Unused variable 'unused'.");
    assert!(session.take_warnings().is_empty());
}

#[test]
fn deny_lint_blocks_execution() {
    let (output, buffer) = Output::buffer();
    let mut session = Session::with_output(
        output,
        ResolverOptions {
            unused_variables: LintLevel::Deny,
        },
    );

    assert!(session.run("{ var unused = 1; print \"ran\"; }").is_err());
    assert_eq!(buffer.borrow().as_str(), "");
}
