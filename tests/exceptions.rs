//! `begin`/`rescue`/`else`/`ensure` and the throw protocol.

use nova::ast::build::*;
use nova::ast::Node;
use nova::{ErrorKind, Interpreter, Value};
use pretty_assertions::assert_eq;

fn run(program: Vec<Node>) -> Value {
    let mut interp = Interpreter::new();
    interp.run(&program).expect("program failed")
}

fn new_exception(message: Node) -> Node {
    mcall(var("Exception"), "new", vec![arg(message)])
}

#[test]
fn wildcard_rescue_catches_any_throw() {
    let program = vec![begin(
        vec![throw(str_("boom")), int(1)],
        vec![rescue_any(None, vec![int(7)])],
        None,
        None,
    )];
    assert_eq!(run(program), Value::Int(7));
}

#[test]
fn rescue_binds_the_thrown_instance() {
    let program = vec![begin(
        vec![throw(new_exception(str_("boom")))],
        vec![rescue_any(
            Some("e"),
            vec![mcall(var("e"), "message", vec![])],
        )],
        None,
        None,
    )];
    assert_eq!(run(program), Value::str("boom"));
}

#[test]
fn clauses_are_tried_in_order() {
    let program = vec![begin(
        vec![throw(new_exception(str_("x")))],
        vec![
            rescue(vec!["Exception"], None, vec![int(1)]),
            rescue_any(None, vec![int(2)]),
        ],
        None,
        None,
    )];
    assert_eq!(run(program), Value::Int(1));
}

#[test]
fn class_filter_matches_by_ancestor() {
    let program = vec![
        class_def("IoError", Some("Exception"), vec![]),
        begin(
            vec![throw(mcall(var("IoError"), "new", vec![arg(str_("disk"))]))],
            vec![rescue(vec!["Exception"], Some("e"), vec![
                mcall(var("e"), "message", vec![]),
            ])],
            None,
            None,
        ),
    ];
    assert_eq!(run(program), Value::str("disk"));
}

#[test]
fn non_matching_clause_propagates() {
    let program = vec![
        class_def("Unrelated", Some("Exception"), vec![]),
        begin(
            vec![throw(new_exception(str_("x")))],
            vec![rescue(vec!["Unrelated"], None, vec![int(1)])],
            None,
            None,
        ),
    ];
    let mut interp = Interpreter::new();
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Thrown);
}

#[test]
fn else_runs_only_when_nothing_was_thrown() {
    let clean = vec![begin(
        vec![int(5)],
        vec![rescue_any(None, vec![int(1)])],
        Some(vec![int(25)]),
        None,
    )];
    assert_eq!(run(clean), Value::Int(25));

    let thrown = vec![begin(
        vec![throw(str_("x"))],
        vec![rescue_any(None, vec![int(1)])],
        Some(vec![int(25)]),
        None,
    )];
    assert_eq!(run(thrown), Value::Int(1));
}

#[test]
fn ensure_runs_on_both_paths() {
    let rescued = vec![
        assign(var("x"), int(1)),
        begin(
            vec![throw(str_("x"))],
            vec![rescue_any(None, vec![assign(var("x"), int(5))])],
            None,
            Some(vec![assign(var("x"), int(10))]),
        ),
        var("x"),
    ];
    assert_eq!(run(rescued), Value::Int(10));

    let clean = vec![
        assign(var("x"), int(1)),
        begin(
            vec![int(0)],
            vec![],
            None,
            Some(vec![assign(var("x"), int(10))]),
        ),
        var("x"),
    ];
    assert_eq!(run(clean), Value::Int(10));
}

#[test]
fn ensure_runs_even_when_nothing_matches() {
    let mut interp = Interpreter::new();
    let program = vec![
        assign(var("x"), int(0)),
        begin(
            vec![throw(str_("x"))],
            vec![],
            None,
            Some(vec![assign(var("x"), int(9))]),
        ),
    ];
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Thrown);
    assert_eq!(interp.run(&[var("x")]).unwrap(), Value::Int(9));
}

#[test]
fn rescue_names_resolve_through_the_scope() {
    // a variable holding a class-name string works as a filter
    let program = vec![
        assign(var("kind"), str_("Exception")),
        begin(
            vec![throw(new_exception(str_("x")))],
            vec![rescue(vec!["kind"], None, vec![int(3)])],
            None,
            None,
        ),
    ];
    assert_eq!(run(program), Value::Int(3));

    // and so does a variable holding the class itself
    let program = vec![
        class_def("IoError", Some("Exception"), vec![]),
        assign(var("kind"), var("IoError")),
        begin(
            vec![throw(mcall(var("IoError"), "new", vec![]))],
            vec![rescue(vec!["kind"], None, vec![int(4)])],
            None,
            None,
        ),
    ];
    assert_eq!(run(program), Value::Int(4));
}

#[test]
fn unmatched_inner_throw_reaches_the_outer_rescue() {
    let program = vec![
        class_def("Inner", Some("Exception"), vec![]),
        begin(
            vec![begin(
                vec![throw(mcall(var("Inner"), "new", vec![]))],
                vec![rescue(vec!["NoSuchClass"], None, vec![int(1)])],
                None,
                None,
            )],
            vec![rescue(vec!["Inner"], None, vec![int(2)])],
            None,
            None,
        ),
    ];
    assert_eq!(run(program), Value::Int(2));
}

#[test]
fn default_constructed_exception_has_empty_message() {
    let program = vec![begin(
        vec![throw(mcall(var("Exception"), "new", vec![]))],
        vec![rescue_any(
            Some("e"),
            vec![mcall(var("e"), "message", vec![])],
        )],
        None,
        None,
    )];
    assert_eq!(run(program), Value::str(""));
}

#[test]
fn throw_unwinds_through_function_calls() {
    let program = vec![
        def("inner", vec![], vec![throw(new_exception(str_("deep")))]),
        def("outer", vec![], vec![call(var("inner"), vec![]), int(1)]),
        begin(
            vec![call(var("outer"), vec![])],
            vec![rescue_any(
                Some("e"),
                vec![mcall(var("e"), "message", vec![])],
            )],
            None,
            None,
        ),
    ];
    assert_eq!(run(program), Value::str("deep"));
}
