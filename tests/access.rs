//! Variables, containers, compound assignment, constants, aliases,
//! symbol variables and `sync` blocks.

use nova::ast::build::*;
use nova::ast::Node;
use nova::{ErrorKind, Interpreter, Value};
use pretty_assertions::assert_eq;

fn run(program: Vec<Node>) -> Value {
    let mut interp = Interpreter::new();
    interp.run(&program).expect("program failed")
}

fn sym_var(name: &str) -> Node {
    Node::SymVar(name.to_string())
}

#[test]
fn index_assignment_updates_in_place() {
    let program = vec![
        assign(var("x"), array(vec![int(1), int(2), int(3)])),
        assign(index(var("x"), int(1)), int(6)),
        var("x"),
    ];
    assert_eq!(
        run(program),
        Value::array(vec![Value::Int(1), Value::Int(6), Value::Int(3)])
    );
}

#[test]
fn array_grows_with_nil_padding() {
    let program = vec![
        assign(var("x"), array(vec![])),
        assign(index(var("x"), int(3)), int(1)),
        array(vec![
            mcall(var("x"), "size", vec![]),
            index(var("x"), int(0)),
            index(var("x"), int(3)),
        ]),
    ];
    assert_eq!(
        run(program),
        Value::array(vec![Value::Int(4), Value::Nil, Value::Int(1)])
    );
}

#[test]
fn out_of_range_reads_are_nil() {
    let program = vec![
        assign(var("x"), array(vec![int(1)])),
        array(vec![index(var("x"), int(5)), index(var("x"), int(-1))]),
    ];
    assert_eq!(run(program), Value::array(vec![Value::Nil, Value::Nil]));
}

#[test]
fn compound_assignment_on_elements() {
    let program = vec![
        assign(var("a"), array(vec![int(1), int(2), int(3)])),
        op_assign(index(var("a"), int(1)), "+", int(2)),
        index(var("a"), int(1)),
    ];
    assert_eq!(run(program), Value::Int(4));
}

#[test]
fn compound_assignment_on_variables() {
    let program = vec![
        assign(var("x"), int(1)),
        op_assign(var("x"), "+", int(4)),
        var("x"),
    ];
    assert_eq!(run(program), Value::Int(5));
}

#[test]
fn prefix_increment_yields_the_new_value() {
    let program = vec![
        assign(var("x"), array(vec![int(1), int(2), int(3)])),
        array(vec![incr(index(var("x"), int(1)), true), index(var("x"), int(1))]),
    ];
    assert_eq!(run(program), Value::array(vec![Value::Int(3), Value::Int(3)]));
}

#[test]
fn postfix_decrement_yields_the_old_value() {
    let program = vec![
        assign(var("x"), array(vec![int(1), int(2), int(3)])),
        array(vec![decr(index(var("x"), int(1)), false), index(var("x"), int(1))]),
    ];
    assert_eq!(run(program), Value::array(vec![Value::Int(2), Value::Int(1)]));
}

#[test]
fn symbol_and_string_keys_are_distinct() {
    let program = vec![
        assign(
            var("d"),
            dict(vec![(sym("a"), int(1)), (str_("a"), int(2))]),
        ),
        array(vec![
            index(var("d"), sym("a")),
            index(var("d"), str_("a")),
            index(var("d"), sym("missing")),
        ]),
    ];
    assert_eq!(
        run(program),
        Value::array(vec![Value::Int(1), Value::Int(2), Value::Nil])
    );
}

#[test]
fn string_indexing_yields_characters() {
    let program = vec![index(str_("hello"), int(1))];
    assert_eq!(run(program), Value::str("e"));
}

#[test]
fn negative_string_index_is_nil() {
    let program = vec![array(vec![
        index(str_("hello"), int(-1)),
        index(str_("hello"), int(99)),
    ])];
    assert_eq!(run(program), Value::array(vec![Value::Nil, Value::Nil]));
}

#[test]
fn constants_cannot_be_reassigned() {
    let mut interp = Interpreter::new();
    let program = vec![constant("LIMIT", int(10)), assign(var("LIMIT"), int(20))];
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConstantViolation);
    assert_eq!(interp.run(&[var("LIMIT")]).unwrap(), Value::Int(10));
}

#[test]
fn constants_are_enforced_inside_callees() {
    let mut interp = Interpreter::new();
    let program = vec![
        constant("LIMIT", int(10)),
        def("raise_limit", vec![], vec![assign(var("LIMIT"), int(20))]),
        call(var("raise_limit"), vec![]),
    ];
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConstantViolation);
    assert_eq!(interp.run(&[var("LIMIT")]).unwrap(), Value::Int(10));
}

#[test]
fn aliases_read_through_to_the_source() {
    let program = vec![
        assign(var("longname"), int(7)),
        alias("short", "longname"),
        assign(var("longname"), int(8)),
        var("short"),
    ];
    assert_eq!(run(program), Value::Int(8));
}

#[test]
fn aliases_are_constant() {
    let mut interp = Interpreter::new();
    let program = vec![
        assign(var("x"), int(1)),
        alias("y", "x"),
        assign(var("y"), int(2)),
    ];
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConstantViolation);
}

#[test]
fn symbol_variables_shadow_without_touching_names() {
    let program = vec![
        assign(var("x"), int(5)),
        // unassigned symbol falls back to the name binding
        assign(var("fallback"), sym_var("x")),
        assign(sym_var("x"), int(9)),
        array(vec![var("fallback"), sym_var("x"), var("x")]),
    ];
    assert_eq!(
        run(program),
        Value::array(vec![Value::Int(5), Value::Int(9), Value::Int(5)])
    );
}

#[test]
fn sync_reentry_is_a_deadlock() {
    let mut interp = Interpreter::new();
    let program = vec![
        assign(var("res"), array(vec![int(1)])),
        sync("res", vec![sync("res", vec![int(1)])]),
    ];
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Deadlock);
}

#[test]
fn sync_releases_on_exit() {
    let program = vec![
        assign(var("res"), array(vec![int(1)])),
        sync("res", vec![int(1)]),
        sync("res", vec![int(2)]),
    ];
    assert_eq!(run(program), Value::Int(2));
}

#[test]
fn while_loops_run_to_completion() {
    let program = vec![
        assign(var("i"), int(0)),
        while_(
            bin("<", var("i"), int(5)),
            vec![assign(var("i"), bin("+", var("i"), int(1)))],
        ),
        var("i"),
    ];
    assert_eq!(run(program), Value::Int(5));
}

#[test]
fn integer_overflow_promotes() {
    let program = vec![bin("*", int(i64::MAX), int(2))];
    assert!(matches!(run(program), Value::BigInt(_)));
}

#[test]
fn division_stays_exact_or_widens() {
    assert_eq!(run(vec![bin("/", int(6), int(2))]), Value::Int(3));
    assert_eq!(run(vec![bin("/", int(7), int(2))]), Value::Num(3.5));
}

#[test]
fn string_concatenation_formats_the_right_side() {
    assert_eq!(
        run(vec![bin("+", str_("n="), int(3))]),
        Value::str("n=3")
    );
}
