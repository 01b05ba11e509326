//! Partial functions: the currying trigger, completion, pipe direction,
//! and the curry/named-argument edge case.

use nova::ast::build::*;
use nova::ast::{Node, Param, Pipe};
use nova::{Interpreter, Value};
use pretty_assertions::assert_eq;

fn run(program: Vec<Node>) -> Value {
    let mut interp = Interpreter::new();
    interp.run(&program).expect("program failed")
}

fn add3() -> Node {
    def(
        "add3",
        vec![
            Param::required("a"),
            Param::required("b"),
            Param::required("c"),
        ],
        vec![bin("+", bin("+", var("a"), var("b")), var("c"))],
    )
}

#[test]
fn under_applied_call_curries() {
    let program = vec![
        add3(),
        assign(var("p"), call(var("add3"), vec![arg(int(1))])),
        call(var("p"), vec![arg(int(2)), arg(int(3))]),
    ];
    assert_eq!(run(program), Value::Int(6));
}

#[test]
fn currying_chains_one_argument_at_a_time() {
    let program = vec![
        add3(),
        call(
            call(call(var("add3"), vec![arg(int(1))]), vec![arg(int(2))]),
            vec![arg(int(4))],
        ),
    ];
    assert_eq!(run(program), Value::Int(7));
}

#[test]
fn partial_is_a_first_class_value() {
    let program = vec![
        add3(),
        assign(var("p"), call(var("add3"), vec![arg(int(10))])),
    ];
    let mut interp = Interpreter::new();
    let result = interp.run(&program).unwrap();
    assert!(matches!(result, Value::Partial(_)));
}

#[test]
fn frozen_arguments_append_on_completion() {
    // completion order is (new args..., frozen args...); subtraction
    // makes the order observable
    let program = vec![
        def(
            "sub",
            vec![Param::required("a"), Param::required("b")],
            vec![bin("-", var("a"), var("b"))],
        ),
        assign(var("p"), call(var("sub"), vec![arg(int(1))])),
        call(var("p"), vec![arg(int(10))]),
    ];
    // a = 10 (new), b = 1 (frozen)
    assert_eq!(run(program), Value::Int(9));
}

#[test]
fn backward_pipe_prepends_frozen_arguments() {
    let program = vec![
        def(
            "sub",
            vec![Param::required("a"), Param::required("b")],
            vec![bin("-", var("a"), var("b"))],
        ),
        assign(var("p"), call(var("sub"), vec![arg(int(1))])),
        call_piped(var("p"), vec![arg(int(10))], Pipe::Backward),
    ];
    // a = 1 (frozen, prepended), b = 10 (new)
    assert_eq!(run(program), Value::Int(-9));
}

#[test]
fn named_arguments_disable_currying() {
    // an under-supplied call with a named argument binds immediately
    // instead of currying; the unbound parameter reads as nil
    let program = vec![
        def(
            "pair",
            vec![Param::required("a"), Param::required("b")],
            vec![var("b")],
        ),
        call(var("pair"), vec![named("b", int(5))]),
    ];
    assert_eq!(run(program), Value::Int(5));
}

#[test]
fn defaults_lower_the_currying_threshold() {
    // two of three parameters have defaults; one argument satisfies the
    // adjusted count and the call binds instead of currying
    let program = vec![
        def(
            "mix",
            vec![
                Param::required("a"),
                Param::with_default("b", int(10)),
                Param::with_default("c", int(100)),
            ],
            vec![bin("+", bin("+", var("a"), var("b")), var("c"))],
        ),
        call(var("mix"), vec![arg(int(1))]),
    ];
    assert_eq!(run(program), Value::Int(111));
}

#[test]
fn member_calls_curry_with_self_captured() {
    let program = vec![
        class_def(
            "Adder",
            None,
            vec![
                def(
                    "new",
                    vec![Param::required("base")],
                    vec![
                        assign(member(var("self"), "base"), var("base")),
                        var("self"),
                    ],
                ),
                def(
                    "plus",
                    vec![Param::required("x"), Param::required("y")],
                    vec![bin(
                        "+",
                        member(var("self"), "base"),
                        bin("+", var("x"), var("y")),
                    )],
                ),
            ],
        ),
        assign(var("a"), call(var("Adder"), vec![arg(int(100))])),
        assign(var("p"), mcall(var("a"), "plus", vec![arg(int(1))])),
        call(var("p"), vec![arg(int(2))]),
    ];
    assert_eq!(run(program), Value::Int(103));
}

#[test]
fn curried_constructor_completes_later() {
    let program = vec![
        class_def(
            "Pair",
            None,
            vec![def(
                "new",
                vec![Param::required("a"), Param::required("b")],
                vec![
                    assign(member(var("self"), "sum"), bin("+", var("a"), var("b"))),
                    var("self"),
                ],
            )],
        ),
        assign(var("p"), mcall(var("Pair"), "new", vec![arg(int(1))])),
        assign(var("obj"), call(var("p"), vec![arg(int(2))])),
        member(var("obj"), "sum"),
    ];
    assert_eq!(run(program), Value::Int(3));
}
