//! Host-object boxing: wrapper identity, binding rewrite, unboxing,
//! registered host types with backing objects, and reopening a
//! primitive's boxed class.

use nova::ast::build::*;
use nova::ast::{Node, Param};
use nova::runtime::{HostObject, HostTypeSpec, NativeFunction, NativeParam, ParamType};
use nova::{Interpreter, Value};
use pretty_assertions::assert_eq;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
struct Gadget {
    power: RefCell<i64>,
}

impl Gadget {
    fn new(power: i64) -> Rc<Self> {
        Rc::new(Gadget {
            power: RefCell::new(power),
        })
    }
}

impl HostObject for Gadget {
    fn type_name(&self) -> &str {
        "Gadget"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn field_names(&self) -> Vec<String> {
        vec!["power".to_string()]
    }
    fn get_field(&self, name: &str) -> Option<Value> {
        (name == "power").then(|| Value::Int(*self.power.borrow()))
    }
    fn set_field(&self, name: &str, value: &Value) -> bool {
        match (name, value) {
            ("power", Value::Int(i)) => {
                *self.power.borrow_mut() = *i;
                true
            }
            _ => false,
        }
    }
}

fn gadget_of(recv: Option<&Value>) -> Option<Rc<dyn HostObject>> {
    match recv {
        Some(Value::Instance(inst)) => {
            let data = inst.borrow();
            data.backing.clone().or_else(|| data.boxed.clone())
        }
        Some(Value::Host(h)) => Some(h.clone()),
        _ => None,
    }
}

fn register_gadget(interp: &mut Interpreter) {
    let mut spec = HostTypeSpec::new("Gadget");
    spec.constructor = Some(NativeFunction::new(
        "new",
        vec![NativeParam::optional("power", ParamType::Number)],
        |_, _, args| {
            let power = match args.first() {
                Some(Value::Int(i)) => *i,
                _ => 0,
            };
            Ok(Some(Value::Host(Gadget::new(power))))
        },
    ));
    spec.instance_methods.push(NativeFunction::new(
        "power_level",
        vec![],
        |_, recv, _| {
            let v = gadget_of(recv)
                .and_then(|h| {
                    h.as_any()
                        .downcast_ref::<Gadget>()
                        .map(|g| Value::Int(*g.power.borrow()))
                })
                .unwrap_or(Value::Nil);
            Ok(Some(v))
        },
    ));
    spec.instance_methods.push(NativeFunction::new(
        "charge",
        vec![],
        |_, recv, _| {
            if let Some(h) = gadget_of(recv) {
                if let Some(g) = h.as_any().downcast_ref::<Gadget>() {
                    *g.power.borrow_mut() += 10;
                }
            }
            Ok(Some(Value::Nil))
        },
    ));
    interp.register_host_type(spec);
}

#[test]
fn fields_read_and_write_through_the_box() {
    let mut interp = Interpreter::new();
    register_gadget(&mut interp);
    let raw = Gadget::new(5);
    let global = interp.global;
    interp.set_local(global, "g", Value::Host(raw.clone()));

    assert_eq!(
        interp.run(&[member(var("g"), "power")]).unwrap(),
        Value::Int(5)
    );
    interp
        .run(&[assign(member(var("g"), "power"), int(9))])
        .unwrap();
    assert_eq!(*raw.power.borrow(), 9);
}

#[test]
fn boxing_rewrites_the_originating_binding() {
    let mut interp = Interpreter::new();
    register_gadget(&mut interp);
    let global = interp.global;
    interp.set_local(global, "g", Value::Host(Gadget::new(1)));

    interp.run(&[member(var("g"), "power")]).unwrap();
    let rebound = interp.get_var(global, "g").unwrap();
    assert!(matches!(rebound, Value::Instance(_)));
}

#[test]
fn boxing_the_same_object_yields_the_same_wrapper() {
    let mut interp = Interpreter::new();
    register_gadget(&mut interp);
    let raw = Value::Host(Gadget::new(1));
    let first = interp.box_value(raw.clone(), None).unwrap();
    let second = interp.box_value(raw.clone(), None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn reboxing_merges_the_new_scope_into_the_wrapper() {
    let mut interp = Interpreter::new();
    register_gadget(&mut interp);
    let raw = Value::Host(Gadget::new(1));
    let first_scope = interp.new_scope(None);
    interp.set_local(first_scope, "a", Value::Int(1));
    let second_scope = interp.new_scope(None);
    interp.set_local(second_scope, "b", Value::Int(2));

    let wrapper = interp.box_value(raw.clone(), Some(first_scope)).unwrap();
    let again = interp.box_value(raw, Some(second_scope)).unwrap();
    assert_eq!(wrapper, again);

    let Value::Instance(inst) = &wrapper else {
        panic!("expected a boxed instance");
    };
    let captured = inst.borrow().boxed_scope.expect("wrapper captures a scope");
    assert_eq!(interp.get_var(captured, "a"), Some(Value::Int(1)));
    assert_eq!(interp.get_var(captured, "b"), Some(Value::Int(2)));
}

#[test]
fn unbox_unwraps_and_evicts_the_cache_entry() {
    let mut interp = Interpreter::new();
    register_gadget(&mut interp);
    let raw = Value::Host(Gadget::new(1));
    let wrapper = interp.box_value(raw.clone(), None).unwrap();
    let unboxed = interp.unbox(wrapper.clone());
    assert_eq!(unboxed, raw);
    // the cache entry is gone, so boxing again builds a new wrapper
    let again = interp.box_value(raw, None).unwrap();
    assert_ne!(wrapper, again);
}

#[test]
fn unbox_unwraps_scalars() {
    let mut interp = Interpreter::new();
    let wrapper = interp.box_value(Value::Int(5), None).unwrap();
    assert!(matches!(wrapper, Value::Instance(_)));
    assert_eq!(interp.unbox(wrapper), Value::Int(5));
}

#[test]
fn native_methods_dispatch_on_registered_host_types() {
    let mut interp = Interpreter::new();
    register_gadget(&mut interp);
    let global = interp.global;
    interp.set_local(global, "g", Value::Host(Gadget::new(3)));
    assert_eq!(
        interp.run(&[mcall(var("g"), "power_level", vec![])]).unwrap(),
        Value::Int(3)
    );
}

#[test]
fn user_subclass_of_a_host_type_gets_a_backing_object() {
    let mut interp = Interpreter::new();
    register_gadget(&mut interp);
    let program = vec![
        class_def("Widget", Some("Gadget"), vec![]),
        assign(var("w"), call(var("Widget"), vec![])),
        assign(member(var("w"), "power"), int(7)),
        // instance variables sync into the backing object around natives
        mcall(var("w"), "power_level", vec![]),
    ];
    assert_eq!(interp.run(&program).unwrap(), Value::Int(7));
}

#[test]
fn native_mutation_syncs_back_into_instance_variables() {
    let mut interp = Interpreter::new();
    register_gadget(&mut interp);
    let program = vec![
        class_def("Widget", Some("Gadget"), vec![]),
        assign(var("w"), call(var("Widget"), vec![])),
        assign(member(var("w"), "power"), int(7)),
        mcall(var("w"), "charge", vec![]),
        member(var("w"), "power"),
    ];
    assert_eq!(interp.run(&program).unwrap(), Value::Int(17));
}

#[test]
fn reopening_a_primitive_overrides_its_operator() {
    let program: Vec<Node> = vec![
        class_open(
            int(5),
            vec![def(
                "op_Addition",
                vec![Param::required("b")],
                vec![bin("*", var("b"), int(10))],
            )],
        ),
        array(vec![bin("+", int(7), int(3)), bin("-", int(7), int(3))]),
    ];
    let mut interp = Interpreter::new();
    // the override is class-wide: every number now adds the new way,
    // while untouched operators keep the native behavior
    assert_eq!(
        interp.run(&program).unwrap(),
        Value::array(vec![Value::Int(30), Value::Int(4)])
    );
}

#[test]
fn reopening_a_primitive_overrides_its_unary_operator() {
    let program: Vec<Node> = vec![
        class_open(
            int(0),
            vec![def("op_UnaryNegation", vec![], vec![int(99)])],
        ),
        array(vec![unary("-", int(5)), unary("!", int(5))]),
    ];
    let mut interp = Interpreter::new();
    assert_eq!(
        interp.run(&program).unwrap(),
        Value::array(vec![Value::Int(99), Value::Bool(false)])
    );
}
