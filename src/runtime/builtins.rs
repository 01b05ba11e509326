//! Builtin host types and the bundled `Exception` class, registered at
//! interpreter construction. These stand in for the host reflection
//! surface: a small native method set per primitive type, with typed
//! parameters so native overload matching has something to chew on.

use super::*;

fn unwrap_receiver(receiver: Option<&Value>) -> Value {
    match receiver {
        Some(Value::Instance(inst)) => {
            let data = inst.borrow();
            if let Some(host) = &data.boxed {
                if let Some(scalar) = host.as_any().downcast_ref::<ScalarHost>() {
                    return scalar.0.clone();
                }
            }
            Value::Instance(inst.clone())
        }
        Some(v) => v.clone(),
        None => Value::Nil,
    }
}

pub(crate) fn install(interp: &mut Interpreter) {
    install_number(interp);
    install_string(interp);
    install_array(interp);
    install_dictionary(interp);
    interp.register_host_type(HostTypeSpec::new("Boolean"));
    install_exception_class(interp);
}

fn install_number(interp: &mut Interpreter) {
    let mut spec = HostTypeSpec::new("Number");
    spec.instance_methods.push(NativeFunction::new(
        "abs",
        vec![],
        |_, recv, _| {
            let v = match unwrap_receiver(recv) {
                Value::Int(i) => Value::Int(i.abs()),
                Value::Num(n) => Value::Num(n.abs()),
                Value::BigInt(i) => {
                    use num_traits::Signed;
                    Value::BigInt(i.abs())
                }
                other => other,
            };
            Ok(Some(v))
        },
    ));
    spec.instance_methods.push(NativeFunction::new(
        "floor",
        vec![],
        |_, recv, _| {
            let v = match unwrap_receiver(recv) {
                Value::Num(n) => Value::Int(n.floor() as i64),
                other => other,
            };
            Ok(Some(v))
        },
    ));
    interp.register_host_type(spec);
}

fn install_string(interp: &mut Interpreter) {
    let mut spec = HostTypeSpec::new("String");
    spec.instance_methods.push(NativeFunction::new(
        "length",
        vec![],
        |_, recv, _| {
            let v = match unwrap_receiver(recv) {
                Value::Str(s) => Value::Int(s.chars().count() as i64),
                _ => Value::Nil,
            };
            Ok(Some(v))
        },
    ));
    spec.instance_methods.push(NativeFunction::new(
        "upcase",
        vec![],
        |_, recv, _| {
            let v = match unwrap_receiver(recv) {
                Value::Str(s) => Value::str(s.to_uppercase()),
                _ => Value::Nil,
            };
            Ok(Some(v))
        },
    ));
    spec.instance_methods.push(NativeFunction::new(
        "downcase",
        vec![],
        |_, recv, _| {
            let v = match unwrap_receiver(recv) {
                Value::Str(s) => Value::str(s.to_lowercase()),
                _ => Value::Nil,
            };
            Ok(Some(v))
        },
    ));
    spec.instance_methods.push(NativeFunction::new(
        "contains",
        vec![NativeParam::new("needle", ParamType::Str)],
        |_, recv, args| {
            let v = match (unwrap_receiver(recv), args.first()) {
                (Value::Str(s), Some(Value::Str(needle))) => Value::Bool(s.contains(needle)),
                _ => Value::Bool(false),
            };
            Ok(Some(v))
        },
    ));
    interp.register_host_type(spec);
}

fn install_array(interp: &mut Interpreter) {
    let mut spec = HostTypeSpec::new("Array");
    spec.instance_methods.push(NativeFunction::new(
        "size",
        vec![],
        |_, recv, _| {
            let v = match unwrap_receiver(recv) {
                Value::Array(items) => Value::Int(items.borrow().len() as i64),
                _ => Value::Nil,
            };
            Ok(Some(v))
        },
    ));
    spec.instance_methods.push(NativeFunction::new(
        "push",
        vec![NativeParam::vararg("items")],
        |_, recv, args| {
            let target = unwrap_receiver(recv);
            if let Value::Array(items) = &target {
                for arg in args {
                    if !matches!(arg, Value::Nil) {
                        items.borrow_mut().push(arg.clone());
                    }
                }
            }
            Ok(Some(target))
        },
    ));
    spec.instance_methods.push(NativeFunction::new(
        "pop",
        vec![],
        |_, recv, _| {
            let v = match unwrap_receiver(recv) {
                Value::Array(items) => {
                    let popped = items.borrow_mut().pop();
                    popped.unwrap_or(Value::Nil)
                }
                _ => Value::Nil,
            };
            Ok(Some(v))
        },
    ));
    spec.instance_methods.push(NativeFunction::new(
        "first",
        vec![],
        |_, recv, _| {
            let v = match unwrap_receiver(recv) {
                Value::Array(items) => {
                    let first = items.borrow().first().cloned();
                    first.unwrap_or(Value::Nil)
                }
                _ => Value::Nil,
            };
            Ok(Some(v))
        },
    ));
    interp.register_host_type(spec);
}

fn install_dictionary(interp: &mut Interpreter) {
    let mut spec = HostTypeSpec::new("Dictionary");
    spec.instance_methods.push(NativeFunction::new(
        "size",
        vec![],
        |_, recv, _| {
            let v = match unwrap_receiver(recv) {
                Value::Dict(map) => Value::Int(map.borrow().len() as i64),
                _ => Value::Nil,
            };
            Ok(Some(v))
        },
    ));
    spec.instance_methods.push(NativeFunction::new(
        "has_key",
        vec![NativeParam::new("key", ParamType::Any)],
        |_, recv, args| {
            let v = match (unwrap_receiver(recv), args.first()) {
                (Value::Dict(map), Some(key)) => {
                    Value::Bool(map.borrow().contains_key(&key.dict_key()))
                }
                _ => Value::Bool(false),
            };
            Ok(Some(v))
        },
    ));
    interp.register_host_type(spec);
}

/// The bundled `Exception` class: `new(message = "")` stores the message
/// as an ordinary instance variable, readable through `message`.
fn install_exception_class(interp: &mut Interpreter) {
    let context = interp.new_scope(Some(interp.global));
    let class_id = interp.add_class_def(ClassDef {
        name: "Exception".to_string(),
        parent: Some(interp.object_class),
        instance_methods: HashMap::new(),
        class_methods: HashMap::new(),
        undefined_methods: HashSet::new(),
        removed_methods: HashSet::new(),
        context,
        boxed_type: None,
    });
    interp.exception_class = class_id;
    interp.set_local(context, "self", Value::Class(class_id));
    interp.set_local(interp.global, "Exception", Value::Class(class_id));

    let ctor = NativeFunction::new(
        "new",
        vec![NativeParam::optional("message", ParamType::Any)],
        |interp, recv, args| {
            let class = match recv {
                Some(Value::Class(id)) => *id,
                _ => interp.exception_class,
            };
            let instance = interp.new_instance(class);
            let message = match args.first() {
                Some(Value::Nil) | None => Value::str(""),
                Some(v) => v.clone(),
            };
            if let Value::Instance(inst) = &instance {
                let ivars = inst.borrow().ivars;
                interp.set_local(ivars, "message", message);
            }
            Ok(Some(instance))
        },
    );
    interp.add_class_method(class_id, FunctionRef::Native(ctor));

    let message = NativeFunction::new("message", vec![], |interp, recv, _| {
        let v = match recv {
            Some(Value::Instance(inst)) => {
                let ivars = inst.borrow().ivars;
                interp
                    .scope(ivars)
                    .vars
                    .get("message")
                    .cloned()
                    .unwrap_or(Value::Nil)
            }
            _ => Value::Nil,
        };
        Ok(Some(v))
    });
    interp.add_instance_method(class_id, FunctionRef::Native(message));
}
