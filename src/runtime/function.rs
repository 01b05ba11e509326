use super::*;
use crate::ast::{Node, Param};
use std::rc::Rc;

/// A user-defined function: parameter list, body, and the scope it was
/// defined in (its context). `is_singleton` marks `def self.x` forms
/// produced inside a class body.
#[derive(Debug)]
pub struct UserFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Rc<Vec<Node>>,
    pub context: ScopeId,
    pub is_singleton: bool,
}

impl UserFunction {
    /// Required-argument count before default/vararg adjustment.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

/// Declared type of a native parameter, used by overload resolution to
/// match evaluated argument values against host signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Any,
    Number,
    Str,
    Bool,
    Array,
    Dict,
    Function,
    Instance,
}

impl ParamType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::Any => true,
            ParamType::Number => matches!(
                value,
                Value::Int(_) | Value::BigInt(_) | Value::Num(_)
            ),
            ParamType::Str => matches!(value, Value::Str(_)),
            ParamType::Bool => matches!(value, Value::Bool(_)),
            ParamType::Array => matches!(value, Value::Array(_)),
            ParamType::Dict => matches!(value, Value::Dict(_)),
            ParamType::Function => value.is_function(),
            ParamType::Instance => matches!(value, Value::Instance(_)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NativeParam {
    pub name: String,
    pub ty: ParamType,
    pub is_vararg: bool,
    pub has_default: bool,
}

impl NativeParam {
    pub fn new(name: &str, ty: ParamType) -> Self {
        NativeParam {
            name: name.to_string(),
            ty,
            is_vararg: false,
            has_default: false,
        }
    }

    pub fn vararg(name: &str) -> Self {
        NativeParam {
            is_vararg: true,
            ..NativeParam::new(name, ParamType::Any)
        }
    }

    pub fn optional(name: &str, ty: ParamType) -> Self {
        NativeParam {
            has_default: true,
            ..NativeParam::new(name, ty)
        }
    }
}

/// Signature of a registered native method. The receiver is `None` for
/// free functions and class-level natives invoked without an instance.
/// Returning `Ok(None)` means the native is void.
pub type NativeInvoker =
    Rc<dyn Fn(&mut Interpreter, Option<&Value>, &[Value]) -> Result<Option<Value>, RuntimeError>>;

pub struct NativeFunction {
    pub name: String,
    pub params: Vec<NativeParam>,
    pub invoker: NativeInvoker,
}

impl NativeFunction {
    pub fn new(
        name: &str,
        params: Vec<NativeParam>,
        invoker: impl Fn(&mut Interpreter, Option<&Value>, &[Value]) -> Result<Option<Value>, RuntimeError>
            + 'static,
    ) -> Rc<Self> {
        Rc::new(NativeFunction {
            name: name.to_string(),
            params,
            invoker: Rc::new(invoker),
        })
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFunction({}/{})", self.name, self.params.len())
    }
}

/// A direct handle on an invocable definition, user or native. Partials
/// are not function refs; they wrap one.
#[derive(Debug, Clone)]
pub enum FunctionRef {
    User(Rc<UserFunction>),
    Native(Rc<NativeFunction>),
}

impl FunctionRef {
    pub fn name(&self) -> &str {
        match self {
            FunctionRef::User(f) => &f.name,
            FunctionRef::Native(f) => &f.name,
        }
    }

    pub fn param_count(&self) -> usize {
        match self {
            FunctionRef::User(f) => f.params.len(),
            FunctionRef::Native(f) => f.params.len(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, FunctionRef::Native(_))
    }

    pub fn to_value(&self) -> Value {
        match self {
            FunctionRef::User(f) => Value::Function(f.clone()),
            FunctionRef::Native(f) => Value::Native(f.clone()),
        }
    }

    pub fn from_value(value: &Value) -> Option<FunctionRef> {
        match value {
            Value::Function(f) => Some(FunctionRef::User(f.clone())),
            Value::Native(f) => Some(FunctionRef::Native(f.clone())),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        match (self, other) {
            (FunctionRef::User(a), FunctionRef::User(b)) => Rc::ptr_eq(a, b),
            (FunctionRef::Native(a), FunctionRef::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Evaluated call-site argument. The originating node is kept so literal
/// parameters can bind the supplied *name* instead of the value.
#[derive(Debug, Clone)]
pub struct CallArg {
    pub name: Option<String>,
    pub value: Value,
    pub node: Option<Rc<Node>>,
}

impl CallArg {
    pub fn positional(value: Value) -> Self {
        CallArg {
            name: None,
            value,
            node: None,
        }
    }

    pub fn named(name: &str, value: Value) -> Self {
        CallArg {
            name: Some(name.to_string()),
            value,
            node: None,
        }
    }
}

/// A curried call: the wrapped function, the arguments frozen so far and
/// the scope captured at curry time. Completion appends (or, for a
/// backward pipe, prepends) the frozen arguments and re-enters binding.
#[derive(Debug)]
pub struct PartialFunction {
    pub name: String,
    pub wrapped: FunctionRef,
    pub frozen_args: Vec<CallArg>,
    pub scope: ScopeId,
}

/// Everything dispatch can hand to the binder. There is exactly one
/// completion path for partials, shared by every call form.
#[derive(Debug, Clone)]
pub enum Callable {
    Direct(FunctionRef),
    Partial(Rc<PartialFunction>),
}

impl Callable {
    pub fn from_value(value: &Value) -> Option<Callable> {
        match value {
            Value::Function(f) => Some(Callable::Direct(FunctionRef::User(f.clone()))),
            Value::Native(f) => Some(Callable::Direct(FunctionRef::Native(f.clone()))),
            Value::Partial(p) => Some(Callable::Partial(p.clone())),
            _ => None,
        }
    }
}
