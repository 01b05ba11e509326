use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;

use crate::runtime::boxing::HostObject;
use crate::runtime::function::{NativeFunction, PartialFunction, UserFunction};
use crate::runtime::{ClassId, ScopeId};
use crate::symbol::Symbol;

/// Key type of the dictionary value. Symbol keys and string keys are
/// distinct even when the symbol's text equals the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    Str(String),
    Sym(Symbol),
    Int(i64),
    Bool(bool),
}

/// Mutable state of a user-level object.
#[derive(Debug)]
pub struct InstanceData {
    pub class: ClassId,
    /// Instance-variable scope (no parent).
    pub ivars: ScopeId,
    pub singleton_methods: HashMap<String, Value>,
    pub undefined_methods: HashSet<String>,
    pub removed_methods: HashSet<String>,
    /// Present when this instance is a box around a host object.
    pub boxed: Option<Rc<dyn HostObject>>,
    /// Scope captured at box time; later boxes of the same object merge
    /// their scopes into it.
    pub boxed_scope: Option<ScopeId>,
    /// Host object backing a user instance whose class chain includes a
    /// boxed host type. Fields are synced around native calls.
    pub backing: Option<Rc<dyn HostObject>>,
}

/// A named bundle of definitions produced by `module ... end`; consumed
/// by `include` during class definition.
#[derive(Debug)]
pub struct ModuleData {
    pub name: String,
    pub context: ScopeId,
    pub contents: Vec<Value>,
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    BigInt(BigInt),
    Num(f64),
    Str(String),
    Sym(Symbol),
    Array(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<HashMap<DictKey, Value>>>),
    Function(Rc<UserFunction>),
    Native(Rc<NativeFunction>),
    Partial(Rc<PartialFunction>),
    Class(ClassId),
    Module(Rc<RefCell<ModuleData>>),
    Instance(Rc<RefCell<InstanceData>>),
    Host(Rc<dyn HostObject>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn dict(pairs: Vec<(DictKey, Value)>) -> Value {
        Value::Dict(Rc::new(RefCell::new(pairs.into_iter().collect())))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::BigInt(i) => !num_traits::Zero::is_zero(i),
            Value::Num(n) => *n != 0.0,
            _ => true,
        }
    }

    /// Host-type name used by native dispatch and boxed-class lookup.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Nil => "Object",
            Value::Bool(_) => "Boolean",
            Value::Int(_) | Value::BigInt(_) | Value::Num(_) => "Number",
            Value::Str(_) => "String",
            Value::Sym(_) => "Symbol",
            Value::Array(_) => "Array",
            Value::Dict(_) => "Dictionary",
            Value::Function(_) | Value::Native(_) | Value::Partial(_) => "Function",
            Value::Class(_) => "Class",
            Value::Module(_) => "Module",
            Value::Instance(_) => "Instance",
            Value::Host(h) => h.type_name(),
        }
    }

    /// Reference identity, for the box cache and reverse scope search.
    /// Scalars have no identity.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(r) => Some(Rc::as_ptr(r) as usize),
            Value::Dict(r) => Some(Rc::as_ptr(r) as usize),
            Value::Function(r) => Some(Rc::as_ptr(r) as usize),
            Value::Native(r) => Some(Rc::as_ptr(r) as usize),
            Value::Partial(r) => Some(Rc::as_ptr(r) as usize),
            Value::Module(r) => Some(Rc::as_ptr(r) as usize),
            Value::Instance(r) => Some(Rc::as_ptr(r) as usize),
            Value::Host(r) => Some(Rc::as_ptr(r) as *const () as usize),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Native(_) | Value::Partial(_)
        )
    }

    pub fn dict_key(&self) -> DictKey {
        match self {
            Value::Str(s) => DictKey::Str(s.clone()),
            Value::Sym(s) => DictKey::Sym(*s),
            Value::Int(i) => DictKey::Int(*i),
            Value::Bool(b) => DictKey::Bool(*b),
            other => DictKey::Str(other.to_string()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Int(a), Value::BigInt(b)) | (Value::BigInt(b), Value::Int(a)) => {
                BigInt::from(*a) == *b
            }
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Int(a), Value::Num(b)) | (Value::Num(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Sym(a), Value::Sym(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Partial(a), Value::Partial(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => {
                std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::BigInt(i) => write!(f, "{i}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Sym(s) => write!(f, ":{s:?}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Dict(map) => write!(f, "<dictionary of {}>", map.borrow().len()),
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::Native(func) => write!(f, "<native {}>", func.name),
            Value::Partial(p) => write!(f, "<partial {}>", p.name),
            Value::Class(_) => write!(f, "<class>"),
            Value::Module(m) => write!(f, "<module {}>", m.borrow().name),
            Value::Instance(_) => write!(f, "<instance>"),
            Value::Host(h) => write!(f, "<host {}>", h.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Class(id) => write!(f, "<class #{id:?}>"),
            Value::Instance(r) => write!(f, "<instance {:p}>", Rc::as_ptr(r)),
            other => write!(f, "{other}"),
        }
    }
}
