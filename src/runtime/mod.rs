//! Runtime core: the [`Interpreter`] owns every registry (scope arena,
//! class arena, symbol interner, host type table, box cache), so two
//! interpreters never share state. The `impl Interpreter` blocks are
//! split across the submodules by concern.

pub mod binder;
pub mod boxing;
pub mod builtins;
pub mod class;
pub mod dispatch;
pub mod exception;
pub mod function;
pub mod ops;
pub mod scope;

pub use boxing::{HostObject, HostTypeSpec, ScalarHost, DO_NOT_EXPORT};
pub use class::{ClassDef, ClassId, MethodTable};
pub use function::{
    CallArg, Callable, FunctionRef, NativeFunction, NativeInvoker, NativeParam, ParamType,
    PartialFunction, UserFunction,
};
pub use ops::op_method_name;
pub use scope::ScopeId;

pub(crate) use dispatch::ReceiverCtx;

use crate::ast::Node;
use crate::error::{ErrorKind, RuntimeError};
use crate::symbol::{Interner, Symbol};
use crate::value::{InstanceData, ModuleData, Value};
use scope::ScopeRec;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Reserved scope slot carrying the class a method was resolved in, so
/// `super` continues from there instead of the instance's own class.
pub(crate) const DISPATCH_CLASS: &str = "<nova_dispatch_class>";
/// Reserved argument/slot name for the implicit block of a call.
pub(crate) const YIELD_BLOCK: &str = "__yieldBlock";

pub struct Interpreter {
    pub(crate) scopes: Vec<ScopeRec>,
    pub(crate) classes: Vec<ClassDef>,
    pub global: ScopeId,
    pub interner: Interner,
    pub(crate) host_types: HashMap<String, Rc<HostTypeSpec>>,
    pub(crate) boxed_classes: HashMap<String, ClassId>,
    pub(crate) box_cache: HashMap<usize, Value>,
    pub(crate) held_locks: HashSet<usize>,
    pub(crate) held_name_locks: HashSet<String>,
    pub(crate) class_define_stack: Vec<ClassId>,
    pub object_class: ClassId,
    pub exception_class: ClassId,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let mut interp = Interpreter {
            scopes: Vec::new(),
            classes: Vec::new(),
            global: ScopeId(0),
            interner: Interner::new(),
            host_types: HashMap::new(),
            boxed_classes: HashMap::new(),
            box_cache: HashMap::new(),
            held_locks: HashSet::new(),
            held_name_locks: HashSet::new(),
            class_define_stack: Vec::new(),
            object_class: ClassId(0),
            exception_class: ClassId(0),
        };
        interp.global = interp.new_scope(None);
        let object_context = interp.new_scope(Some(interp.global));
        interp.object_class = interp.add_class_def(ClassDef {
            name: "Object".to_string(),
            parent: None,
            instance_methods: HashMap::new(),
            class_methods: HashMap::new(),
            undefined_methods: HashSet::new(),
            removed_methods: HashSet::new(),
            context: object_context,
            boxed_type: None,
        });
        let object = Value::Class(interp.object_class);
        interp.set_local(object_context, "self", object.clone());
        interp.set_local(interp.global, "Object", object);
        builtins::install(&mut interp);
        interp
    }

    /// Evaluate statements in order; the value of the last one is the
    /// value of the body.
    pub(crate) fn run_body(&mut self, body: &[Node], scope: ScopeId) -> Result<Value, RuntimeError> {
        let mut result = Value::Nil;
        for node in body {
            result = self.eval(node, scope)?;
        }
        Ok(result)
    }

    /// Run a program against the global scope.
    pub fn run(&mut self, program: &[Node]) -> Result<Value, RuntimeError> {
        let global = self.global;
        self.run_body(program, global)
    }
}
