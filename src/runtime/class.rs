use super::*;
use crate::ast::Node;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Index of a class record in the interpreter's class arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub(crate) u32);

/// One class: single parent, overload tables per method name, the
/// undefined/removed bookkeeping, and the class context scope that holds
/// class-level state shared by all instances.
#[derive(Debug)]
pub struct ClassDef {
    pub name: String,
    pub parent: Option<ClassId>,
    pub instance_methods: HashMap<String, MethodTable>,
    pub class_methods: HashMap<String, MethodTable>,
    pub undefined_methods: HashSet<String>,
    pub removed_methods: HashSet<String>,
    pub context: ScopeId,
    /// Host type name when this class is the boxed view of a host type.
    pub boxed_type: Option<String>,
}

/// All overloads sharing one name. Resolution follows a fixed pass
/// order: exact argument count, then named-argument match, then native
/// signature match, then compatible counts (defaults/varargs).
#[derive(Debug, Default)]
pub struct MethodTable {
    pub functions: Vec<FunctionRef>,
}

impl MethodTable {
    pub fn new() -> Self {
        MethodTable::default()
    }

    /// Add an overload. A user function replaces an existing user
    /// overload of the same parameter count; everything else appends.
    pub fn add_function(&mut self, func: FunctionRef) {
        if !func.is_native() {
            if let Some(pos) = self
                .functions
                .iter()
                .position(|f| !f.is_native() && f.param_count() == func.param_count())
            {
                self.functions[pos] = func;
                return;
            }
        }
        self.functions.push(func);
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn name_match(func: &FunctionRef, args: &[CallArg]) -> bool {
        let named: Vec<&str> = args.iter().filter_map(|a| a.name.as_deref()).collect();
        if named.is_empty() {
            return false;
        }
        match func {
            FunctionRef::User(f) => named.iter().all(|n| f.params.iter().any(|p| &p.name == n)),
            FunctionRef::Native(f) => named.iter().all(|n| f.params.iter().any(|p| &p.name == n)),
        }
    }

    fn native_type_match(func: &FunctionRef, args: &[CallArg]) -> bool {
        let FunctionRef::Native(f) = func else {
            return false;
        };
        let has_vararg = f.params.last().map(|p| p.is_vararg).unwrap_or(false);
        let fixed = if has_vararg {
            f.params.len() - 1
        } else {
            f.params.len()
        };
        if has_vararg && args.len() >= fixed {
            return args
                .iter()
                .zip(f.params.iter())
                .all(|(a, p)| p.is_vararg || p.ty.matches(&a.value));
        }
        let required = f.params.iter().filter(|p| !p.has_default).count();
        if args.len() < required || args.len() > f.params.len() {
            return false;
        }
        args.iter()
            .zip(f.params.iter())
            .all(|(a, p)| p.ty.matches(&a.value))
    }

    /// Count compatibility beyond strict equality: trailing varargs
    /// absorb extras (and may be empty), defaults cover missing tails.
    fn compatible(func: &FunctionRef, args: &[CallArg]) -> bool {
        let (total, required, has_vararg) = match func {
            FunctionRef::User(f) => {
                let total = f.params.len();
                let loose = f
                    .params
                    .iter()
                    .filter(|p| p.default.is_some() || p.is_vararg || p.is_function)
                    .count();
                let has_vararg = f.params.iter().any(|p| p.is_vararg);
                (total, total - loose, has_vararg)
            }
            FunctionRef::Native(f) => {
                let total = f.params.len();
                let loose = f
                    .params
                    .iter()
                    .filter(|p| p.has_default || p.is_vararg)
                    .count();
                let has_vararg = f.params.iter().any(|p| p.is_vararg);
                (total, total - loose, has_vararg)
            }
        };
        if args.len() == total {
            return true;
        }
        if has_vararg && args.len() + 1 >= required {
            return true;
        }
        args.len() >= required && args.len() <= total
    }

    /// Pick the overload for this argument list. With `exact` set, a
    /// lone overload is not returned blindly; it must still pass the
    /// matching passes. Candidates with the exact argument count are
    /// considered on their own first; only when none exists does the
    /// count-compatible set (defaults, varargs) get the same treatment.
    /// Returns `None` when nothing matches.
    pub fn resolve(&self, args: &[CallArg], exact: bool) -> Option<FunctionRef> {
        if self.functions.is_empty() {
            return None;
        }
        if self.functions.len() == 1 && !exact {
            return Some(self.functions[0].clone());
        }
        let count_equal: Vec<&FunctionRef> = self
            .functions
            .iter()
            .filter(|f| f.param_count() == args.len())
            .collect();
        if !count_equal.is_empty() {
            return Self::pick(&count_equal, args);
        }
        let loose: Vec<&FunctionRef> = self
            .functions
            .iter()
            .filter(|f| Self::compatible(f, args))
            .collect();
        if !loose.is_empty() {
            return Self::pick(&loose, args);
        }
        None
    }

    /// Preference order within one candidate set: lone candidate, then
    /// named arguments matching declared names, then native signature
    /// types, then the first count-compatible entry.
    fn pick(candidates: &[&FunctionRef], args: &[CallArg]) -> Option<FunctionRef> {
        if candidates.len() == 1 {
            return Some(candidates[0].clone());
        }
        if let Some(f) = candidates.iter().find(|f| Self::name_match(f, args)) {
            return Some((*f).clone());
        }
        if let Some(f) = candidates.iter().find(|f| Self::native_type_match(f, args)) {
            return Some((*f).clone());
        }
        if let Some(f) = candidates.iter().find(|f| Self::compatible(f, args)) {
            return Some((*f).clone());
        }
        None
    }
}

impl Interpreter {
    pub(crate) fn add_class_def(&mut self, def: ClassDef) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(def);
        id
    }

    pub(crate) fn class(&self, id: ClassId) -> &ClassDef {
        &self.classes[id.0 as usize]
    }

    pub(crate) fn class_mut(&mut self, id: ClassId) -> &mut ClassDef {
        &mut self.classes[id.0 as usize]
    }

    pub fn class_name(&self, id: ClassId) -> &str {
        &self.class(id).name
    }

    pub fn class_parent(&self, id: ClassId) -> Option<ClassId> {
        self.class(id).parent
    }

    pub(crate) fn add_instance_method(&mut self, class_id: ClassId, func: FunctionRef) {
        let name = func.name().to_string();
        if name == DO_NOT_EXPORT {
            return;
        }
        let class = self.class_mut(class_id);
        class.undefined_methods.remove(&name);
        class.removed_methods.remove(&name);
        class
            .instance_methods
            .entry(name)
            .or_insert_with(MethodTable::new)
            .add_function(func);
    }

    pub(crate) fn add_class_method(&mut self, class_id: ClassId, func: FunctionRef) {
        let name = func.name().to_string();
        if name == DO_NOT_EXPORT {
            return;
        }
        let class = self.class_mut(class_id);
        class.undefined_methods.remove(&name);
        class.removed_methods.remove(&name);
        class
            .class_methods
            .entry(name)
            .or_insert_with(MethodTable::new)
            .add_function(func);
    }

    /// Route a function produced by a class body to the right table:
    /// singleton-marked or named `new` goes class-side.
    fn add_defined_method(&mut self, class_id: ClassId, func: FunctionRef) {
        let class_side = match &func {
            FunctionRef::User(f) => f.is_singleton || f.name == "new",
            FunctionRef::Native(f) => f.name == "new",
        };
        if class_side {
            self.add_class_method(class_id, func);
        } else {
            self.add_instance_method(class_id, func);
        }
    }

    /// `undef`/`remove` at class level.
    pub(crate) fn method_change(&mut self, class_id: ClassId, names: &[String], remove: bool) {
        let class = self.class_mut(class_id);
        for name in names {
            if remove {
                class.removed_methods.insert(name.clone());
            } else {
                class.undefined_methods.insert(name.clone());
            }
        }
    }

    /// `undef`/`remove` against an arbitrary receiver. Instances get
    /// instance-level sets; host values are boxed first; classes take
    /// the change at class level.
    pub(crate) fn object_method_change(
        &mut self,
        target: &Value,
        names: &[String],
        remove: bool,
        scope: ScopeId,
    ) -> Result<(), RuntimeError> {
        match target {
            Value::Class(id) => {
                self.method_change(*id, names, remove);
                Ok(())
            }
            Value::Instance(inst) => {
                let mut inst = inst.borrow_mut();
                for name in names {
                    if remove {
                        inst.removed_methods.insert(name.clone());
                    } else {
                        inst.undefined_methods.insert(name.clone());
                    }
                }
                Ok(())
            }
            other => {
                let boxed = self.box_value(other.clone(), Some(scope))?;
                self.object_method_change(&boxed, names, remove, scope)
            }
        }
    }

    /// Define a class. A name that already resolves to a class reopens
    /// it (category), preserving identity. The body runs in two passes:
    /// includes first, then everything else.
    pub(crate) fn define_class(
        &mut self,
        name: &str,
        parent_name: Option<&str>,
        body: &[Node],
        scope: ScopeId,
    ) -> Result<Value, RuntimeError> {
        if let Some(Value::Class(existing)) = self.get_var(scope, name) {
            log::debug!("reopening class {name} as category");
            return self.define_category(existing, body);
        }
        let parent = match parent_name {
            None => self.object_class,
            Some(p) => match self.get_var(scope, p) {
                Some(Value::Class(id)) => id,
                _ => {
                    if self.host_types.contains_key(p) {
                        self.boxed_class_for(p)
                    } else {
                        // unresolvable parent: definition is a soft miss
                        return Ok(Value::Nil);
                    }
                }
            },
        };
        log::debug!(
            "defining class {name} < {}",
            self.class_name(parent)
        );
        let xscope = self.new_scope(Some(scope));
        let class_id = self.add_class_def(ClassDef {
            name: name.to_string(),
            parent: Some(parent),
            instance_methods: HashMap::new(),
            class_methods: HashMap::new(),
            undefined_methods: HashSet::new(),
            removed_methods: HashSet::new(),
            context: xscope,
            boxed_type: None,
        });
        self.set_local(xscope, "self", Value::Class(class_id));
        self.set_local(xscope, name, Value::Class(class_id));

        let nested = !self.class_define_stack.is_empty();
        self.class_define_stack.push(class_id);
        let result = self.run_class_body(class_id, body, xscope);
        self.class_define_stack.pop();
        result?;

        self.synthesize_default_new(class_id, xscope);
        let bind_scope = if nested { self.global } else { scope };
        self.set_local(bind_scope, name, Value::Class(class_id));
        Ok(Value::Class(class_id))
    }

    /// Reopen an existing class: run a class body against its original
    /// context. Identity is preserved; existing instances see additions.
    pub(crate) fn define_category(
        &mut self,
        class_id: ClassId,
        body: &[Node],
    ) -> Result<Value, RuntimeError> {
        let xscope = self.class(class_id).context;
        self.set_local(xscope, "self", Value::Class(class_id));
        self.class_define_stack.push(class_id);
        let result = self.run_class_body(class_id, body, xscope);
        self.class_define_stack.pop();
        result?;
        Ok(Value::Class(class_id))
    }

    /// Reopen through an arbitrary receiver: class value, instance (its
    /// class), or host value (boxed first).
    pub(crate) fn define_class_open(
        &mut self,
        target: &Value,
        body: &[Node],
        scope: ScopeId,
    ) -> Result<Value, RuntimeError> {
        match target {
            Value::Class(id) => self.define_category(*id, body),
            Value::Instance(inst) => {
                let class = inst.borrow().class;
                self.define_category(class, body)
            }
            Value::Nil => Ok(Value::Nil),
            other => {
                let boxed = self.box_value(other.clone(), Some(scope))?;
                self.define_class_open(&boxed, body, scope)
            }
        }
    }

    fn run_class_body(
        &mut self,
        class_id: ClassId,
        body: &[Node],
        xscope: ScopeId,
    ) -> Result<(), RuntimeError> {
        // pass 1: includes
        for node in body {
            if let Node::Include(names) = node {
                self.include_into_class(class_id, names, xscope)?;
            }
        }
        // pass 2: declarations
        for node in body {
            if matches!(node, Node::Include(_)) {
                continue;
            }
            let value = self.eval(node, xscope)?;
            if let Some(func) = FunctionRef::from_value(&value) {
                self.add_defined_method(class_id, func);
            }
        }
        Ok(())
    }

    fn include_into_class(
        &mut self,
        class_id: ClassId,
        names: &[String],
        xscope: ScopeId,
    ) -> Result<(), RuntimeError> {
        for name in names {
            match self.get_var(xscope, name) {
                Some(Value::Module(module)) => {
                    let (context, contents) = {
                        let m = module.borrow();
                        (m.context, m.contents.clone())
                    };
                    self.merge_from(xscope, context);
                    for value in contents {
                        if let Some(func) = FunctionRef::from_value(&value) {
                            self.add_defined_method(class_id, func);
                        }
                    }
                }
                Some(v @ Value::Class(_)) => {
                    // including a class just makes it visible in the body
                    self.set_local(xscope, name, v);
                }
                _ => {
                    log::trace!("include: '{name}' did not resolve, skipped");
                }
            }
        }
        Ok(())
    }

    /// Every class answers `new`; classes that do not declare one get a
    /// zero-argument constructor returning the fresh instance.
    fn synthesize_default_new(&mut self, class_id: ClassId, xscope: ScopeId) {
        if self.class(class_id).class_methods.contains_key("new") {
            return;
        }
        let func = Rc::new(UserFunction {
            name: "new".to_string(),
            params: Vec::new(),
            body: Rc::new(vec![Node::Var("self".to_string())]),
            context: xscope,
            is_singleton: true,
        });
        self.add_class_method(class_id, FunctionRef::User(func));
    }

    /// Collect a module body: definitions evaluated in a child scope,
    /// function results kept for later `include`.
    pub(crate) fn define_module(
        &mut self,
        name: &str,
        body: &[Node],
        scope: ScopeId,
    ) -> Result<Value, RuntimeError> {
        let xscope = self.new_scope(Some(scope));
        let mut contents = Vec::new();
        for node in body {
            let value = self.eval(node, xscope)?;
            if value.is_function() {
                contents.push(value);
            }
        }
        let module = Value::Module(Rc::new(std::cell::RefCell::new(ModuleData {
            name: name.to_string(),
            context: xscope,
            contents,
        })));
        self.set_local(scope, name, module.clone());
        Ok(module)
    }

    /// Walk the parent chain looking for a class with this exact name.
    pub(crate) fn find_ancestor_named(&self, mut class_id: ClassId, name: &str) -> Option<ClassId> {
        loop {
            if self.class_name(class_id) == name {
                return Some(class_id);
            }
            class_id = self.class_parent(class_id)?;
        }
    }
}
