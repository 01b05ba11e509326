use super::*;
use crate::ast::Pipe;
use std::cell::RefCell;
use std::rc::Rc;

/// Receiver context handed to the binder: what `self`/`super` mean for
/// the call, and which class the resolution started from (so nested
/// `super` can continue up the chain).
#[derive(Debug, Clone)]
pub(crate) enum ReceiverCtx {
    None,
    Instance {
        instance: Value,
        dispatch_class: ClassId,
    },
    Class {
        class: ClassId,
        is_super: bool,
        fresh_instance: Option<Value>,
    },
}

/// The ordered resolver strategies for a member lookup. Iterated in
/// priority order; first hit wins, and a full miss is soft (nil).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Strategy {
    UserMethod,
    OperatorAlias,
}

const MEMBER_STRATEGIES: [Strategy; 2] = [Strategy::UserMethod, Strategy::OperatorAlias];

impl Interpreter {
    /// Walk the class chain for an instance method. Undefined names
    /// block resolution outright (including inherited definitions);
    /// removed names skip the removing level and continue upward.
    /// Instance-level sets are consulted at every level, singleton
    /// methods first.
    fn search_instance_function(
        &self,
        class_id: ClassId,
        name: &str,
        inst: &Rc<RefCell<InstanceData>>,
        args: &[CallArg],
        exact: bool,
        coming_from_remove: bool,
    ) -> Option<(FunctionRef, ClassId)> {
        let class = self.class(class_id);
        {
            let data = inst.borrow();
            if data.undefined_methods.contains(name) || class.undefined_methods.contains(name) {
                return None;
            }
            if (!coming_from_remove && data.removed_methods.contains(name))
                || class.removed_methods.contains(name)
            {
                let parent = class.parent?;
                return self.search_instance_function(parent, name, inst, args, exact, true);
            }
            if let Some(func) = data.singleton_methods.get(name) {
                if let Some(f) = FunctionRef::from_value(func) {
                    return Some((f, class_id));
                }
            }
        }
        if let Some(table) = class.instance_methods.get(name) {
            if let Some(f) = table.resolve(args, exact) {
                return Some((f, class_id));
            }
        }
        let parent = class.parent?;
        self.search_instance_function(parent, name, inst, args, false, false)
    }

    /// Class-method counterpart of [`search_instance_function`].
    fn search_class_function(
        &self,
        class_id: ClassId,
        name: &str,
        args: &[CallArg],
        exact: bool,
    ) -> Option<(FunctionRef, ClassId)> {
        let class = self.class(class_id);
        if class.undefined_methods.contains(name) {
            return None;
        }
        if class.removed_methods.contains(name) {
            let parent = class.parent?;
            return self.search_class_function(parent, name, args, exact);
        }
        if let Some(table) = class.class_methods.get(name) {
            if let Some(f) = table.resolve(args, exact) {
                return Some((f, class_id));
            }
        }
        let parent = class.parent?;
        self.search_class_function(parent, name, args, false)
    }

    fn run_strategies<F>(&self, name: &str, mut search: F) -> Option<(FunctionRef, ClassId)>
    where
        F: FnMut(&Self, &str) -> Option<(FunctionRef, ClassId)>,
    {
        for strategy in MEMBER_STRATEGIES {
            let candidate = match strategy {
                Strategy::UserMethod => search(self, name),
                Strategy::OperatorAlias => match op_method_name(name) {
                    Some(alias) => search(self, alias),
                    None => None,
                },
            };
            if let Some(hit) = candidate {
                log::trace!("resolved '{name}' via {strategy:?}");
                return Some(hit);
            }
        }
        None
    }

    /// Build the call scope for a member invocation: a child of the
    /// caller scope with the class context merged in.
    fn member_call_scope(&mut self, caller: ScopeId, class_id: ClassId) -> ScopeId {
        let call_scope = self.new_scope(Some(caller));
        let context = self.class(class_id).context;
        self.merge_from(call_scope, context);
        call_scope
    }

    pub(crate) fn new_instance(&mut self, class_id: ClassId) -> Value {
        let ivars = self.new_scope(None);
        Value::Instance(Rc::new(RefCell::new(InstanceData {
            class: class_id,
            ivars,
            singleton_methods: Default::default(),
            undefined_methods: Default::default(),
            removed_methods: Default::default(),
            boxed: None,
            boxed_scope: None,
            backing: None,
        })))
    }

    /// Box a host value as an instance of a specific class.
    fn box_as_instance_of(&mut self, class_id: ClassId, host: Rc<dyn HostObject>) -> Value {
        let ivars = self.new_scope(None);
        Value::Instance(Rc::new(RefCell::new(InstanceData {
            class: class_id,
            ivars,
            singleton_methods: Default::default(),
            undefined_methods: Default::default(),
            removed_methods: Default::default(),
            boxed: Some(host),
            boxed_scope: None,
            backing: None,
        })))
    }

    /// Late-bound member invocation. Resolution misses are soft: the
    /// result is `Ok(None)` and the caller decides whether that is nil
    /// or a hard error.
    pub(crate) fn invoke_member(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[CallArg],
        caller_scope: ScopeId,
        is_super: bool,
        start_class: Option<ClassId>,
        pipe: Pipe,
    ) -> Result<Option<Value>, RuntimeError> {
        match receiver {
            Value::Instance(inst) => {
                let class = inst.borrow().class;
                let origin = start_class.unwrap_or(class);
                let start = if is_super {
                    match self.class_parent(origin) {
                        Some(p) => p,
                        None => return Ok(None),
                    }
                } else {
                    origin
                };
                let found = {
                    let mut by_exact = None;
                    for exact in [true, false] {
                        by_exact = self.run_strategies(name, |me, n| {
                            me.search_instance_function(start, n, inst, args, exact, false)
                        });
                        if by_exact.is_some() {
                            break;
                        }
                    }
                    by_exact
                };
                let Some((func, found_at)) = found else {
                    log::trace!("miss: instance member '{name}'");
                    return Ok(None);
                };
                let call_scope = self.member_call_scope(caller_scope, class);
                let recv = ReceiverCtx::Instance {
                    instance: receiver.clone(),
                    dispatch_class: found_at,
                };
                self.bind_and_invoke(&Callable::Direct(func), args, call_scope, recv, pipe)
            }
            Value::Class(cid) => {
                let start = if is_super {
                    match self.class_parent(*cid) {
                        Some(p) => p,
                        None => return Ok(None),
                    }
                } else {
                    *cid
                };
                let found = {
                    let mut by_exact = None;
                    for exact in [true, false] {
                        by_exact = self.run_strategies(name, |me, n| {
                            me.search_class_function(start, n, args, exact)
                        });
                        if by_exact.is_some() {
                            break;
                        }
                    }
                    by_exact
                };
                let Some((func, _found_at)) = found else {
                    log::trace!("miss: class member '{name}' on {}", self.class_name(*cid));
                    return Ok(None);
                };
                let call_scope = self.member_call_scope(caller_scope, *cid);
                let fresh = if name == "new" && !func.is_native() {
                    Some(self.new_instance(*cid))
                } else {
                    None
                };
                let recv = ReceiverCtx::Class {
                    class: *cid,
                    is_super,
                    fresh_instance: fresh.clone(),
                };
                let result =
                    self.bind_and_invoke(&Callable::Direct(func), args, call_scope, recv, pipe)?;
                if name == "new" {
                    return self.finish_construction(*cid, result, fresh, args);
                }
                Ok(result)
            }
            Value::Module(_) => Ok(None),
            other => {
                // host-platform receiver: native method first, then box
                // the value and retry the full member protocol
                let boxed_class = self.boxed_class_for(other.type_name());
                let mut native_hit = None;
                for exact in [true, false] {
                    let mut cur = Some(boxed_class);
                    while let Some(id) = cur {
                        if let Some(table) = self.class(id).instance_methods.get(name) {
                            if let Some(FunctionRef::Native(f)) = table.resolve(args, exact) {
                                native_hit = Some(f);
                                break;
                            }
                        }
                        cur = self.class_parent(id);
                    }
                    if native_hit.is_some() {
                        break;
                    }
                }
                if let Some(func) = native_hit {
                    return self.invoke_native(&func, Some(receiver), args);
                }
                let boxed = self.box_value(other.clone(), Some(caller_scope))?;
                if matches!(boxed, Value::Instance(_)) {
                    self.invoke_member(&boxed, name, args, caller_scope, is_super, None, pipe)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Post-processing for `new`: a constructor body that did not end in
    /// the instance still yields it; a native constructor returning a
    /// host object is boxed into the class; a user class with a boxed
    /// host ancestor gets a backing object built from the constructor
    /// arguments.
    fn finish_construction(
        &mut self,
        class_id: ClassId,
        result: Option<Value>,
        fresh: Option<Value>,
        args: &[CallArg],
    ) -> Result<Option<Value>, RuntimeError> {
        let value = match result {
            Some(Value::Host(h)) => self.box_as_instance_of(class_id, h),
            Some(v @ Value::Instance(_)) => v,
            // an under-applied constructor curries like anything else
            Some(v @ Value::Partial(_)) => return Ok(Some(v)),
            _ => match fresh {
                Some(f) => f,
                None => return Ok(result),
            },
        };
        if let Value::Instance(inst) = &value {
            let needs_backing = {
                let data = inst.borrow();
                data.boxed.is_none() && data.backing.is_none()
            } && self.class(class_id).boxed_type.is_none()
                && {
                    let mut cur = self.class_parent(class_id);
                    let mut found = false;
                    while let Some(id) = cur {
                        if self.class(id).boxed_type.is_some() {
                            found = true;
                            break;
                        }
                        cur = self.class_parent(id);
                    }
                    found
                };
            if needs_backing {
                let values: Vec<Value> = args.iter().map(|a| a.value.clone()).collect();
                if let Some(backing) = self.construct_backing(class_id, &values)? {
                    inst.borrow_mut().backing = Some(backing);
                }
            }
        }
        Ok(Some(value))
    }

    /// Member read protocol.
    pub(crate) fn get_member(
        &mut self,
        receiver: &Value,
        name: &str,
        scope: ScopeId,
    ) -> Result<Value, RuntimeError> {
        match receiver {
            Value::Instance(inst) => {
                if name == "class" {
                    let class = inst.borrow().class;
                    return Ok(Value::Class(class));
                }
                {
                    let data = inst.borrow();
                    if let Some(host) = &data.boxed {
                        if let Some(v) = host.get_field(name) {
                            return Ok(v);
                        }
                    }
                }
                let accessor = format!("get_{}", capitalize(name));
                if let Some(v) =
                    self.invoke_member(receiver, &accessor, &[], scope, false, None, Pipe::None)?
                {
                    return Ok(v);
                }
                if let Some(v) =
                    self.invoke_member(receiver, name, &[], scope, false, None, Pipe::None)?
                {
                    return Ok(v);
                }
                let ivars = inst.borrow().ivars;
                Ok(self
                    .scope(ivars)
                    .vars
                    .get(name)
                    .cloned()
                    .unwrap_or(Value::Nil))
            }
            Value::Class(cid) => {
                if let Some(v) =
                    self.invoke_member(receiver, name, &[], scope, false, None, Pipe::None)?
                {
                    return Ok(v);
                }
                let context = self.class(*cid).context;
                Ok(self.get_var(context, name).unwrap_or(Value::Nil))
            }
            Value::Module(m) => {
                let context = m.borrow().context;
                Ok(self.get_var(context, name).unwrap_or(Value::Nil))
            }
            Value::Nil => Ok(Value::Nil),
            other => {
                let boxed = self.box_value(other.clone(), Some(scope))?;
                if matches!(boxed, Value::Instance(_)) {
                    self.get_member(&boxed, name, scope)
                } else {
                    Ok(Value::Nil)
                }
            }
        }
    }

    /// Member write protocol.
    pub(crate) fn set_member(
        &mut self,
        receiver: &Value,
        name: &str,
        value: Value,
        scope: ScopeId,
    ) -> Result<Value, RuntimeError> {
        match receiver {
            Value::Instance(inst) => {
                if name == "class" {
                    return Ok(Value::Nil);
                }
                {
                    let data = inst.borrow();
                    if let Some(host) = &data.boxed {
                        if host.set_field(name, &value) {
                            return Ok(value);
                        }
                    }
                }
                let writer = format!("set_{}", capitalize(name));
                let args = [CallArg::positional(value.clone())];
                if self
                    .invoke_member(receiver, &writer, &args, scope, false, None, Pipe::None)?
                    .is_some()
                {
                    return Ok(value);
                }
                let eq_writer = format!("{name}=");
                if self
                    .invoke_member(receiver, &eq_writer, &args, scope, false, None, Pipe::None)?
                    .is_some()
                {
                    return Ok(value);
                }
                if value.is_function() {
                    inst.borrow_mut()
                        .singleton_methods
                        .insert(name.to_string(), value.clone());
                    let mut data = inst.borrow_mut();
                    data.undefined_methods.remove(name);
                    data.removed_methods.remove(name);
                    return Ok(value);
                }
                let ivars = inst.borrow().ivars;
                self.set_local(ivars, name, value.clone());
                Ok(value)
            }
            Value::Class(cid) => {
                if let Some(func) = FunctionRef::from_value(&value) {
                    let named = match &func {
                        FunctionRef::User(f) => Rc::new(UserFunction {
                            name: name.to_string(),
                            params: f.params.clone(),
                            body: f.body.clone(),
                            context: f.context,
                            is_singleton: f.is_singleton,
                        }),
                        FunctionRef::Native(_) => {
                            self.add_instance_method(*cid, func);
                            return Ok(value);
                        }
                    };
                    self.add_instance_method(*cid, FunctionRef::User(named));
                    return Ok(value);
                }
                let context = self.class(*cid).context;
                self.set_local(context, name, value.clone());
                Ok(value)
            }
            Value::Nil => Ok(Value::Nil),
            other => {
                let boxed = self.box_value(other.clone(), Some(scope))?;
                if matches!(boxed, Value::Instance(_)) {
                    self.set_member(&boxed, name, value, scope)
                } else {
                    Ok(Value::Nil)
                }
            }
        }
    }
}

pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
