use super::*;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Native method names carrying this marker are invisible to dispatch.
pub const DO_NOT_EXPORT: &str = "<__doNotExport>";

/// A host-platform object made visible to the runtime. Field access uses
/// interior mutability; `set_field` returns `false` on a type mismatch
/// so the sync pass can skip incompatible values.
pub trait HostObject: std::fmt::Debug {
    fn type_name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
    fn field_names(&self) -> Vec<String> {
        Vec::new()
    }
    fn get_field(&self, _name: &str) -> Option<Value> {
        None
    }
    fn set_field(&self, _name: &str, _value: &Value) -> bool {
        false
    }
}

/// Wrapper giving scalar values a host identity for the boxing path.
#[derive(Debug)]
pub struct ScalarHost(pub Value);

impl HostObject for ScalarHost {
    fn type_name(&self) -> &str {
        self.0.type_name()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The registration surface standing in for host reflection: what the
/// boxed-class builder walks when a host type is first boxed.
pub struct HostTypeSpec {
    pub name: String,
    /// Name the boxed class is exported under; defaults to `name`.
    pub export_name: Option<String>,
    pub base: Option<String>,
    pub do_not_export: bool,
    pub constructor: Option<Rc<NativeFunction>>,
    pub instance_methods: Vec<Rc<NativeFunction>>,
    pub class_methods: Vec<Rc<NativeFunction>>,
}

impl HostTypeSpec {
    pub fn new(name: &str) -> Self {
        HostTypeSpec {
            name: name.to_string(),
            export_name: None,
            base: None,
            do_not_export: false,
            constructor: None,
            instance_methods: Vec::new(),
            class_methods: Vec::new(),
        }
    }
}

impl Interpreter {
    pub fn register_host_type(&mut self, spec: HostTypeSpec) {
        self.host_types.insert(spec.name.clone(), Rc::new(spec));
    }

    /// The boxed `Class` for a host type name, built lazily on first use
    /// and cached for the life of the interpreter. Unregistered types get
    /// an empty shadow class under the root.
    pub(crate) fn boxed_class_for(&mut self, type_name: &str) -> ClassId {
        if let Some(id) = self.boxed_classes.get(type_name) {
            return *id;
        }
        let spec = self.host_types.get(type_name).cloned();
        let (class_name, parent, do_not_export) = match &spec {
            Some(s) => {
                let parent = match &s.base {
                    Some(base) => {
                        let base = base.clone();
                        self.boxed_class_for(&base)
                    }
                    None => self.object_class,
                };
                (
                    s.export_name.clone().unwrap_or_else(|| s.name.clone()),
                    parent,
                    s.do_not_export,
                )
            }
            None => (type_name.to_string(), self.object_class, false),
        };
        log::debug!("building boxed class for host type {type_name}");
        let context = self.new_scope(Some(self.global));
        let class_id = self.add_class_def(ClassDef {
            name: class_name.clone(),
            parent: Some(parent),
            instance_methods: HashMap::new(),
            class_methods: HashMap::new(),
            undefined_methods: HashSet::new(),
            removed_methods: HashSet::new(),
            context,
            boxed_type: Some(type_name.to_string()),
        });
        self.boxed_classes
            .insert(type_name.to_string(), class_id);
        self.set_local(context, "self", Value::Class(class_id));
        if let Some(s) = spec {
            for m in &s.instance_methods {
                self.add_instance_method(class_id, FunctionRef::Native(m.clone()));
            }
            for m in &s.class_methods {
                self.add_class_method(class_id, FunctionRef::Native(m.clone()));
            }
            if let Some(ctor) = &s.constructor {
                self.add_class_method(class_id, FunctionRef::Native(ctor.clone()));
            }
        }
        if !do_not_export {
            self.set_local(self.global, &class_name, Value::Class(class_id));
        }
        class_id
    }

    fn host_handle(&self, value: &Value) -> Rc<dyn HostObject> {
        match value {
            Value::Host(h) => h.clone(),
            other => Rc::new(ScalarHost(other.clone())),
        }
    }

    /// Box a value into an instance of its boxed class. Boxing the same
    /// host object twice yields the same wrapper; a later box with a new
    /// scope merges that scope into the wrapper's captured scope. The
    /// originating variable binding (if findable) is rewritten to the
    /// wrapper so subsequent references go through the box.
    pub fn box_value(&mut self, value: Value, scope: Option<ScopeId>) -> Result<Value, RuntimeError> {
        if matches!(value, Value::Instance(_)) {
            return Ok(value);
        }
        if let Some(id) = value.identity() {
            if let Some(cached) = self.box_cache.get(&id).cloned() {
                if let (Some(scope), Value::Instance(inst)) = (scope, &cached) {
                    let boxed_scope = inst.borrow().boxed_scope;
                    if let Some(bs) = boxed_scope {
                        self.merge_from(bs, scope);
                    }
                }
                return Ok(cached);
            }
        }
        let wrapper = self.make_box(&value, scope)?;
        if let Some(id) = value.identity() {
            self.box_cache.insert(id, wrapper.clone());
        }
        if let Some(scope) = scope {
            if let Some((holder, name)) = self.search_for_object(scope, &value) {
                self.scope_mut(holder)
                    .vars
                    .insert(name, wrapper.clone());
            }
        }
        Ok(wrapper)
    }

    /// Box without touching the cache or rewriting any binding.
    pub fn box_no_cache(&mut self, value: Value, scope: Option<ScopeId>) -> Result<Value, RuntimeError> {
        if matches!(value, Value::Instance(_)) {
            return Ok(value);
        }
        self.make_box(&value, scope)
    }

    fn make_box(&mut self, value: &Value, scope: Option<ScopeId>) -> Result<Value, RuntimeError> {
        let type_name = value.type_name().to_string();
        // a user class shadowing the host type name wins
        let class = match scope.and_then(|s| self.get_var(s, &type_name)) {
            Some(Value::Class(id)) => id,
            _ => self.boxed_class_for(&type_name),
        };
        let ivars = self.new_scope(None);
        let boxed_scope = match scope {
            Some(s) => s,
            None => self.new_scope(Some(self.global)),
        };
        let handle = self.host_handle(value);
        Ok(Value::Instance(Rc::new(RefCell::new(InstanceData {
            class,
            ivars,
            singleton_methods: HashMap::new(),
            undefined_methods: HashSet::new(),
            removed_methods: HashSet::new(),
            boxed: Some(handle),
            boxed_scope: Some(boxed_scope),
            backing: None,
        }))))
    }

    /// Evict a wrapper from the box cache and return the underlying
    /// value. Non-boxes come back unchanged.
    pub fn unbox(&mut self, value: Value) -> Value {
        let Value::Instance(inst) = &value else {
            return value;
        };
        let boxed = inst.borrow().boxed.clone();
        let Some(host) = boxed else {
            return value;
        };
        let id = Rc::as_ptr(&host) as *const () as usize;
        self.box_cache.remove(&id);
        if let Some(scalar) = host.as_any().downcast_ref::<ScalarHost>() {
            return scalar.0.clone();
        }
        Value::Host(host)
    }

    /// Copy same-named instance variables into the backing host object
    /// before a native call. Mismatched field types are skipped.
    pub(crate) fn sync_fields_to_backing(&mut self, inst: &Rc<RefCell<InstanceData>>) {
        let (backing, ivars) = {
            let b = inst.borrow();
            (b.backing.clone(), b.ivars)
        };
        let Some(backing) = backing else { return };
        for name in backing.field_names() {
            if let Some(value) = self.scope(ivars).vars.get(&name) {
                let _ = backing.set_field(&name, value);
            }
        }
    }

    /// Copy backing fields back into instance variables after a native
    /// call mutated the host object.
    pub(crate) fn sync_fields_from_backing(&mut self, inst: &Rc<RefCell<InstanceData>>) {
        let (backing, ivars) = {
            let b = inst.borrow();
            (b.backing.clone(), b.ivars)
        };
        let Some(backing) = backing else { return };
        for name in backing.field_names() {
            if let Some(value) = backing.get_field(&name) {
                self.set_local(ivars, &name, value);
            }
        }
    }

    /// Find a boxed host type on the class chain and run its constructor.
    /// Used when `new` on a user class with a host parent needs a backing
    /// object.
    pub(crate) fn construct_backing(
        &mut self,
        class_id: ClassId,
        args: &[Value],
    ) -> Result<Option<Rc<dyn HostObject>>, RuntimeError> {
        let mut cur = Some(class_id);
        while let Some(id) = cur {
            if let Some(type_name) = self.class(id).boxed_type.clone() {
                if let Some(spec) = self.host_types.get(&type_name).cloned() {
                    if let Some(ctor) = &spec.constructor {
                        let invoker = ctor.invoker.clone();
                        let result = invoker(self, None, args)?;
                        if let Some(Value::Host(h)) = result {
                            return Ok(Some(h));
                        }
                    }
                }
                return Ok(None);
            }
            cur = self.class_parent(id);
        }
        Ok(None)
    }
}
