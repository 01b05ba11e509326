use super::*;
use std::collections::{HashMap, HashSet};

/// Index of a scope record in the interpreter's scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) u32);

/// One scope record: named variables, symbol-keyed variables, the names
/// declared constant here, and the alias table. Lookup walks the parent
/// chain through the arena.
#[derive(Debug, Default)]
pub(crate) struct ScopeRec {
    pub vars: HashMap<String, Value>,
    pub sym_vars: HashMap<Symbol, Value>,
    pub constants: HashSet<String>,
    pub aliases: HashMap<String, String>,
    pub parent: Option<ScopeId>,
}

impl Interpreter {
    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeRec {
            parent,
            ..ScopeRec::default()
        });
        id
    }

    pub(crate) fn scope(&self, id: ScopeId) -> &ScopeRec {
        &self.scopes[id.0 as usize]
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> &mut ScopeRec {
        &mut self.scopes[id.0 as usize]
    }

    pub fn scope_parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scope(id).parent
    }

    /// Resolve a name: alias indirection first (resolved from the scope
    /// that holds the alias), then local variables, then the parent chain.
    pub fn get_var(&self, scope: ScopeId, name: &str) -> Option<Value> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let rec = self.scope(id);
            if let Some(target) = rec.aliases.get(name) {
                let target = target.clone();
                return self.get_var(id, &target);
            }
            if let Some(v) = rec.vars.get(name) {
                return Some(v.clone());
            }
            cur = rec.parent;
        }
        None
    }

    /// True when `name` resolves anywhere on the chain.
    pub fn has_var(&self, scope: ScopeId, name: &str) -> bool {
        self.get_var(scope, name).is_some()
    }

    /// Bind in this exact scope, shadowing any outer binding. Used for
    /// parameters, `self`/`super` and definitions.
    pub fn set_local(&mut self, scope: ScopeId, name: &str, value: Value) {
        self.scope_mut(scope).vars.insert(name.to_string(), value);
    }

    /// User-level assignment: rebinds the name at the scope where it is
    /// found, otherwise creates it locally. Errors on constants.
    pub fn set_var(&mut self, scope: ScopeId, name: &str, value: Value) -> Result<(), RuntimeError> {
        self.check_constant(scope, name)?;
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let rec = self.scope(id);
            if let Some(target) = rec.aliases.get(name) {
                let target = target.clone();
                return self.set_var(id, &target, value);
            }
            if rec.vars.contains_key(name) {
                self.scope_mut(id).vars.insert(name.to_string(), value);
                return Ok(());
            }
            cur = rec.parent;
        }
        self.set_local(scope, name, value);
        Ok(())
    }

    pub(crate) fn check_constant(&self, scope: ScopeId, name: &str) -> Result<(), RuntimeError> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let rec = self.scope(id);
            if rec.constants.contains(name) {
                return Err(RuntimeError::with_kind(
                    format!("cannot reassign constant '{name}'"),
                    ErrorKind::ConstantViolation,
                ));
            }
            cur = rec.parent;
        }
        Ok(())
    }

    pub fn declare_constant(&mut self, scope: ScopeId, name: &str, value: Value) {
        self.set_local(scope, name, value);
        self.scope_mut(scope).constants.insert(name.to_string());
    }

    /// Install `new_name` as an alias of `old_name`. No-op when the target
    /// is already aliased or constant, the source is itself an alias or
    /// unresolvable, or the target already names a local variable. The new
    /// alias is also marked constant.
    pub fn add_alias(&mut self, scope: ScopeId, new_name: &str, old_name: &str) {
        let rec = self.scope(scope);
        if rec.aliases.contains_key(new_name)
            || rec.constants.contains(new_name)
            || rec.aliases.contains_key(old_name)
            || rec.vars.contains_key(new_name)
        {
            return;
        }
        if !self.has_var(scope, old_name) {
            return;
        }
        let rec = self.scope_mut(scope);
        rec.aliases
            .insert(new_name.to_string(), old_name.to_string());
        rec.constants.insert(new_name.to_string());
    }

    /// Symbol-keyed lookup: walk the symbol maps up the chain, then fall
    /// back to a name lookup for the symbol's text starting at the
    /// original scope.
    pub fn get_sym_var(&self, scope: ScopeId, sym: Symbol) -> Option<Value> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let rec = self.scope(id);
            if let Some(v) = rec.sym_vars.get(&sym) {
                return Some(v.clone());
            }
            cur = rec.parent;
        }
        let name = self.interner.resolve(sym).to_string();
        self.get_var(scope, &name)
    }

    pub fn set_sym_var(&mut self, scope: ScopeId, sym: Symbol, value: Value) {
        self.scope_mut(scope).sym_vars.insert(sym, value);
    }

    /// Left-biased shallow merge: copy `src` bindings into `dst` unless
    /// `dst` already has them locally. Constant markers travel with the
    /// bindings so assignments through the merged scope stay guarded.
    pub fn merge_from(&mut self, dst: ScopeId, src: ScopeId) {
        let (vars, sym_vars, constants): (Vec<_>, Vec<_>, Vec<_>) = {
            let rec = self.scope(src);
            (
                rec.vars
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                rec.sym_vars.iter().map(|(k, v)| (*k, v.clone())).collect(),
                rec.constants.iter().cloned().collect(),
            )
        };
        for (k, v) in vars {
            if !self.scope(dst).vars.contains_key(&k) {
                self.set_local(dst, &k, v);
            }
        }
        for (k, v) in sym_vars {
            if !self.scope(dst).sym_vars.contains_key(&k) {
                self.set_sym_var(dst, k, v);
            }
        }
        for k in constants {
            self.scope_mut(dst).constants.insert(k);
        }
    }

    /// Build the execution scope for a call: a fresh scope parented at
    /// `call`'s parent holding `context` bindings overridden by `call`'s.
    pub(crate) fn merge_scopes(&mut self, context: ScopeId, call: ScopeId) -> ScopeId {
        let parent = self.scope(call).parent;
        let merged = self.new_scope(parent);
        self.merge_from(merged, call);
        self.merge_from(merged, context);
        merged
    }

    /// Reverse search: find a binding holding exactly this value (by
    /// reference identity), skipping `self`/`super`. Used to rewrite the
    /// originating variable when a host object is boxed.
    pub fn search_for_object(&self, scope: ScopeId, value: &Value) -> Option<(ScopeId, String)> {
        let id = value.identity()?;
        let mut cur = Some(scope);
        while let Some(sid) = cur {
            let rec = self.scope(sid);
            for (name, bound) in &rec.vars {
                if name == "self" || name == "super" {
                    continue;
                }
                if bound.identity() == Some(id) {
                    return Some((sid, name.clone()));
                }
            }
            cur = rec.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_rebinds_where_found() {
        let mut interp = Interpreter::new();
        let outer = interp.new_scope(None);
        let inner = interp.new_scope(Some(outer));
        interp.set_local(outer, "x", Value::Int(1));
        interp.set_var(inner, "x", Value::Int(2)).unwrap();
        assert_eq!(interp.scope(outer).vars.get("x"), Some(&Value::Int(2)));
        assert!(!interp.scope(inner).vars.contains_key("x"));
    }

    #[test]
    fn constants_reject_reassignment_through_children() {
        let mut interp = Interpreter::new();
        let outer = interp.new_scope(None);
        let inner = interp.new_scope(Some(outer));
        interp.declare_constant(outer, "PI", Value::Num(3.14));
        let err = interp.set_var(inner, "PI", Value::Int(3)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConstantViolation);
    }

    #[test]
    fn alias_resolves_from_holding_scope() {
        let mut interp = Interpreter::new();
        let outer = interp.new_scope(None);
        let inner = interp.new_scope(Some(outer));
        interp.set_local(outer, "x", Value::Int(7));
        interp.add_alias(outer, "y", "x");
        assert_eq!(interp.get_var(inner, "y"), Some(Value::Int(7)));
        // aliases are constants
        assert!(interp.set_var(inner, "y", Value::Int(8)).is_err());
    }

    #[test]
    fn alias_guards() {
        let mut interp = Interpreter::new();
        let s = interp.new_scope(None);
        // unresolvable source
        interp.add_alias(s, "y", "nope");
        assert!(interp.scope(s).aliases.is_empty());
        // target already a local
        interp.set_local(s, "x", Value::Int(1));
        interp.set_local(s, "y", Value::Int(2));
        interp.add_alias(s, "y", "x");
        assert!(interp.scope(s).aliases.is_empty());
    }

    #[test]
    fn symbol_lookup_falls_back_to_name() {
        let mut interp = Interpreter::new();
        let s = interp.new_scope(None);
        interp.set_local(s, "count", Value::Int(3));
        let sym = interp.interner.intern("count");
        assert_eq!(interp.get_sym_var(s, sym), Some(Value::Int(3)));
        interp.set_sym_var(s, sym, Value::Int(9));
        assert_eq!(interp.get_sym_var(s, sym), Some(Value::Int(9)));
        // name binding untouched
        assert_eq!(interp.get_var(s, "count"), Some(Value::Int(3)));
    }

    #[test]
    fn search_for_object_skips_self() {
        let mut interp = Interpreter::new();
        let s = interp.new_scope(None);
        let arr = Value::array(vec![Value::Int(1)]);
        interp.set_local(s, "self", arr.clone());
        interp.set_local(s, "xs", arr.clone());
        let (found_scope, name) = interp.search_for_object(s, &arr).unwrap();
        assert_eq!(found_scope, s);
        assert_eq!(name, "xs");
    }
}
