use super::*;
use crate::ast::{Node, RescueClause};

impl Interpreter {
    /// Throw a value. Non-instances are boxed first so that class-name
    /// matching works uniformly. The error records the nearest ancestor
    /// class literally named `Exception`, falling back to the builtin
    /// wrapper when the chain has none.
    pub(crate) fn throw_value(&mut self, value: Value, scope: ScopeId) -> Result<Value, RuntimeError> {
        let instance = match value {
            v @ Value::Instance(_) => v,
            other => self.box_value(other, Some(scope))?,
        };
        let Value::Instance(inst) = &instance else {
            return Err(RuntimeError::new("throw produced a non-instance"));
        };
        let class = inst.borrow().class;
        let message = {
            let ivars = inst.borrow().ivars;
            self.scope(ivars)
                .vars
                .get("message")
                .map(|v| v.to_string())
                .unwrap_or_else(|| self.class_name(class).to_string())
        };
        let exception_class = self
            .find_ancestor_named(class, "Exception")
            .or(Some(self.exception_class));
        log::trace!("throwing instance of {}", self.class_name(class));
        Err(RuntimeError::thrown(instance.clone(), exception_class, message))
    }

    /// Pure rescue matching: a clause matches when it is the wildcard or
    /// when any listed name equals the thrown class or one of its
    /// ancestors. Names resolve through the scope first, so a variable
    /// holding a class (or a class-name string) works as a filter.
    pub(crate) fn rescue_clause_matches(
        &self,
        clause: &RescueClause,
        thrown_class: ClassId,
        scope: ScopeId,
    ) -> bool {
        if clause.wildcard {
            return true;
        }
        for name in &clause.class_names {
            let resolved = match self.get_var(scope, name) {
                Some(Value::Str(s)) => s,
                Some(Value::Class(c)) => self.class_name(c).to_string(),
                _ => name.clone(),
            };
            let mut cur = Some(thrown_class);
            while let Some(id) = cur {
                if self.class_name(id) == resolved {
                    return true;
                }
                cur = self.class_parent(id);
            }
        }
        false
    }

    /// `begin`/`rescue`/`else`/`ensure`. Clauses are tried in source
    /// order against the thrown instance's class chain; the first match
    /// wins and binds its variable. `else` runs only when nothing was
    /// thrown. `ensure` always runs, for effect.
    pub(crate) fn eval_begin(
        &mut self,
        body: &[Node],
        rescues: &[RescueClause],
        else_body: Option<&Vec<Node>>,
        ensure: Option<&Vec<Node>>,
        scope: ScopeId,
    ) -> Result<Value, RuntimeError> {
        let outcome = self.run_body(body, scope);
        let result = match outcome {
            Ok(v) => match else_body {
                Some(else_body) => self.run_body(else_body, scope),
                None => Ok(v),
            },
            Err(err) => match err.thrown.clone() {
                Some(thrown) => {
                    let thrown_class = match &thrown.instance {
                        Value::Instance(inst) => inst.borrow().class,
                        _ => self.exception_class,
                    };
                    let mut handled = None;
                    for clause in rescues {
                        if self.rescue_clause_matches(clause, thrown_class, scope) {
                            if let Some(var) = &clause.var_name {
                                self.set_local(scope, var, thrown.instance.clone());
                            }
                            handled = Some(self.run_body(&clause.body, scope));
                            break;
                        }
                    }
                    match handled {
                        Some(r) => r,
                        None => Err(err),
                    }
                }
                None => Err(err),
            },
        };
        if let Some(ensure_body) = ensure {
            self.run_body(ensure_body, scope)?;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    #[test]
    fn wildcard_matches_anything() {
        let mut interp = Interpreter::new();
        let scope = interp.new_scope(None);
        let clause = rescue_any(None, vec![]);
        assert!(interp.rescue_clause_matches(&clause, interp.exception_class, scope));
    }

    #[test]
    fn names_match_class_and_ancestors() {
        let mut interp = Interpreter::new();
        let scope = interp.global;
        interp
            .define_class("IoError", Some("Exception"), &[], scope)
            .unwrap();
        let Some(Value::Class(io_error)) = interp.get_var(scope, "IoError") else {
            panic!("class not bound");
        };
        let direct = rescue(vec!["IoError"], None, vec![]);
        let by_parent = rescue(vec!["Exception"], None, vec![]);
        let miss = rescue(vec!["Unrelated"], None, vec![]);
        assert!(interp.rescue_clause_matches(&direct, io_error, scope));
        assert!(interp.rescue_clause_matches(&by_parent, io_error, scope));
        assert!(!interp.rescue_clause_matches(&miss, io_error, scope));
    }

    #[test]
    fn names_resolve_through_scope() {
        let mut interp = Interpreter::new();
        let scope = interp.global;
        interp.set_local(scope, "err_kind", Value::str("Exception"));
        let clause = rescue(vec!["err_kind"], None, vec![]);
        assert!(interp.rescue_clause_matches(&clause, interp.exception_class, scope));
    }

    #[test]
    fn matcher_does_not_mutate_state() {
        let mut interp = Interpreter::new();
        let scope = interp.new_scope(None);
        let before = interp.scopes.len();
        let clause = rescue(vec!["Nope"], None, vec![]);
        let _ = interp.rescue_clause_matches(&clause, interp.exception_class, scope);
        assert_eq!(interp.scopes.len(), before);
    }
}
