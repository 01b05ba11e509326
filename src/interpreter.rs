//! The tree-walking evaluator: `eval(node, scope)`. The dispatch engine
//! re-enters it to run function bodies, default-value expressions and
//! argument expressions. Scopes are passed explicitly on every call.

use crate::ast::{Arg, Node, Pipe};
use crate::error::{ErrorKind, RuntimeError};
use crate::runtime::{
    CallArg, Callable, ClassId, FunctionRef, Interpreter, ReceiverCtx, ScopeId, UserFunction,
    DISPATCH_CLASS, YIELD_BLOCK,
};
use crate::value::{DictKey, Value};
use std::rc::Rc;

impl Interpreter {
    pub(crate) fn eval_args(
        &mut self,
        args: &[Arg],
        scope: ScopeId,
    ) -> Result<Vec<CallArg>, RuntimeError> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.eval(&arg.value, scope)?;
            out.push(CallArg {
                name: arg.name.clone(),
                value,
                node: Some(Rc::new(arg.value.clone())),
            });
        }
        Ok(out)
    }

    fn assign_to(
        &mut self,
        target: &Node,
        value: Value,
        scope: ScopeId,
    ) -> Result<Value, RuntimeError> {
        match target {
            Node::Var(name) => {
                self.set_var(scope, name, value.clone())?;
                Ok(value)
            }
            Node::SymVar(name) => {
                let sym = self.interner.intern(name);
                self.set_sym_var(scope, sym, value.clone());
                Ok(value)
            }
            Node::Index { target, index } => {
                let container = self.eval(target, scope)?;
                let idx = self.eval(index, scope)?;
                self.index_set(&container, &idx, value, scope)
            }
            Node::Member { target, name } => {
                let receiver = self.eval(target, scope)?;
                self.set_member(&receiver, name, value, scope)
            }
            other => Err(RuntimeError::new(format!(
                "invalid assignment target: {other:?}"
            ))),
        }
    }

    pub fn eval(&mut self, node: &Node, scope: ScopeId) -> Result<Value, RuntimeError> {
        match node {
            Node::Int(v) => Ok(Value::Int(*v)),
            Node::Num(v) => Ok(Value::Num(*v)),
            Node::Str(v) => Ok(Value::str(v.clone())),
            Node::Bool(v) => Ok(Value::Bool(*v)),
            Node::Nil => Ok(Value::Nil),
            Node::Sym(name) => Ok(Value::Sym(self.interner.intern(name))),
            Node::SymVar(name) => {
                let sym = self.interner.intern(name);
                Ok(self.get_sym_var(scope, sym).unwrap_or(Value::Nil))
            }
            Node::ArrayLit(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item, scope)?);
                }
                Ok(Value::array(out))
            }
            Node::DictLit(pairs) => {
                let mut out = Vec::with_capacity(pairs.len());
                for (key_node, value_node) in pairs {
                    let key = match key_node {
                        Node::Sym(s) => DictKey::Sym(self.interner.intern(s)),
                        other => self.eval(other, scope)?.dict_key(),
                    };
                    let value = self.eval(value_node, scope)?;
                    out.push((key, value));
                }
                Ok(Value::dict(out))
            }
            Node::Var(name) => Ok(self.get_var(scope, name).unwrap_or(Value::Nil)),
            Node::Assign { target, value } => {
                let value = self.eval(value, scope)?;
                self.assign_to(target, value, scope)
            }
            Node::OpAssign { target, op, value } => {
                let current = self.eval(target, scope)?;
                let rhs = self.eval(value, scope)?;
                let combined = self.eval_binary_op(op, &current, &rhs, scope)?;
                self.assign_to(target, combined, scope)
            }
            Node::Constant { name, value } => {
                self.check_constant(scope, name)?;
                let value = self.eval(value, scope)?;
                self.declare_constant(scope, name, value.clone());
                Ok(value)
            }
            Node::Alias { new_name, old_name } => {
                self.add_alias(scope, new_name, old_name);
                Ok(Value::Nil)
            }
            Node::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, scope)?;
                let rhs = self.eval(rhs, scope)?;
                self.eval_binary_op(op, &lhs, &rhs, scope)
            }
            Node::Unary { op, expr } => {
                let value = self.eval(expr, scope)?;
                self.eval_unary_op(op, &value, scope)
            }
            Node::Incr { target, prefix } => {
                let old = self.eval(target, scope)?;
                let new = self.eval_binary_op("+", &old, &Value::Int(1), scope)?;
                self.assign_to(target, new.clone(), scope)?;
                Ok(if *prefix { new } else { old })
            }
            Node::Decr { target, prefix } => {
                let old = self.eval(target, scope)?;
                let new = self.eval_binary_op("-", &old, &Value::Int(1), scope)?;
                self.assign_to(target, new.clone(), scope)?;
                Ok(if *prefix { new } else { old })
            }
            Node::Index { target, index } => {
                let container = self.eval(target, scope)?;
                let idx = self.eval(index, scope)?;
                self.index_get(&container, &idx, scope)
            }
            Node::Member { target, name } => {
                let receiver = self.eval(target, scope)?;
                self.get_member(&receiver, name, scope)
            }
            Node::Call { callee, args, pipe } => {
                let target = self.eval(callee, scope)?;
                let call_args = self.eval_args(args, scope)?;
                if let Some(callable) = Callable::from_value(&target) {
                    let result = self.bind_and_invoke(
                        &callable,
                        &call_args,
                        scope,
                        ReceiverCtx::None,
                        *pipe,
                    )?;
                    return Ok(result.unwrap_or(Value::Nil));
                }
                match target {
                    Value::Class(_) => {
                        let result = self.invoke_member(
                            &target,
                            "new",
                            &call_args,
                            scope,
                            false,
                            None,
                            *pipe,
                        )?;
                        Ok(result.unwrap_or(Value::Nil))
                    }
                    other => Err(RuntimeError::with_kind(
                        format!("'{}' is not callable: {other:?}", describe_callee(callee)),
                        ErrorKind::NoMethod,
                    )),
                }
            }
            Node::MethodCall {
                target,
                name,
                args,
                pipe,
            } => {
                let is_super = matches!(target.as_ref(), Node::Var(n) if n == "super");
                let (receiver, start_class) = if is_super {
                    let receiver = self.get_var(scope, "self").ok_or_else(|| {
                        RuntimeError::with_kind("super outside of method", ErrorKind::NoMethod)
                    })?;
                    let start: Option<ClassId> = match self.get_var(scope, DISPATCH_CLASS) {
                        Some(Value::Class(c)) => Some(c),
                        _ => None,
                    };
                    (receiver, start)
                } else {
                    (self.eval(target, scope)?, None)
                };
                let call_args = self.eval_args(args, scope)?;
                let result = self.invoke_member(
                    &receiver,
                    name,
                    &call_args,
                    scope,
                    is_super,
                    start_class,
                    *pipe,
                )?;
                Ok(result.unwrap_or(Value::Nil))
            }
            Node::Yield(args) => {
                let block = self.get_var(scope, YIELD_BLOCK).ok_or_else(|| {
                    RuntimeError::with_kind("yield with no block given", ErrorKind::NoMethod)
                })?;
                let callable = Callable::from_value(&block).ok_or_else(|| {
                    RuntimeError::with_kind("yield target is not callable", ErrorKind::NoMethod)
                })?;
                let call_args = self.eval_args(args, scope)?;
                let result = self.bind_and_invoke(
                    &callable,
                    &call_args,
                    scope,
                    ReceiverCtx::None,
                    Pipe::None,
                )?;
                Ok(result.unwrap_or(Value::Nil))
            }
            Node::Block(body) => {
                let child = self.new_scope(Some(scope));
                self.run_body(body, child)
            }
            Node::If { cond, then, els } => {
                if self.eval(cond, scope)?.truthy() {
                    self.run_body(then, scope)
                } else if let Some(els) = els {
                    self.run_body(els, scope)
                } else {
                    Ok(Value::Nil)
                }
            }
            Node::While { cond, body } => {
                while self.eval(cond, scope)?.truthy() {
                    self.run_body(body, scope)?;
                }
                Ok(Value::Nil)
            }
            Node::Return(value) => {
                let value = match value {
                    Some(v) => self.eval(v, scope)?,
                    None => Value::Nil,
                };
                Err(RuntimeError::returning(value))
            }
            Node::Def { name, params, body } => {
                let func = Value::Function(Rc::new(UserFunction {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::new(body.clone()),
                    context: scope,
                    is_singleton: false,
                }));
                self.set_local(scope, name, func.clone());
                Ok(func)
            }
            Node::Lambda { params, body } => Ok(Value::Function(Rc::new(UserFunction {
                name: "<lambda>".to_string(),
                params: params.clone(),
                body: Rc::new(body.clone()),
                context: scope,
                is_singleton: false,
            }))),
            Node::SingletonDef {
                target,
                name,
                params,
                body,
            } => {
                let receiver = self.eval(target, scope)?;
                match receiver {
                    Value::Class(cid) => {
                        let singleton = self.class_define_stack.last() == Some(&cid);
                        let func = Rc::new(UserFunction {
                            name: name.clone(),
                            params: params.clone(),
                            body: Rc::new(body.clone()),
                            context: scope,
                            is_singleton: singleton,
                        });
                        if singleton {
                            // collected by the surrounding class body
                            Ok(Value::Function(func))
                        } else {
                            self.add_instance_method(cid, FunctionRef::User(func));
                            Ok(Value::Nil)
                        }
                    }
                    Value::Instance(inst) => {
                        let func = Value::Function(Rc::new(UserFunction {
                            name: name.clone(),
                            params: params.clone(),
                            body: Rc::new(body.clone()),
                            context: scope,
                            is_singleton: false,
                        }));
                        let mut data = inst.borrow_mut();
                        data.undefined_methods.remove(name);
                        data.removed_methods.remove(name);
                        data.singleton_methods.insert(name.clone(), func);
                        Ok(Value::Nil)
                    }
                    _ => Ok(Value::Nil),
                }
            }
            Node::ClassDef { name, parent, body } => {
                self.define_class(name, parent.as_deref(), body, scope)
            }
            Node::ClassOpen { target, body } => {
                let receiver = self.eval(target, scope)?;
                self.define_class_open(&receiver, body, scope)
            }
            Node::ModuleDef { name, body } => self.define_module(name, body, scope),
            // outside a class body, include has nothing to attach to
            Node::Include(_) => Ok(Value::Nil),
            Node::MethodChange { names, remove } => {
                if let Some(&current) = self.class_define_stack.last() {
                    self.method_change(current, names, *remove);
                }
                Ok(Value::Nil)
            }
            Node::ObjectMethodChange {
                target,
                names,
                remove,
            } => {
                let receiver = self.eval(target, scope)?;
                self.object_method_change(&receiver, names, *remove, scope)?;
                Ok(Value::Nil)
            }
            Node::Begin {
                body,
                rescues,
                else_body,
                ensure,
            } => self.eval_begin(body, rescues, else_body.as_ref(), ensure.as_ref(), scope),
            Node::Throw(value) => {
                let value = self.eval(value, scope)?;
                self.throw_value(value, scope)
            }
            Node::Sync { var, body } => self.eval_sync(var, body, scope),
        }
    }

    /// Exclusive, non-reentrant lock on the value bound to `var` for the
    /// duration of the body. Evaluation is single-threaded, so re-entry
    /// can never unblock and is surfaced as a hard error.
    fn eval_sync(&mut self, var: &str, body: &[Node], scope: ScopeId) -> Result<Value, RuntimeError> {
        let value = self.get_var(scope, var).unwrap_or(Value::Nil);
        let key = value.identity();
        let held = match key {
            Some(id) => !self.held_locks.insert(id),
            None => !self.held_name_locks.insert(var.to_string()),
        };
        if held {
            return Err(RuntimeError::with_kind(
                format!("sync re-entry on '{var}' would deadlock"),
                ErrorKind::Deadlock,
            ));
        }
        let result = self.run_body(body, scope);
        match key {
            Some(id) => {
                self.held_locks.remove(&id);
            }
            None => {
                self.held_name_locks.remove(var);
            }
        }
        result
    }
}

fn describe_callee(node: &Node) -> String {
    match node {
        Node::Var(name) => name.clone(),
        other => format!("{other:?}"),
    }
}
