use super::*;
use crate::ast::{Node, Pipe};
use std::rc::Rc;

fn node_has_yield(node: &Node) -> bool {
    match node {
        Node::Yield(_) => true,
        Node::Block(body) | Node::While { body, .. } => body.iter().any(node_has_yield),
        Node::If { cond, then, els } => {
            node_has_yield(cond)
                || then.iter().any(node_has_yield)
                || els.as_ref().is_some_and(|e| e.iter().any(node_has_yield))
        }
        Node::Assign { target, value } => node_has_yield(target) || node_has_yield(value),
        Node::OpAssign { target, value, .. } => node_has_yield(target) || node_has_yield(value),
        Node::Binary { lhs, rhs, .. } => node_has_yield(lhs) || node_has_yield(rhs),
        Node::Unary { expr, .. } => node_has_yield(expr),
        Node::Index { target, index } => node_has_yield(target) || node_has_yield(index),
        Node::Member { target, .. } => node_has_yield(target),
        Node::Call { callee, args, .. } => {
            node_has_yield(callee) || args.iter().any(|a| node_has_yield(&a.value))
        }
        Node::MethodCall { target, args, .. } => {
            node_has_yield(target) || args.iter().any(|a| node_has_yield(&a.value))
        }
        Node::Return(v) => v.as_deref().is_some_and(node_has_yield),
        Node::Begin { body, .. } => body.iter().any(node_has_yield),
        _ => false,
    }
}

fn body_has_yield(body: &[Node]) -> bool {
    body.iter().any(node_has_yield)
}

impl Interpreter {
    /// Invoke a native function: argument values padded with nil up to
    /// the declared parameter count, backing fields synced around the
    /// call when the receiver is a backed instance.
    pub(crate) fn invoke_native(
        &mut self,
        func: &Rc<NativeFunction>,
        receiver: Option<&Value>,
        args: &[CallArg],
    ) -> Result<Option<Value>, RuntimeError> {
        let mut values: Vec<Value> = args.iter().map(|a| a.value.clone()).collect();
        while values.len() < func.params.len() {
            values.push(Value::Nil);
        }
        if let Some(Value::Instance(inst)) = receiver {
            self.sync_fields_to_backing(inst);
        }
        let invoker = func.invoker.clone();
        let result = invoker(self, receiver, &values);
        if let Some(Value::Instance(inst)) = receiver {
            self.sync_fields_from_backing(inst);
        }
        result
    }

    /// Bind arguments to parameters and run the body. This is the single
    /// entry point for every call form; partial completion re-enters it
    /// with the frozen arguments combined in.
    ///
    /// `scope` is the prepared call scope: for member calls a child of
    /// the caller with the class context merged in, for direct calls the
    /// caller scope itself.
    pub(crate) fn bind_and_invoke(
        &mut self,
        callable: &Callable,
        args: &[CallArg],
        scope: ScopeId,
        recv: ReceiverCtx,
        pipe: Pipe,
    ) -> Result<Option<Value>, RuntimeError> {
        match callable {
            Callable::Partial(partial) => {
                let mut combined: Vec<CallArg> = args.to_vec();
                for frozen in &partial.frozen_args {
                    if pipe == Pipe::Backward {
                        combined.insert(0, frozen.clone());
                    } else {
                        combined.push(frozen.clone());
                    }
                }
                let merged = self.merge_scopes(partial.scope, scope);
                self.bind_and_invoke(
                    &Callable::Direct(partial.wrapped.clone()),
                    &combined,
                    merged,
                    recv,
                    Pipe::None,
                )
            }
            Callable::Direct(FunctionRef::Native(func)) => {
                let receiver = match &recv {
                    ReceiverCtx::None => None,
                    ReceiverCtx::Instance { instance, .. } => Some(instance.clone()),
                    ReceiverCtx::Class { class, .. } => Some(Value::Class(*class)),
                };
                self.invoke_native(func, receiver.as_ref(), args)
            }
            Callable::Direct(FunctionRef::User(func)) => {
                self.bind_user_function(func, args, scope, recv)
            }
        }
    }

    fn bind_user_function(
        &mut self,
        func: &Rc<UserFunction>,
        args: &[CallArg],
        scope: ScopeId,
        recv: ReceiverCtx,
    ) -> Result<Option<Value>, RuntimeError> {
        let is_member = !matches!(recv, ReceiverCtx::None);
        let mc = args.len();
        let mut fc = func.params.len() as i64;

        // defaulted and vararg parameters lower the required count for
        // the currying check
        for param in &func.params {
            if param.default.is_some() {
                fc -= 1;
            }
            if param.is_vararg {
                if is_member {
                    fc = 0;
                } else {
                    fc -= 1;
                }
            }
        }
        let all_positional = args.iter().all(|a| a.name.is_none());

        if all_positional && (mc as i64) < fc {
            return self.curry(func, args, scope, &recv);
        }

        let has_yield = body_has_yield(&func.body);
        let last_is_func = func.params.last().map(|p| p.is_function).unwrap_or(false);
        let xscope = self.merge_scopes(func.context, scope);

        // pre-bind defaults and the (empty) vararg collector into the
        // execution scope; explicit arguments overwrite them below
        for param in &func.params {
            if let Some(default) = param.default.clone() {
                let value = self.eval(&default, xscope)?;
                self.set_local(xscope, &param.name, value);
            }
            if param.is_vararg {
                self.set_local(xscope, &param.name, Value::array(Vec::new()));
            }
        }

        let mut var_args: Vec<Value> = Vec::new();
        let mut offset: i64 = 0;
        let mut arg_names: Vec<String> = func.params.iter().map(|p| p.name.clone()).collect();
        arg_names.push(YIELD_BLOCK.to_string());

        'walk: for ix in 0..args.len() {
            let my = &args[ix];
            let mut xparam: Option<usize> = None;
            let mut yield_slot = false;

            if let Some(name) = &my.name {
                xparam = func.param_index(name);
                if name == YIELD_BLOCK {
                    if last_is_func {
                        xparam = Some(func.params.len() - 1);
                    } else {
                        xparam = None;
                        yield_slot = true;
                    }
                }
            } else if ix + 1 == args.len() && (last_is_func || has_yield) {
                if last_is_func {
                    xparam = Some(func.params.len() - 1);
                } else {
                    yield_slot = true;
                }
            }

            if yield_slot {
                self.set_local(xscope, YIELD_BLOCK, my.value.clone());
                continue;
            }
            if xparam.is_none() {
                let pos = ix as i64 + offset;
                if pos >= 0 && (pos as usize) < func.params.len() {
                    xparam = Some(pos as usize);
                }
            }
            let Some(pi) = xparam else {
                break;
            };
            let param = func.params[pi].clone();
            if my.name.is_some() {
                offset = pi as i64 - ix as i64;
            }

            if param.is_vararg {
                // greedy absorb of the remaining arguments; a trailing
                // block argument still goes to its slot
                for jx in ix..args.len() {
                    let narg = &args[jx];
                    let routed = narg.name.as_deref() == Some(YIELD_BLOCK)
                        || (jx + 1 == args.len() && (last_is_func || has_yield));
                    if routed {
                        let slot = if last_is_func {
                            func.params.last().map(|p| p.name.clone()).unwrap_or_default()
                        } else {
                            YIELD_BLOCK.to_string()
                        };
                        self.set_local(xscope, &slot, narg.value.clone());
                    } else {
                        var_args.push(narg.value.clone());
                    }
                }
                self.set_local(xscope, &param.name, Value::array(var_args));
                break 'walk;
            } else if param.is_literal {
                // literal parameters capture the supplied *name*
                let literal = match my.node.as_deref() {
                    Some(Node::Var(n)) => Value::str(n.clone()),
                    Some(Node::Sym(s)) => Value::str(s.clone()),
                    _ => return Ok(None),
                };
                self.set_local(xscope, &param.name, literal);
            } else {
                self.set_local(xscope, &param.name, my.value.clone());
            }
        }

        self.bind_receiver(xscope, &recv);

        let body = func.body.clone();
        let mut result = Value::Nil;
        for node in body.iter() {
            match self.eval(node, xscope) {
                Ok(v) => result = v,
                Err(e) if e.is_return() => {
                    result = e.return_value.unwrap_or(Value::Nil);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        self.write_back(xscope, scope, &arg_names)?;
        Ok(Some(result))
    }

    fn curry(
        &mut self,
        func: &Rc<UserFunction>,
        args: &[CallArg],
        scope: ScopeId,
        recv: &ReceiverCtx,
    ) -> Result<Option<Value>, RuntimeError> {
        log::trace!(
            "currying {}: {} of {} arguments supplied",
            func.name,
            args.len(),
            func.params.len()
        );
        self.bind_receiver(scope, recv);
        Ok(Some(Value::Partial(Rc::new(PartialFunction {
            name: func.name.clone(),
            wrapped: FunctionRef::User(func.clone()),
            frozen_args: args.to_vec(),
            scope,
        }))))
    }

    fn bind_receiver(&mut self, scope: ScopeId, recv: &ReceiverCtx) {
        match recv {
            ReceiverCtx::None => {}
            ReceiverCtx::Instance {
                instance,
                dispatch_class,
            } => {
                self.set_local(scope, "self", instance.clone());
                self.set_local(scope, "super", instance.clone());
                self.set_local(scope, DISPATCH_CLASS, Value::Class(*dispatch_class));
            }
            ReceiverCtx::Class {
                class,
                is_super,
                fresh_instance,
            } => {
                if let Some(fresh) = fresh_instance {
                    self.set_local(scope, "self", fresh.clone());
                    self.set_local(scope, "super", fresh.clone());
                    self.set_local(scope, DISPATCH_CLASS, Value::Class(*class));
                } else {
                    let target = if *is_super {
                        self.class_parent(*class).unwrap_or(*class)
                    } else {
                        *class
                    };
                    self.set_local(scope, "self", Value::Class(target));
                    self.set_local(scope, "super", Value::Class(target));
                }
            }
        }
    }

    /// Selective merge-back: variables of the execution scope that are
    /// visible from the call scope and are not parameter bindings are
    /// copied back, so mutations through captured contexts remain
    /// observable after the call. Constants are skipped; their values
    /// cannot have changed, since assignment already failed inside the
    /// execution scope.
    fn write_back(
        &mut self,
        xscope: ScopeId,
        scope: ScopeId,
        arg_names: &[String],
    ) -> Result<(), RuntimeError> {
        let vars: Vec<(String, Value)> = self
            .scope(xscope)
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, value) in vars {
            if name == "self" || name == "super" || name.starts_with('<') {
                continue;
            }
            if arg_names.iter().any(|a| a == &name) {
                continue;
            }
            if self.check_constant(scope, &name).is_err() {
                continue;
            }
            if self.has_var(scope, &name) {
                self.set_var(scope, &name, value)?;
            }
        }
        let sym_vars: Vec<(Symbol, Value)> = self
            .scope(xscope)
            .sym_vars
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for (sym, value) in sym_vars {
            let mut cur = Some(scope);
            while let Some(id) = cur {
                if self.scope(id).sym_vars.contains_key(&sym) {
                    self.set_sym_var(id, sym, value);
                    break;
                }
                cur = self.scope(id).parent;
            }
        }
        Ok(())
    }
}
