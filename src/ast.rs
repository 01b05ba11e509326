//! Expression-node tree consumed by the evaluator. Producing these trees
//! (lexing/parsing) is out of scope; embedders and tests construct them
//! directly, usually through the [`build`] helpers.

/// Pipe flavour attached to a call site. A backward pipe changes the order
/// in which a partial function's frozen arguments are combined with the
/// completing arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pipe {
    #[default]
    None,
    Forward,
    Backward,
}

/// Formal parameter of a user function.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Node>,
    pub is_vararg: bool,
    /// Declared as a function slot; a trailing function argument or a
    /// `__yieldBlock` argument is routed here.
    pub is_function: bool,
    /// Literal parameter: binds the *name* of the variable or symbol node
    /// supplied at the call site rather than its value.
    pub is_literal: bool,
}

impl Param {
    pub fn required(name: &str) -> Self {
        Param {
            name: name.to_string(),
            default: None,
            is_vararg: false,
            is_function: false,
            is_literal: false,
        }
    }

    pub fn with_default(name: &str, default: Node) -> Self {
        Param {
            default: Some(default),
            ..Param::required(name)
        }
    }

    pub fn vararg(name: &str) -> Self {
        Param {
            is_vararg: true,
            ..Param::required(name)
        }
    }

    pub fn function(name: &str) -> Self {
        Param {
            is_function: true,
            ..Param::required(name)
        }
    }

    pub fn literal(name: &str) -> Self {
        Param {
            is_literal: true,
            ..Param::required(name)
        }
    }
}

/// Actual argument at a call site, optionally named.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Node,
}

/// One `rescue` clause of a `begin` expression. An empty `class_names`
/// list with `wildcard` set matches any thrown exception.
#[derive(Debug, Clone, PartialEq)]
pub struct RescueClause {
    pub class_names: Vec<String>,
    pub wildcard: bool,
    pub var_name: Option<String>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Int(i64),
    Num(f64),
    Str(String),
    Bool(bool),
    Nil,
    /// Symbol literal, e.g. `:name`.
    Sym(String),
    /// Symbol-keyed scope variable reference.
    SymVar(String),
    ArrayLit(Vec<Node>),
    DictLit(Vec<(Node, Node)>),
    Var(String),
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    /// Compound assignment, e.g. `a[1] += 2`.
    OpAssign {
        target: Box<Node>,
        op: String,
        value: Box<Node>,
    },
    /// Constant definition: binds locally and marks the name immutable.
    Constant {
        name: String,
        value: Box<Node>,
    },
    Alias {
        new_name: String,
        old_name: String,
    },
    Binary {
        op: String,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Unary {
        op: String,
        expr: Box<Node>,
    },
    Incr {
        target: Box<Node>,
        prefix: bool,
    },
    Decr {
        target: Box<Node>,
        prefix: bool,
    },
    Index {
        target: Box<Node>,
        index: Box<Node>,
    },
    Member {
        target: Box<Node>,
        name: String,
    },
    Call {
        callee: Box<Node>,
        args: Vec<Arg>,
        pipe: Pipe,
    },
    MethodCall {
        target: Box<Node>,
        name: String,
        args: Vec<Arg>,
        pipe: Pipe,
    },
    Yield(Vec<Arg>),
    Block(Vec<Node>),
    If {
        cond: Box<Node>,
        then: Vec<Node>,
        els: Option<Vec<Node>>,
    },
    While {
        cond: Box<Node>,
        body: Vec<Node>,
    },
    Return(Option<Box<Node>>),
    Def {
        name: String,
        params: Vec<Param>,
        body: Vec<Node>,
    },
    Lambda {
        params: Vec<Param>,
        body: Vec<Node>,
    },
    SingletonDef {
        target: Box<Node>,
        name: String,
        params: Vec<Param>,
        body: Vec<Node>,
    },
    ClassDef {
        name: String,
        parent: Option<String>,
        body: Vec<Node>,
    },
    /// Reopen a class through an arbitrary receiver expression.
    ClassOpen {
        target: Box<Node>,
        body: Vec<Node>,
    },
    ModuleDef {
        name: String,
        body: Vec<Node>,
    },
    Include(Vec<String>),
    /// `undef`/`remove` inside a class body, targeting the class being
    /// defined.
    MethodChange {
        names: Vec<String>,
        remove: bool,
    },
    /// `undef`/`remove` against an arbitrary receiver (instance-level).
    ObjectMethodChange {
        target: Box<Node>,
        names: Vec<String>,
        remove: bool,
    },
    Begin {
        body: Vec<Node>,
        rescues: Vec<RescueClause>,
        else_body: Option<Vec<Node>>,
        ensure: Option<Vec<Node>>,
    },
    Throw(Box<Node>),
    Sync {
        var: String,
        body: Vec<Node>,
    },
}

/// Terse constructors for building trees by hand.
pub mod build {
    use super::*;

    pub fn int(v: i64) -> Node {
        Node::Int(v)
    }
    pub fn num(v: f64) -> Node {
        Node::Num(v)
    }
    pub fn str_(v: &str) -> Node {
        Node::Str(v.to_string())
    }
    pub fn bool_(v: bool) -> Node {
        Node::Bool(v)
    }
    pub fn nil() -> Node {
        Node::Nil
    }
    pub fn sym(name: &str) -> Node {
        Node::Sym(name.to_string())
    }
    pub fn var(name: &str) -> Node {
        Node::Var(name.to_string())
    }
    pub fn array(items: Vec<Node>) -> Node {
        Node::ArrayLit(items)
    }
    pub fn dict(pairs: Vec<(Node, Node)>) -> Node {
        Node::DictLit(pairs)
    }

    pub fn assign(target: Node, value: Node) -> Node {
        Node::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }
    pub fn op_assign(target: Node, op: &str, value: Node) -> Node {
        Node::OpAssign {
            target: Box::new(target),
            op: op.to_string(),
            value: Box::new(value),
        }
    }
    pub fn constant(name: &str, value: Node) -> Node {
        Node::Constant {
            name: name.to_string(),
            value: Box::new(value),
        }
    }
    pub fn alias(new_name: &str, old_name: &str) -> Node {
        Node::Alias {
            new_name: new_name.to_string(),
            old_name: old_name.to_string(),
        }
    }

    pub fn bin(op: &str, lhs: Node, rhs: Node) -> Node {
        Node::Binary {
            op: op.to_string(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
    pub fn unary(op: &str, expr: Node) -> Node {
        Node::Unary {
            op: op.to_string(),
            expr: Box::new(expr),
        }
    }
    pub fn index(target: Node, idx: Node) -> Node {
        Node::Index {
            target: Box::new(target),
            index: Box::new(idx),
        }
    }
    pub fn member(target: Node, name: &str) -> Node {
        Node::Member {
            target: Box::new(target),
            name: name.to_string(),
        }
    }

    pub fn arg(value: Node) -> Arg {
        Arg { name: None, value }
    }
    pub fn named(name: &str, value: Node) -> Arg {
        Arg {
            name: Some(name.to_string()),
            value,
        }
    }

    pub fn call(callee: Node, args: Vec<Arg>) -> Node {
        Node::Call {
            callee: Box::new(callee),
            args,
            pipe: Pipe::None,
        }
    }
    pub fn call_piped(callee: Node, args: Vec<Arg>, pipe: Pipe) -> Node {
        Node::Call {
            callee: Box::new(callee),
            args,
            pipe,
        }
    }
    pub fn mcall(target: Node, name: &str, args: Vec<Arg>) -> Node {
        Node::MethodCall {
            target: Box::new(target),
            name: name.to_string(),
            args,
            pipe: Pipe::None,
        }
    }

    pub fn def(name: &str, params: Vec<Param>, body: Vec<Node>) -> Node {
        Node::Def {
            name: name.to_string(),
            params,
            body,
        }
    }
    pub fn lambda(params: Vec<Param>, body: Vec<Node>) -> Node {
        Node::Lambda { params, body }
    }
    pub fn singleton_def(target: Node, name: &str, params: Vec<Param>, body: Vec<Node>) -> Node {
        Node::SingletonDef {
            target: Box::new(target),
            name: name.to_string(),
            params,
            body,
        }
    }
    pub fn class_def(name: &str, parent: Option<&str>, body: Vec<Node>) -> Node {
        Node::ClassDef {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            body,
        }
    }
    pub fn class_open(target: Node, body: Vec<Node>) -> Node {
        Node::ClassOpen {
            target: Box::new(target),
            body,
        }
    }
    pub fn module_def(name: &str, body: Vec<Node>) -> Node {
        Node::ModuleDef {
            name: name.to_string(),
            body,
        }
    }
    pub fn include(names: Vec<&str>) -> Node {
        Node::Include(names.into_iter().map(str::to_string).collect())
    }

    pub fn undef(names: Vec<&str>) -> Node {
        Node::MethodChange {
            names: names.into_iter().map(str::to_string).collect(),
            remove: false,
        }
    }
    pub fn remove(names: Vec<&str>) -> Node {
        Node::MethodChange {
            names: names.into_iter().map(str::to_string).collect(),
            remove: true,
        }
    }
    pub fn object_undef(target: Node, names: Vec<&str>) -> Node {
        Node::ObjectMethodChange {
            target: Box::new(target),
            names: names.into_iter().map(str::to_string).collect(),
            remove: false,
        }
    }
    pub fn object_remove(target: Node, names: Vec<&str>) -> Node {
        Node::ObjectMethodChange {
            target: Box::new(target),
            names: names.into_iter().map(str::to_string).collect(),
            remove: true,
        }
    }

    pub fn if_(cond: Node, then: Vec<Node>, els: Option<Vec<Node>>) -> Node {
        Node::If {
            cond: Box::new(cond),
            then,
            els,
        }
    }
    pub fn while_(cond: Node, body: Vec<Node>) -> Node {
        Node::While {
            cond: Box::new(cond),
            body,
        }
    }
    pub fn ret(value: Option<Node>) -> Node {
        Node::Return(value.map(Box::new))
    }
    pub fn block(body: Vec<Node>) -> Node {
        Node::Block(body)
    }

    pub fn rescue(class_names: Vec<&str>, var_name: Option<&str>, body: Vec<Node>) -> RescueClause {
        RescueClause {
            class_names: class_names.into_iter().map(str::to_string).collect(),
            wildcard: false,
            var_name: var_name.map(str::to_string),
            body,
        }
    }
    pub fn rescue_any(var_name: Option<&str>, body: Vec<Node>) -> RescueClause {
        RescueClause {
            class_names: Vec::new(),
            wildcard: true,
            var_name: var_name.map(str::to_string),
            body,
        }
    }
    pub fn begin(
        body: Vec<Node>,
        rescues: Vec<RescueClause>,
        else_body: Option<Vec<Node>>,
        ensure: Option<Vec<Node>>,
    ) -> Node {
        Node::Begin {
            body,
            rescues,
            else_body,
            ensure,
        }
    }
    pub fn throw(value: Node) -> Node {
        Node::Throw(Box::new(value))
    }
    pub fn sync(var: &str, body: Vec<Node>) -> Node {
        Node::Sync {
            var: var.to_string(),
            body,
        }
    }
    pub fn incr(target: Node, prefix: bool) -> Node {
        Node::Incr {
            target: Box::new(target),
            prefix,
        }
    }
    pub fn decr(target: Node, prefix: bool) -> Node {
        Node::Decr {
            target: Box::new(target),
            prefix,
        }
    }
}
