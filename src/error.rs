use crate::runtime::ClassId;
use crate::value::Value;

/// Classification of a runtime failure. Control flow (explicit `return`)
/// and thrown language-level exceptions also travel as `RuntimeError`
/// values so that the evaluator unwinds uniformly.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("runtime error")]
    Generic,
    #[error("no such method")]
    NoMethod,
    #[error("constant violation")]
    ConstantViolation,
    #[error("type error")]
    TypeError,
    #[error("sync re-entry")]
    Deadlock,
    #[error("exception thrown")]
    Thrown,
    #[error("return")]
    Return,
}

/// A language-level exception in flight: the thrown instance plus the
/// nearest ancestor class literally named `Exception` (if any) recorded
/// at throw time for rescue matching.
#[derive(Debug, Clone)]
pub struct ThrownException {
    pub instance: Value,
    pub exception_class: Option<ClassId>,
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub kind: ErrorKind,
    /// Set when this "error" is an explicit `return` unwinding to the
    /// nearest function call boundary.
    pub return_value: Option<Value>,
    /// Set when this error carries a thrown exception instance.
    pub thrown: Option<ThrownException>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
            kind: ErrorKind::Generic,
            return_value: None,
            thrown: None,
        }
    }

    pub fn with_kind(message: impl Into<String>, kind: ErrorKind) -> Self {
        RuntimeError {
            message: message.into(),
            kind,
            return_value: None,
            thrown: None,
        }
    }

    pub fn returning(value: Value) -> Self {
        RuntimeError {
            message: "return".to_string(),
            kind: ErrorKind::Return,
            return_value: Some(value),
            thrown: None,
        }
    }

    pub fn thrown(instance: Value, exception_class: Option<ClassId>, message: String) -> Self {
        RuntimeError {
            message,
            kind: ErrorKind::Thrown,
            return_value: None,
            thrown: Some(ThrownException {
                instance,
                exception_class,
            }),
        }
    }

    pub fn is_return(&self) -> bool {
        self.kind == ErrorKind::Return
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
