//! Nova runtime: a late-bound object model and method-dispatch engine.
//!
//! The runtime evaluates expression trees ([`ast::Node`]) against an
//! [`runtime::Interpreter`], which owns every registry: the scope arena,
//! the class arena, the symbol interner, host type registrations and the
//! box cache. Classes use single inheritance with reopenable bodies and
//! per-name overload tables; dispatch resolves through an ordered list
//! of strategies and misses softly; under-applied positional calls curry
//! into partial functions; host objects participate through boxing.

pub mod ast;
pub mod error;
pub mod interpreter;
pub mod runtime;
pub mod symbol;
pub mod value;

pub use error::{ErrorKind, RuntimeError};
pub use runtime::Interpreter;
pub use value::{DictKey, Value};
