//! Error kinds for the backend core.
//!
//! Nothing in this crate recovers from an error internally: a `CoreError` is
//! either an invariant violation (a bug in this crate or its caller, fatal),
//! a `BadInput` marker relayed opaquely from the translator boundary, or a
//! resource-exhaustion condition from the arena/virtual-memory layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// SSA ill-formedness, phi/predecessor arity mismatch, dangling operand,
    /// non-empty `IN(entry)`, an encoding the instruction table has no form
    /// for, or any other broken internal invariant.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The translator (external) refused to lower the AST; the core treats
    /// the reason as opaque and does not attempt partial emission.
    #[error("bad input: {0}")]
    BadInput(String),

    /// Arena segment allocation or virtual-memory commit failed.
    #[error("resource exhausted: {0}")]
    Resource(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

macro_rules! invariant {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::error::CoreError::Invariant(format!($($msg)*)));
        }
    };
}

pub(crate) use invariant;
