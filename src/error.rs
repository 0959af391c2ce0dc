use std::fmt::{Debug, Display};
use std::sync::Arc;

use thiserror::Error;

/// Error value carried along a failure cascade.
///
/// Wraps an opaque userland error; the engine never interprets its structure
/// beyond displaying it. Cloneable, because a single fault is observed by
/// every node in the subtree below the point of failure.
#[derive(Debug, Error, Clone)]
#[error(transparent)]
pub struct Fault(#[from] pub(crate) Arc<anyhow::Error>);

impl Fault {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(err.into()))
    }

    /// Creates a fault from a plain human-readable message.
    pub fn msg(msg: impl Display + Debug + Send + Sync + 'static) -> Self {
        Self(Arc::new(anyhow::Error::msg(msg)))
    }
}

impl From<anyhow::Error> for Fault {
    fn from(e: anyhow::Error) -> Self {
        Fault(Arc::new(e))
    }
}

impl From<&str> for Fault {
    fn from(msg: &str) -> Self {
        Fault::msg(msg.to_string())
    }
}

impl From<String> for Fault {
    fn from(msg: String) -> Self {
        Fault::msg(msg)
    }
}

/// Errors returned by the typed result accessor on a task node.
#[derive(Debug, Error)]
pub enum ResultError {
    #[error("task has not produced a result")]
    Unresolved,

    #[error("task result is a '{actual}', expected '{requested}'")]
    TypeMismatch {
        actual: &'static str,
        requested: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_displays_message() {
        let fault = Fault::from("network down");
        assert_eq!(fault.to_string(), "network down");
    }

    #[test]
    fn test_fault_clones_share_message() {
        let fault = Fault::msg("boom");
        let copy = fault.clone();
        assert_eq!(fault.to_string(), copy.to_string());
    }

    #[test]
    fn test_type_mismatch_names_both_shapes() {
        let err = ResultError::TypeMismatch {
            actual: "u32",
            requested: "alloc::string::String",
        };
        let text = err.to_string();
        assert!(text.contains("u32"));
        assert!(text.contains("String"));
    }
}
