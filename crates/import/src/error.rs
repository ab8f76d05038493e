use std::fmt;

use crate::sheet::ImportStatus;

#[derive(Debug)]
pub enum ImportError {
    /// A configured diff property has no accessor in the registry.
    /// Signals a configuration/schema mismatch, not a data problem.
    UnknownProperty { property: String },
    /// Disallowed sheet status transition (e.g. straight from
    /// `NotReconciled` to `Imported`).
    IllegalTransition { from: ImportStatus, to: ImportStatus },
    /// The commit collaborator failed to persist the selected elements.
    Commit(String),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProperty { property } => {
                write!(f, "no accessor registered for diff property '{property}'")
            }
            Self::IllegalTransition { from, to } => {
                write!(f, "illegal sheet status transition: {from} -> {to}")
            }
            Self::Commit(msg) => write!(f, "commit failed: {msg}"),
        }
    }
}

impl std::error::Error for ImportError {}
