//! Error taxonomy for the document model.
//!
//! Structural errors are never repaired locally: they propagate to whoever
//! issued the edit, which usually means the editing session is reloaded.

use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

use crate::tree::NodeId;

/// Errors raised by the registry, linear store, tree and synchronizer.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModelError {
    /// No registration exists for a node type.
    #[error("unknown node type `{type_name}`")]
    #[diagnostic(code(folio::registry::unknown_type))]
    UnknownType { type_name: SmolStr },

    /// A node type was registered twice while duplicates are rejected.
    #[error("node type `{type_name}` is already registered")]
    #[diagnostic(
        code(folio::registry::duplicate_type),
        help("set `duplicate_registration = \"overwrite\"` to allow replacing registrations")
    )]
    DuplicateType { type_name: SmolStr },

    /// An offset range is reversed or runs past the end of the data.
    #[error("range {start}..{end} is invalid for data of length {len}")]
    #[diagnostic(code(folio::linear::range))]
    Range { start: usize, end: usize, len: usize },

    /// A rebuild region does not line up with node boundaries.
    #[error("offset {offset} is not aligned with node boundaries: {reason}")]
    #[diagnostic(code(folio::tree::alignment))]
    Alignment { offset: usize, reason: &'static str },

    /// Open/close tags are malformed or violate the node type rules.
    #[error("malformed document structure at offset {offset}: {reason}")]
    #[diagnostic(
        code(folio::tree::structure),
        help("the document is in an inconsistent state and should be reloaded")
    )]
    Structure { offset: usize, reason: String },

    /// Changes were pushed to the synchronizer out of ascending order.
    #[error("change at offset {offset} arrived after change at offset {previous}")]
    #[diagnostic(code(folio::sync::order))]
    Order { previous: usize, offset: usize },

    /// A node id does not refer to a live node.
    #[error("node {0:?} does not exist")]
    #[diagnostic(code(folio::tree::missing_node))]
    MissingNode(NodeId),

    /// An abstract operation was invoked on a type that does not provide it.
    #[error("`{type_name}` does not implement `{operation}`")]
    #[diagnostic(code(folio::not_implemented))]
    NotImplemented {
        type_name: &'static str,
        operation: &'static str,
    },
}

impl ModelError {
    pub(crate) fn range(start: usize, end: usize, len: usize) -> Self {
        ModelError::Range { start, end, len }
    }

    pub(crate) fn structure(offset: usize, reason: impl Into<String>) -> Self {
        ModelError::Structure {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether the error leaves the document in a state that must be reloaded.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ModelError::Structure { .. } | ModelError::Order { .. } | ModelError::MissingNode(_)
        )
    }
}

/// Errors loading [`EditorConfig`](crate::config::EditorConfig).
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {var}")]
    #[diagnostic(code(folio::config::invalid_value), help("{expected}"))]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid host configuration")]
    #[diagnostic(code(folio::config::invalid_json))]
    Json(#[from] serde_json::Error),
}
