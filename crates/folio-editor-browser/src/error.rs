//! Errors for the view layer, reconciliation and the editor facade.

use folio_editor_core::{ConfigError, ModelError, NodeId};
use miette::Diagnostic;
use thiserror::Error;

use crate::dom::DomNodeId;

/// View-side failures. Apart from wrapped model errors these are cosmetic:
/// the view logs them and keeps going.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ViewError {
    /// A model node has no view entry.
    #[error("no view for model node {0:?}")]
    #[diagnostic(code(folio::view::missing_view))]
    MissingView(NodeId),

    #[error("DOM node {0:?} does not exist")]
    #[diagnostic(code(folio::dom::missing_node))]
    MissingDomNode(DomNodeId),

    #[error("DOM node {0:?} is not a text node")]
    #[diagnostic(code(folio::dom::not_text))]
    NotText(DomNodeId),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),
}

impl ViewError {
    /// Whether the failure only affects rendering.
    pub fn is_cosmetic(&self) -> bool {
        match self {
            ViewError::Model(err) => matches!(
                err,
                ModelError::NotImplemented { .. } | ModelError::UnknownType { .. }
            ),
            _ => true,
        }
    }
}

/// Raised when observed input has no safe transaction.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReconcileError {
    /// A text mutation was reported for a node that is not a text run.
    #[error("model node {0:?} is not a text run")]
    #[diagnostic(
        code(folio::reconcile::not_text),
        help("only character data can be reconciled from DOM mutations")
    )]
    NotText(NodeId),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),
}

/// Top-level error of the editor facade.
#[derive(Debug, Error, Diagnostic)]
pub enum EditorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}
