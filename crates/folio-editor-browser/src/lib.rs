//! Browser layer for the folio editor.
//!
//! Renders a `folio-editor-core` document into a content-editable DOM and
//! turns user input back into transactions. The DOM is modelled by `DomTree`,
//! so everything except `mount` runs natively.
//!
//! # Architecture
//!
//! - `dom`: arena DOM with a patch stream for live backends
//! - `view`: view registry and the incremental `ContentEditableView`
//! - `input`: `beforeinput` type parsing
//! - `reconcile`: observed input to transaction, as a pure function
//! - `editor`: `Editor` facade over surface and view
//! - `mount`: wasm-only patch replay and event wiring
//!
//! # Re-exports
//!
//! This crate re-exports `folio-editor-core` for convenience, so consumers
//! only need to depend on `folio-editor-browser`.

// Re-export core crate
pub use folio_editor_core;
pub use folio_editor_core::*;

pub mod dom;
pub mod editor;
pub mod error;
pub mod input;
pub mod reconcile;
pub mod view;

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub mod mount;

pub use dom::{DomNodeData, DomNodeId, DomPatch, DomTree};
pub use editor::Editor;
pub use error::{EditorError, ReconcileError, ViewError};
pub use input::{BeforeInputResult, InputType, parse_browser_input_type};
pub use reconcile::{ObservedInput, Reconciled, reconcile};
pub use view::{
    BranchView, ContentEditableView, ImageView, LeafView, RuleView, TextView, ViewCtor, ViewKind,
    ViewRegistry, default_view_registry,
};
