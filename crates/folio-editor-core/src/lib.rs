//! folio-editor-core: the document model of the folio editor, without any
//! DOM dependencies.
//!
//! This crate provides:
//! - `NodeRegistry` - type name to rules and constructor, for model and view
//! - `LinearData` - the document flattened into tags and annotated characters
//! - `Document` - the linear data plus an arena-backed tree index over it
//! - `DocumentSynchronizer` - incremental tree rebuilds with ordered change events
//! - `Transaction`, `Surface`, `Selection` - editing, selection mapping, undo

pub mod config;
pub mod document;
pub mod error;
pub mod history;
pub mod linear;
pub mod registry;
pub mod selection;
pub mod surface;
pub mod sync;
pub mod telemetry;
pub mod transaction;
pub mod tree;

pub use config::{DuplicatePolicy, EditorConfig, OverlapPolicy};
pub use document::{Document, ModelCtor, ModelRegistry, Position, ROOT_TYPE};
pub use error::{ConfigError, ModelError};
pub use history::{History, HistoryEntry};
pub use linear::{Annotations, Attributes, Element, LinearData};
pub use registry::{NodeRegistry, NodeRules, Registration};
pub use selection::Selection;
pub use smol_str::SmolStr;
pub use surface::Surface;
pub use sync::{ChangeEvent, ChangeObserver, DocumentSynchronizer, NoopObserver, PendingChange};
pub use transaction::{Affinity, AnnotationMethod, Operation, Transaction, TransactionBuilder};
pub use tree::{Node, NodeId, NodeKind, NodeSeed, TEXT_TYPE};
