//! Core abstractions for the policy orchestrator
//!
//! This crate provides the flow tree, the versioned record model, the
//! error taxonomy and the collaborator traits the runtime depends on.
//! It performs no I/O.

mod definition;
mod error;
pub mod events;
mod node;
mod record;
mod traits;
mod value;
mod verdict;

pub use definition::{FlowDefinition, FlowDocument, FlowMetadata};
pub use error::{EngineError, Error, NodeError, RepositoryError};
pub use node::{FlowNode, NodeId, NodeKind};
pub use record::{
    BaseId, FlowContent, FlowRecord, LineageSummary, PolicyContent, PolicyRecord, Record,
    RecordContent, RecordId, Status,
};
pub use traits::{FlowRepository, PolicyInvoker, PolicyRepository, VersionedRepository};
pub use value::{Payload, Value};
pub use verdict::{BoundPolicy, EngineVerdict, FlowResult, NodeTraceEntry, CUSTOM_RESPONSE_SELECTOR};
pub use events::*;

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;
