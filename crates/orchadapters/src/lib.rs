//! Concrete collaborators for the orchestrator
//!
//! An HTTP client for the rule-evaluation engine and an in-memory
//! draft/publish repository usable for both policies and flows.

mod engine;
mod memory;

pub use engine::{EngineConfig, HttpPolicyInvoker};
pub use memory::InMemoryRepository;
