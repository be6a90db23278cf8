//! Flow execution runtime
//!
//! This crate provides the tree-walking executor that evaluates flows
//! against the policy engine, and the orchestrator facade that ties the
//! executor to the policy and flow repositories.

mod executor;
mod lifecycle;
mod runtime;

pub use executor::{ExecutionContext, FlowExecutor};
pub use lifecycle::{ContentValidator, Lifecycle};
pub use runtime::{Orchestrator, RuntimeConfig};
