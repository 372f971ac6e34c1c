//! Flowcore – the actor execution core of a visual dataflow workbench
//!
//! This crate implements:
//! - A uniform actor lifecycle with capability-based roles
//! - Variable-driven reconfiguration that preserves in-flight state
//! - Late-bound actor indirection through callable names, named setups and files
//! - A typed blackboard with publish/subscribe fan-out
//! - A rendezvous handing display work to a separate presentation thread

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Runtime core modules implementing the actor execution model
pub mod runtime;

// Re-export key types for convenience
pub use runtime::{Flow, FlowConfig};

/// Current version of the flowcore runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
