//! Braid Workflow
//!
//! The static half of a Braid workflow: typed nodes bound to components,
//! edges guarded by declarative conditions or predicates, and the structural
//! validation that runs before any execution starts.
//!
//! A [`WorkflowGraph`] is built once and shared read-only by every run; all
//! per-run state lives in `braid-runtime`.

mod component;
pub mod condition;
mod edge;
mod error;
mod graph;
mod node;
mod topology;

pub use component::{
  Agent, Component, ComponentError, FnFunction, Function, NodeContext, TaskComponent, Tool,
};
pub use condition::{ConditionConfig, Predicate, evaluate, is_truthy};
pub use edge::{Edge, edge_key};
pub use error::WorkflowError;
pub use graph::WorkflowGraph;
pub use node::{Node, NodeType};
pub use topology::Topology;
