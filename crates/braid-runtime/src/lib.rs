//! Braid Runtime
//!
//! Executes [`braid_workflow::WorkflowGraph`]s. The engine validates a graph,
//! creates an [`ExecutionContext`], and walks the graph frontier by frontier,
//! running every node of a layer concurrently. Executions stay registered so
//! they can be paused, resumed, cancelled and inspected by id.
//!
//! # Example
//!
//! ```ignore
//! let engine = WorkflowEngine::new(EngineConfig::default());
//! let context = engine.run(Arc::new(graph), variables).await;
//! assert_eq!(context.status(), ExecutionStatus::Completed);
//! ```

mod agent;
mod config;
mod context;
mod dispatch;
mod engine;
mod error;
mod events;
mod execution;
mod frontier;
pub mod input;
mod registry;

pub use agent::{AgentExecutor, AgentOutcome, AgentTask};
pub use config::{EngineConfig, JoinStrategy};
pub use context::{ExecutionContext, ExecutionStatus, ExecutionSummary};
pub use engine::WorkflowEngine;
pub use error::{ContextError, RuntimeError};
pub use events::{ChannelNotifier, EventKind, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use execution::WorkflowExecution;
