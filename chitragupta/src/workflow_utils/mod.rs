//! Reusable building blocks for workflow stages
//!
//! - `batch`: bounded concurrent execution with index-ordered results
//! - `task`: task lifecycle logging around a unit of work
//! - `agent`: backend conversations with agent lifecycle logging
//! - `parse`: strict parsing of list-shaped backend replies

pub mod agent;
pub mod batch;
pub mod parse;
pub mod task;

pub use agent::{execute_agent, AgentConfig};
pub use batch::{execute_batch, TaskContext};
pub use parse::{extract_block, parse_string_list, ListParseError};
pub use task::execute_task;
