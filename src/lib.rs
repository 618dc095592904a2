//! Client-side workflow core for turning long-form videos into short clips
//! through a remote processing backend.

pub mod backend;
pub mod config;
pub mod errors;
pub mod models;
pub mod ui;
pub mod workflow;

pub use errors::{ConcurrencyError, StageError, ValidationError};
pub use workflow::{Orchestrator, WorkflowSession};
