//! The client-side workflow core: per-work-item stage tracking, suggestion
//! bookkeeping, interval editing and export tracking, driven by an
//! [`Orchestrator`].

pub mod editor;
pub mod exports;
pub mod orchestrator;
pub mod registry;
pub mod session;
pub mod stage;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use editor::{ClipBounds, IntervalEditor};
pub use exports::{ExportGuard, ExportTracker};
pub use orchestrator::Orchestrator;
pub use registry::SuggestionRegistry;
pub use session::{NoopObserver, StageObserver, WorkflowSession};
pub use stage::{Stage, StageFlag, StageState, WorkflowPhase};
pub use tracker::StageTracker;
