//! The seam between the workflow core and the processing backend.
//!
//! The core only ever talks to `dyn Backend`. The real implementation is
//! [`HttpBackend`]; tests substitute a scripted double.

pub mod http;

pub use http::HttpBackend;

use async_trait::async_trait;

use crate::errors::StageError;
use crate::models::{
    ExportRequest, ExportedClip, MetadataResolution, Snapshot, Suggestion, Transcript,
    WorkItemSummary,
};
use crate::workflow::stage::StageState;

/// Backend request kinds, used to label errors and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ResolveMetadata,
    FetchStageState,
    FetchSnapshot,
    AudioExtraction,
    Transcription,
    Analysis,
    CommitInterval,
    Export,
    ListWorkItems,
    ListExports,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::ResolveMetadata => "metadata resolution",
            Operation::FetchStageState => "stage state fetch",
            Operation::FetchSnapshot => "snapshot fetch",
            Operation::AudioExtraction => "audio extraction",
            Operation::Transcription => "transcription",
            Operation::Analysis => "analysis",
            Operation::CommitInterval => "interval commit",
            Operation::Export => "export",
            Operation::ListWorkItems => "library listing",
            Operation::ListExports => "export listing",
        };
        f.write_str(name)
    }
}

/// Request/response contract of the processing backend.
///
/// Every method either returns the success payload or a `StageError` that is
/// `Transport` (no usable response) or `Business` (the backend said no).
#[async_trait]
pub trait Backend: Send + Sync {
    async fn resolve_metadata(&self, url: &str) -> Result<MetadataResolution, StageError>;

    async fn fetch_stage_state(&self, work_item: &str) -> Result<StageState, StageError>;

    async fn fetch_snapshot(&self, work_item: &str) -> Result<Snapshot, StageError>;

    /// Returns the backend's reference to the extracted audio.
    async fn start_audio_extraction(&self, work_item: &str, url: &str)
    -> Result<String, StageError>;

    async fn start_transcription(
        &self,
        audio_ref: &str,
        work_item: &str,
        url: &str,
    ) -> Result<Transcript, StageError>;

    /// `transcript_text` may be omitted for a full re-analysis, in which case
    /// the backend uses the transcript it already stores.
    async fn start_analysis(
        &self,
        work_item: &str,
        transcript_text: Option<&str>,
        full_reanalysis: bool,
    ) -> Result<Vec<Suggestion>, StageError>;

    /// Returns the server's canonical suggestion after it re-validates the interval.
    async fn commit_interval(
        &self,
        work_item: &str,
        index: usize,
        start: f64,
        end: f64,
    ) -> Result<Suggestion, StageError>;

    /// Returns a reference to the produced clip file.
    async fn start_export(&self, request: &ExportRequest) -> Result<String, StageError>;

    async fn list_work_items(&self) -> Result<Vec<WorkItemSummary>, StageError>;

    async fn list_exports(&self, work_item: &str) -> Result<Vec<ExportedClip>, StageError>;
}
