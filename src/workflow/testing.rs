//! Scripted in-memory backend for unit tests.
//!
//! Each operation pops its next response from a queue; an empty queue is a
//! `Business` error so forgotten scripting shows up as a failing assertion
//! rather than a hang. Every call is recorded as one line in `calls()`.
//! Exports and analysis can be held open with a gate so tests can observe
//! in-flight state.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::backend::Backend;
use crate::errors::StageError;
use crate::models::{
    ExportRequest, ExportedClip, MetadataResolution, Snapshot, Suggestion, Transcript,
    WorkItemSummary,
};
use crate::workflow::stage::StageState;

type Queue<T> = Mutex<VecDeque<Result<T, StageError>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn next<T>(queue: &Queue<T>, op: &str) -> Result<T, StageError> {
    lock(queue)
        .pop_front()
        .unwrap_or_else(|| Err(StageError::business(op, "unscripted call")))
}

#[derive(Default)]
pub struct ScriptedBackend {
    calls: Mutex<Vec<String>>,
    metadata: Queue<MetadataResolution>,
    stage_states: Queue<StageState>,
    snapshots: Queue<Snapshot>,
    audio: Queue<String>,
    transcripts: Queue<Transcript>,
    analyses: Queue<Vec<Suggestion>>,
    commits: Queue<Suggestion>,
    exports: Queue<String>,
    work_items: Queue<Vec<WorkItemSummary>>,
    export_lists: Queue<Vec<ExportedClip>>,
    export_gates: Mutex<HashMap<usize, oneshot::Receiver<()>>>,
    analysis_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, line: String) {
        lock(&self.calls).push(line);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Calls whose line starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Poll until a call starting with `prefix` has been recorded.
    pub async fn wait_for_call(&self, prefix: &str) {
        for _ in 0..2000 {
            if !self.calls_to(prefix).is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("no call starting with {:?}; saw {:?}", prefix, self.calls());
    }

    pub fn push_metadata(&self, r: Result<MetadataResolution, StageError>) {
        lock(&self.metadata).push_back(r);
    }

    pub fn push_stage_state(&self, r: Result<StageState, StageError>) {
        lock(&self.stage_states).push_back(r);
    }

    pub fn push_snapshot(&self, r: Result<Snapshot, StageError>) {
        lock(&self.snapshots).push_back(r);
    }

    pub fn push_audio(&self, r: Result<String, StageError>) {
        lock(&self.audio).push_back(r);
    }

    pub fn push_transcript(&self, r: Result<Transcript, StageError>) {
        lock(&self.transcripts).push_back(r);
    }

    pub fn push_analysis(&self, r: Result<Vec<Suggestion>, StageError>) {
        lock(&self.analyses).push_back(r);
    }

    pub fn push_commit(&self, r: Result<Suggestion, StageError>) {
        lock(&self.commits).push_back(r);
    }

    pub fn push_export(&self, r: Result<String, StageError>) {
        lock(&self.exports).push_back(r);
    }

    pub fn push_work_items(&self, r: Result<Vec<WorkItemSummary>, StageError>) {
        lock(&self.work_items).push_back(r);
    }

    pub fn push_export_list(&self, r: Result<Vec<ExportedClip>, StageError>) {
        lock(&self.export_lists).push_back(r);
    }

    /// Hold the next export of `index` until the returned sender fires or drops.
    pub fn gate_export(&self, index: usize) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.export_gates).insert(index, rx);
        tx
    }

    /// Hold the next analysis request until the returned sender fires or drops.
    pub fn gate_analysis(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *lock(&self.analysis_gate) = Some(rx);
        tx
    }
}

/// A transcript with only the full text filled in.
pub fn transcript_of(text: &str) -> Transcript {
    Transcript {
        segments: Vec::new(),
        full_text: text.to_string(),
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn resolve_metadata(&self, url: &str) -> Result<MetadataResolution, StageError> {
        self.record(format!("resolve_metadata {}", url));
        next(&self.metadata, "metadata resolution")
    }

    async fn fetch_stage_state(&self, work_item: &str) -> Result<StageState, StageError> {
        self.record(format!("fetch_stage_state {}", work_item));
        next(&self.stage_states, "stage state fetch")
    }

    async fn fetch_snapshot(&self, work_item: &str) -> Result<Snapshot, StageError> {
        self.record(format!("fetch_snapshot {}", work_item));
        next(&self.snapshots, "snapshot fetch")
    }

    async fn start_audio_extraction(
        &self,
        work_item: &str,
        url: &str,
    ) -> Result<String, StageError> {
        self.record(format!("start_audio_extraction {} {}", work_item, url));
        next(&self.audio, "audio extraction")
    }

    async fn start_transcription(
        &self,
        audio_ref: &str,
        work_item: &str,
        _url: &str,
    ) -> Result<Transcript, StageError> {
        self.record(format!("start_transcription {} {}", work_item, audio_ref));
        next(&self.transcripts, "transcription")
    }

    async fn start_analysis(
        &self,
        work_item: &str,
        transcript_text: Option<&str>,
        full_reanalysis: bool,
    ) -> Result<Vec<Suggestion>, StageError> {
        self.record(format!(
            "start_analysis {} {:?} {}",
            work_item, transcript_text, full_reanalysis
        ));
        let gate = lock(&self.analysis_gate).take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        next(&self.analyses, "analysis")
    }

    async fn commit_interval(
        &self,
        work_item: &str,
        index: usize,
        start: f64,
        end: f64,
    ) -> Result<Suggestion, StageError> {
        self.record(format!(
            "commit_interval {} {} {} {}",
            work_item, index, start, end
        ));
        next(&self.commits, "interval commit")
    }

    async fn start_export(&self, request: &ExportRequest) -> Result<String, StageError> {
        self.record(format!(
            "start_export {} {} {} {}",
            request.work_item, request.index, request.start, request.end
        ));
        let gate = lock(&self.export_gates).remove(&request.index);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        next(&self.exports, "export")
    }

    async fn list_work_items(&self) -> Result<Vec<WorkItemSummary>, StageError> {
        self.record("list_work_items".to_string());
        next(&self.work_items, "library listing")
    }

    async fn list_exports(&self, work_item: &str) -> Result<Vec<ExportedClip>, StageError> {
        self.record(format!("list_exports {}", work_item));
        next(&self.export_lists, "export listing")
    }
}
