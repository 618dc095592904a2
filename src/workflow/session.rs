//! Per-work-item controller.
//!
//! A `WorkflowSession` composes the stage tracker, the suggestion registry,
//! the interval editor and the export tracker for one work item and is the
//! only thing that mutates them. All registry mutations (the analysis stage
//! of a run, re-analysis, interval commits) go through one FIFO async lock,
//! so a commit and a full replacement can never interleave.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::errors::{ConcurrencyError, StageError, ValidationError};
use crate::models::{
    ExportRequest, ExportedClip, Interval, IntervalField, Snapshot, Suggestion, WorkItem,
};
use crate::workflow::editor::{ClipBounds, IntervalEditor};
use crate::workflow::exports::ExportTracker;
use crate::workflow::registry::SuggestionRegistry;
use crate::workflow::stage::{Stage, StageFlag, StageState, WorkflowPhase};
use crate::workflow::tracker::StageTracker;

/// Receives progress notifications while a run walks the stages.
pub trait StageObserver: Send + Sync {
    fn stage_skipped(&self, _stage: Stage) {}
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage) {}
    fn stage_failed(&self, _stage: Stage, _error: &StageError) {}
}

pub struct NoopObserver;

impl StageObserver for NoopObserver {}

/// Outputs of earlier stages that later stages consume.
#[derive(Debug, Clone, Default)]
struct StageInputs {
    audio_ref: Option<String>,
    transcript_text: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Input {
    SourceUrl,
    AudioRef,
    Transcript,
}

impl Input {
    fn describe(self) -> &'static str {
        match self {
            Input::SourceUrl => "source URL",
            Input::AudioRef => "audio reference",
            Input::Transcript => "transcript",
        }
    }
}

/// Holds the per-item run flag for the duration of one run.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool, work_item: &str) -> Result<Self, ConcurrencyError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ConcurrencyError::AlreadyRunning {
                work_item: work_item.to_string(),
            })?;
        Ok(Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub struct WorkflowSession {
    backend: Arc<dyn Backend>,
    work_item: Mutex<WorkItem>,
    tracker: StageTracker,
    registry: SuggestionRegistry,
    editor: IntervalEditor,
    exports: ExportTracker,
    inputs: Mutex<StageInputs>,
    running: AtomicBool,
    mutations: tokio::sync::Mutex<()>,
    bounds: ClipBounds,
}

impl fmt::Debug for WorkflowSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowSession")
            .field("work_item", &self.id())
            .field("stage_state", &self.stage_state())
            .field("suggestions", &self.registry.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl WorkflowSession {
    pub fn new(backend: Arc<dyn Backend>, work_item: WorkItem) -> Self {
        let tracker = StageTracker::new(backend.clone(), work_item.id.clone());
        Self {
            backend,
            work_item: Mutex::new(work_item),
            tracker,
            registry: SuggestionRegistry::default(),
            editor: IntervalEditor::new(),
            exports: ExportTracker::new(),
            inputs: Mutex::new(StageInputs::default()),
            running: AtomicBool::new(false),
            mutations: tokio::sync::Mutex::new(()),
            bounds: ClipBounds::default(),
        }
    }

    pub fn with_stage_state(self, state: StageState) -> Self {
        self.tracker.replace(state);
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<Suggestion>) -> Self {
        self.registry = SuggestionRegistry::new(suggestions);
        self
    }

    pub fn with_inputs(self, audio_ref: Option<String>, transcript_text: Option<String>) -> Self {
        *lock(&self.inputs) = StageInputs {
            audio_ref: non_empty(audio_ref),
            transcript_text: non_empty(transcript_text),
        };
        self
    }

    pub fn with_bounds(mut self, bounds: ClipBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn id(&self) -> String {
        lock(&self.work_item).id.clone()
    }

    pub fn work_item(&self) -> WorkItem {
        lock(&self.work_item).clone()
    }

    pub fn stage_state(&self) -> StageState {
        self.tracker.snapshot()
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.tracker.snapshot().phase()
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.registry.get()
    }

    pub fn suggestion(&self, index: usize) -> Option<Suggestion> {
        self.registry.get_at(index)
    }

    pub fn bounds(&self) -> ClipBounds {
        self.bounds
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn audio_ref(&self) -> Option<String> {
        lock(&self.inputs).audio_ref.clone()
    }

    pub fn transcript_text(&self) -> Option<String> {
        lock(&self.inputs).transcript_text.clone()
    }

    fn held(&self, input: Input) -> Option<String> {
        match input {
            Input::SourceUrl => non_empty(Some(lock(&self.work_item).url.clone())),
            Input::AudioRef => lock(&self.inputs).audio_ref.clone(),
            Input::Transcript => lock(&self.inputs).transcript_text.clone(),
        }
    }

    /// Fold a backend snapshot into the locally held inputs.
    ///
    /// Only fields the snapshot actually carries overwrite local values.
    /// Suggestions are adopted only when the registry is still empty, so an
    /// open session's pending edits survive a resync.
    pub(crate) fn absorb(&self, snapshot: Snapshot) {
        {
            let mut item = lock(&self.work_item);
            if let Some(url) = non_empty(snapshot.url) {
                item.url = url;
            }
            if snapshot.metadata.is_some() {
                item.metadata = snapshot.metadata;
            }
        }
        {
            let mut inputs = lock(&self.inputs);
            if let Some(audio_ref) = non_empty(snapshot.audio_ref) {
                inputs.audio_ref = Some(audio_ref);
            }
            if let Some(text) = non_empty(snapshot.transcript_text) {
                inputs.transcript_text = Some(text);
            }
        }
        match snapshot.suggestions {
            Some(suggestions) if self.registry.is_empty() && !suggestions.is_empty() => {
                self.install_suggestions(suggestions);
            }
            _ => {}
        }
    }

    /// The only resynchronization point: refetch the snapshot when a stage
    /// needs an input that is not held locally.
    async fn require(&self, work_item: &str, input: Input) -> Result<String, StageError> {
        if let Some(value) = self.held(input) {
            return Ok(value);
        }
        debug!(work_item, input = input.describe(), "Input not held locally, fetching snapshot");
        let snapshot = self.backend.fetch_snapshot(work_item).await?;
        self.absorb(snapshot);
        self.held(input)
            .ok_or_else(|| StageError::not_found(input.describe(), work_item))
    }

    fn install_suggestions(&self, suggestions: Vec<Suggestion>) {
        self.registry.replace_all(suggestions);
        self.editor.clear();
        self.exports.clear();
    }

    fn checked_id(&self) -> Result<String, ValidationError> {
        let id = self.id();
        if id.trim().is_empty() {
            return Err(ValidationError::MissingIdentifier);
        }
        Ok(id)
    }

    /// Run every stage whose flag is not yet set, in order, stopping at the
    /// first failure.
    pub async fn run(&self) -> Result<StageState, StageError> {
        self.run_with(&NoopObserver).await
    }

    pub async fn run_with(&self, observer: &dyn StageObserver) -> Result<StageState, StageError> {
        let id = self.checked_id()?;
        let _guard = RunGuard::acquire(&self.running, &id)?;

        for stage in Stage::ORDER {
            if self.tracker.snapshot().is_done(stage) {
                debug!(work_item = %id, %stage, "Stage already complete, skipping");
                observer.stage_skipped(stage);
                continue;
            }

            info!(work_item = %id, %stage, "Starting stage");
            observer.stage_started(stage);
            match self.run_stage(&id, stage).await {
                Ok(()) => {
                    info!(work_item = %id, %stage, "Stage complete");
                    observer.stage_finished(stage);
                }
                Err(e) => {
                    warn!(work_item = %id, %stage, error = %e, "Stage failed, stopping run");
                    observer.stage_failed(stage, &e);
                    return Err(e);
                }
            }
        }

        Ok(self.tracker.snapshot())
    }

    async fn run_stage(&self, id: &str, stage: Stage) -> Result<(), StageError> {
        match stage {
            Stage::AudioExtraction => {
                let url = self.require(id, Input::SourceUrl).await?;
                let audio_ref = self.backend.start_audio_extraction(id, &url).await?;
                lock(&self.inputs).audio_ref = non_empty(Some(audio_ref));
            }
            Stage::Transcription => {
                let audio_ref = self.require(id, Input::AudioRef).await?;
                let url = self.held(Input::SourceUrl).unwrap_or_default();
                let transcript = self
                    .backend
                    .start_transcription(&audio_ref, id, &url)
                    .await?;
                debug!(work_item = id, segments = transcript.segments.len(), "Transcript received");
                lock(&self.inputs).transcript_text = non_empty(Some(transcript.full_text));
            }
            Stage::Analysis => {
                let text = self.require(id, Input::Transcript).await?;
                let _mutation = self.mutations.lock().await;
                let suggestions = self.backend.start_analysis(id, Some(&text), false).await?;
                info!(work_item = id, count = suggestions.len(), "Suggestions received");
                self.install_suggestions(suggestions);
            }
        }
        self.tracker.set(stage.flag());
        Ok(())
    }

    /// Re-issue analysis regardless of flags and replace every suggestion.
    ///
    /// Pending edits and export markers are dropped with the old list. On
    /// failure nothing changes.
    pub async fn reanalyze(&self) -> Result<Vec<Suggestion>, StageError> {
        let id = self.checked_id()?;
        let text = self.transcript_text();

        let _mutation = self.mutations.lock().await;
        info!(work_item = %id, "Re-analyzing");
        let suggestions = self
            .backend
            .start_analysis(&id, text.as_deref(), true)
            .await
            .inspect_err(|e| warn!(work_item = %id, error = %e, "Re-analysis failed"))?;
        self.install_suggestions(suggestions.clone());
        self.tracker.set(StageFlag::Analyzed);
        info!(work_item = %id, count = suggestions.len(), "Re-analysis complete");
        Ok(suggestions)
    }

    pub fn set_pending(
        &self,
        index: usize,
        field: IntervalField,
        raw: &str,
    ) -> Result<Interval, ValidationError> {
        self.editor.set_pending(&self.registry, index, field, raw)
    }

    pub fn effective(&self, index: usize) -> Result<Interval, ValidationError> {
        self.editor.effective(&self.registry, index)
    }

    pub fn pending_edits(&self) -> BTreeMap<usize, Interval> {
        self.editor.pending(&self.registry)
    }

    pub fn discard_pending(&self, index: usize) {
        self.editor.discard(index);
    }

    /// Commit the effective interval at `index`.
    ///
    /// Waits behind any in-flight analysis. If that analysis replaced the
    /// list in the meantime, the commit is refused as stale.
    pub async fn commit_interval(&self, index: usize) -> Result<Suggestion, StageError> {
        let id = self.checked_id()?;
        let observed = self.registry.generation();

        let _mutation = self.mutations.lock().await;
        if self.registry.generation() != observed {
            warn!(work_item = %id, index, "Suggestions replaced while commit waited");
            return Err(ConcurrencyError::StaleSuggestions { index }.into());
        }
        self.editor
            .commit(
                self.backend.as_ref(),
                &self.registry,
                &self.bounds,
                &id,
                index,
            )
            .await
            .inspect_err(|e| {
                if !e.is_local() {
                    warn!(work_item = %id, index, error = %e, "Interval commit failed");
                }
            })
    }

    /// Export the committed interval at `index` as a clip.
    ///
    /// The index is marked active for the whole request and released on
    /// every outcome. Exports of different indices run independently.
    pub async fn export(&self, index: usize) -> Result<String, StageError> {
        let id = self.checked_id()?;
        let suggestion = self.registry.get_at(index).ok_or(ValidationError::IndexOutOfRange {
            index,
            len: self.registry.len(),
        })?;
        let request = ExportRequest {
            work_item: id.clone(),
            index,
            start: suggestion.start,
            end: suggestion.end,
            title: suggestion.title,
        };

        let _active = self.exports.track(index);
        info!(work_item = %id, index, start = request.start, end = request.end, "Exporting clip");
        let file_ref = self
            .backend
            .start_export(&request)
            .await
            .inspect_err(|e| warn!(work_item = %id, index, error = %e, "Export failed"))?;
        self.tracker.set(StageFlag::HasExports);
        info!(work_item = %id, index, file = %file_ref, "Clip exported");
        Ok(file_ref)
    }

    pub fn is_exporting(&self, index: usize) -> bool {
        self.exports.is_active(index)
    }

    pub fn active_exports(&self) -> Vec<usize> {
        self.exports.active()
    }

    pub async fn list_exports(&self) -> Result<Vec<ExportedClip>, StageError> {
        let id = self.checked_id()?;
        self.backend.list_exports(&id).await
    }

    pub(crate) fn mark(&self, flag: StageFlag) {
        self.tracker.set(flag);
    }

    pub(crate) fn replace_stage_state(&self, state: StageState) {
        self.tracker.replace(state);
    }

    /// Replace the local flags with the backend's.
    pub async fn load_stage_state(&self) -> Result<StageState, StageError> {
        self.checked_id()?;
        self.tracker.load().await
    }
}
