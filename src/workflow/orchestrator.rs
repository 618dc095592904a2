//! Entry point for the workflow core.
//!
//! The `Orchestrator` owns the backend handle and one shared
//! [`WorkflowSession`] per open work item. Sharing the session is what makes
//! the per-item run guard and mutation lock effective across callers.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDateTime};
use tracing::{debug, info};

use crate::backend::Backend;
use crate::errors::{StageError, ValidationError};
use crate::models::{MetadataResolution, WorkItem, WorkItemSummary};
use crate::workflow::editor::ClipBounds;
use crate::workflow::session::{StageObserver, WorkflowSession};
use crate::workflow::stage::{StageFlag, StageState};

pub struct Orchestrator {
    backend: Arc<dyn Backend>,
    bounds: ClipBounds,
    sessions: Mutex<HashMap<String, Arc<WorkflowSession>>>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            bounds: ClipBounds::default(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_bounds(mut self, bounds: ClipBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        self.backend.clone()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<WorkflowSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a source URL into a work item with `info_fetched` set.
    pub async fn resolve(
        &self,
        url: &str,
    ) -> Result<(Arc<WorkflowSession>, MetadataResolution), StageError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ValidationError::MissingIdentifier.into());
        }
        let resolution = self.backend.resolve_metadata(url).await?;
        if resolution.id.trim().is_empty() {
            return Err(StageError::business(
                "metadata resolution",
                "backend returned an empty work item id",
            ));
        }
        info!(
            work_item = %resolution.id,
            title = %resolution.metadata.title,
            cached = resolution.cached,
            "Resolved metadata"
        );

        let session = self.session_or_insert(&resolution.id, || {
            let mut item = WorkItem::new(resolution.id.clone(), url);
            item.metadata = Some(resolution.metadata.clone());
            WorkflowSession::new(self.backend.clone(), item).with_bounds(self.bounds)
        });
        // A cached resolution means earlier stages may already be done and
        // their outputs stored, suggestions included.
        if resolution.cached {
            let snapshot = self.backend.fetch_snapshot(&resolution.id).await?;
            session.absorb(snapshot);
            session.load_stage_state().await?;
        }
        session.mark(StageFlag::InfoFetched);
        Ok((session, resolution))
    }

    /// Open a work item the backend already knows.
    ///
    /// A work item that is already open is resynchronized and the same
    /// session returned.
    pub async fn open(&self, id: &str) -> Result<Arc<WorkflowSession>, StageError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ValidationError::MissingIdentifier.into());
        }
        let snapshot = self.backend.fetch_snapshot(id).await?;
        let state = self.backend.fetch_stage_state(id).await?;
        debug!(work_item = id, ?state, "Opened work item");

        let session = self.session_or_insert(id, || {
            WorkflowSession::new(self.backend.clone(), WorkItem::new(id, ""))
                .with_bounds(self.bounds)
        });
        session.absorb(snapshot);
        session.replace_stage_state(state);
        Ok(session)
    }

    /// Open, then run every pending stage.
    pub async fn process(
        &self,
        id: &str,
        observer: &dyn StageObserver,
    ) -> Result<(Arc<WorkflowSession>, StageState), StageError> {
        let session = self.open(id).await?;
        let state = session.run_with(observer).await?;
        Ok((session, state))
    }

    /// Previously processed work items, most recently updated first.
    pub async fn library(&self) -> Result<Vec<WorkItemSummary>, StageError> {
        let mut items = self.backend.list_work_items().await?;
        sort_by_recency(&mut items);
        Ok(items)
    }

    /// The open session for `id`, if any.
    pub fn session(&self, id: &str) -> Option<Arc<WorkflowSession>> {
        self.sessions().get(id).cloned()
    }

    fn session_or_insert<F>(&self, id: &str, create: F) -> Arc<WorkflowSession>
    where
        F: FnOnce() -> WorkflowSession,
    {
        self.sessions()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(create()))
            .clone()
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// Newest first; entries without a parseable timestamp go last in their
/// original order.
fn sort_by_recency(items: &mut [WorkItemSummary]) {
    items.sort_by(|a, b| {
        let a = a.last_updated.as_deref().and_then(parse_timestamp);
        let b = b.last_updated.as_deref().and_then(parse_timestamp);
        match (a, b) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Snapshot, Suggestion, VideoMetadata};
    use crate::workflow::session::NoopObserver;
    use crate::workflow::stage::WorkflowPhase;
    use crate::workflow::testing::{ScriptedBackend, transcript_of};

    fn summary(id: &str, updated: Option<&str>) -> WorkItemSummary {
        WorkItemSummary {
            id: id.to_string(),
            url: format!("https://youtu.be/{}", id),
            title: id.to_uppercase(),
            last_updated: updated.map(str::to_string),
            thumbnail_url: None,
            stage_state: None,
        }
    }

    fn resolution(id: &str, cached: bool) -> MetadataResolution {
        MetadataResolution {
            id: id.to_string(),
            metadata: VideoMetadata {
                title: "Keynote".into(),
                ..Default::default()
            },
            cached,
        }
    }

    #[tokio::test]
    async fn test_resolve_rejects_empty_url() {
        let backend = Arc::new(ScriptedBackend::new());
        let orchestrator = Orchestrator::new(backend.clone());
        let err = orchestrator.resolve("   ").await.unwrap_err();
        assert_eq!(err, StageError::Validation(ValidationError::MissingIdentifier));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_fresh_item_sets_info_flag() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_metadata(Ok(resolution("abc123", false)));
        let orchestrator = Orchestrator::new(backend.clone());

        let (session, resolved) = orchestrator
            .resolve("https://youtu.be/abc123")
            .await
            .unwrap();

        assert!(!resolved.cached);
        assert_eq!(session.id(), "abc123");
        assert_eq!(session.work_item().title(), Some("Keynote"));
        assert_eq!(session.phase(), WorkflowPhase::InfoFetched);
        assert_eq!(
            backend.calls(),
            vec!["resolve_metadata https://youtu.be/abc123".to_string()]
        );
    }

    #[tokio::test]
    async fn test_resolve_cached_item_loads_flags() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_metadata(Ok(resolution("abc123", true)));
        backend.push_snapshot(Ok(Snapshot {
            audio_ref: Some("audio/abc123.mp3".into()),
            ..Default::default()
        }));
        backend.push_stage_state(Ok(StageState {
            info_fetched: true,
            audio_ready: true,
            ..Default::default()
        }));
        let orchestrator = Orchestrator::new(backend.clone());

        let (session, _) = orchestrator.resolve("https://youtu.be/abc123").await.unwrap();
        assert!(session.stage_state().audio_ready);
        assert_eq!(session.audio_ref().as_deref(), Some("audio/abc123.mp3"));
    }

    #[tokio::test]
    async fn test_resolve_cached_analyzed_item_restores_suggestions() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_metadata(Ok(resolution("abc123", true)));
        backend.push_snapshot(Ok(Snapshot {
            url: Some("https://youtu.be/abc123".into()),
            transcript_text: Some("words".into()),
            suggestions: Some(vec![
                Suggestion::new("a", 0.0, 45.0),
                Suggestion::new("b", 60.0, 120.0),
            ]),
            ..Default::default()
        }));
        backend.push_stage_state(Ok(StageState {
            info_fetched: true,
            audio_ready: true,
            transcript_ready: true,
            analyzed: true,
            has_exports: false,
        }));
        let orchestrator = Orchestrator::new(backend.clone());

        let (session, _) = orchestrator.resolve("https://youtu.be/abc123").await.unwrap();
        session.run().await.unwrap();

        assert_eq!(session.suggestions().len(), 2);
        assert_eq!(session.suggestion(1).map(|s| s.title).as_deref(), Some("b"));
        assert_eq!(
            backend.calls(),
            vec![
                "resolve_metadata https://youtu.be/abc123".to_string(),
                "fetch_snapshot abc123".to_string(),
                "fetch_stage_state abc123".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_cached_item_fails_when_snapshot_fails() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_metadata(Ok(resolution("abc123", true)));
        backend.push_snapshot(Err(StageError::business("snapshot", "gone")));
        let orchestrator = Orchestrator::new(backend.clone());

        let err = orchestrator
            .resolve("https://youtu.be/abc123")
            .await
            .unwrap_err();
        assert_eq!(err, StageError::business("snapshot", "gone"));
    }

    #[tokio::test]
    async fn test_session_debug_names_work_item() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_metadata(Ok(resolution("abc123", false)));
        let orchestrator = Orchestrator::new(backend);

        let (session, _) = orchestrator.resolve("https://youtu.be/abc123").await.unwrap();
        let rendered = format!("{:?}", session);
        assert!(rendered.contains("WorkflowSession"));
        assert!(rendered.contains("abc123"));
    }

    #[tokio::test]
    async fn test_open_adopts_snapshot() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_snapshot(Ok(Snapshot {
            url: Some("https://youtu.be/abc123".into()),
            audio_ref: Some("audio/abc123.mp3".into()),
            transcript_text: Some("words".into()),
            suggestions: Some(vec![Suggestion::new("a", 0.0, 45.0)]),
            ..Default::default()
        }));
        backend.push_stage_state(Ok(StageState {
            info_fetched: true,
            audio_ready: true,
            transcript_ready: true,
            analyzed: true,
            has_exports: false,
        }));
        let orchestrator = Orchestrator::new(backend.clone());

        let session = orchestrator.open("abc123").await.unwrap();
        assert_eq!(session.work_item().url, "https://youtu.be/abc123");
        assert_eq!(session.suggestions().len(), 1);
        assert_eq!(session.transcript_text().as_deref(), Some("words"));

        // Everything is done: a run issues nothing.
        backend.clear_calls();
        session.run().await.unwrap();
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_open_twice_returns_shared_session() {
        let backend = Arc::new(ScriptedBackend::new());
        for _ in 0..2 {
            backend.push_snapshot(Ok(Snapshot::default()));
        }
        backend.push_stage_state(Ok(StageState::default()));
        backend.push_stage_state(Ok(StageState {
            audio_ready: true,
            ..Default::default()
        }));
        let orchestrator = Orchestrator::new(backend.clone());

        let first = orchestrator.open("abc123").await.unwrap();
        let second = orchestrator.open("abc123").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        // Re-open resynchronizes the flags wholesale.
        assert!(first.stage_state().audio_ready);
        assert!(orchestrator.session("abc123").is_some());
        assert!(orchestrator.session("other").is_none());
    }

    #[tokio::test]
    async fn test_process_runs_pending_stages() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_snapshot(Ok(Snapshot {
            url: Some("https://youtu.be/abc123".into()),
            ..Default::default()
        }));
        backend.push_stage_state(Ok(StageState {
            info_fetched: true,
            ..Default::default()
        }));
        backend.push_audio(Ok("audio/abc123.mp3".into()));
        backend.push_transcript(Ok(transcript_of("words")));
        backend.push_analysis(Ok(vec![Suggestion::new("a", 0.0, 60.0)]));
        let orchestrator = Orchestrator::new(backend.clone());

        let (session, state) = orchestrator.process("abc123", &NoopObserver).await.unwrap();
        assert!(state.analyzed);
        assert_eq!(session.suggestions().len(), 1);
    }

    #[tokio::test]
    async fn test_library_sorted_newest_first() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_work_items(Ok(vec![
            summary("old", Some("2024-03-01T09:00:00")),
            summary("broken", Some("yesterday")),
            summary("new", Some("2025-01-02T10:00:00.123456")),
            summary("none", None),
            summary("mid", Some("2024-12-31T23:59:59+00:00")),
        ]));
        let orchestrator = Orchestrator::new(backend);

        let ids: Vec<String> = orchestrator
            .library()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old", "broken", "none"]);
    }
}
