//! Domain types shared by the backend seam and the workflow core.
//!
//! Field names follow the backend's JSON keys through `serde(rename)`, so the
//! same types travel over the wire and through the core unchanged.

use serde::{Deserialize, Deserializer, Serialize};

use crate::workflow::stage::StageState;

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One proposed clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "titulo", default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "inicio_segundos")]
    pub start: f64,
    #[serde(rename = "fim_segundos")]
    pub end: f64,
    /// Duration as reported by the backend; see [`Suggestion::duration`].
    #[serde(
        rename = "duracao_segundos",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reported_duration: Option<f64>,
    #[serde(rename = "descricao", default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
    #[serde(
        rename = "potencial_viral",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub viral_potential: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl Suggestion {
    pub fn new(title: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            reported_duration: None,
            description: String::new(),
            hook: None,
            viral_potential: None,
            tags: Vec::new(),
        }
    }

    /// Clip length in seconds, derived from the interval when the backend
    /// did not report one.
    pub fn duration(&self) -> f64 {
        self.reported_duration.unwrap_or(self.end - self.start)
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }
}

/// A `{start, end}` pair in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Which end of an interval an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalField {
    Start,
    End,
}

impl std::fmt::Display for IntervalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntervalField::Start => write!(f, "start"),
            IntervalField::End => write!(f, "end"),
        }
    }
}

/// Source video metadata as resolved by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(rename = "titulo", default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "autor", default)]
    pub author: Option<String>,
    #[serde(rename = "duracao_segundos", default)]
    pub duration_seconds: Option<f64>,
    #[serde(rename = "url_thumbnail", default)]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "visualizacoes", default)]
    pub view_count: Option<u64>,
    #[serde(rename = "data_publicacao", default)]
    pub published: Option<String>,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
}

/// Result of resolving a source URL into a work item.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataResolution {
    pub id: String,
    pub metadata: VideoMetadata,
    /// The backend served this from its own store rather than re-resolving.
    pub cached: bool,
}

/// One unit of processing, identified by a backend-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub id: String,
    pub url: String,
    pub metadata: Option<VideoMetadata>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            metadata: None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.title.as_str())
    }
}

/// Everything the backend has stored for a work item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub url: Option<String>,
    pub metadata: Option<VideoMetadata>,
    pub audio_ref: Option<String>,
    pub transcript_text: Option<String>,
    pub suggestions: Option<Vec<Suggestion>>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    #[serde(rename = "inicio")]
    pub start: f64,
    #[serde(rename = "fim")]
    pub end: f64,
    #[serde(rename = "texto", default, deserialize_with = "null_as_default")]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
    pub full_text: String,
}

/// Everything needed to materialize one suggestion as a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub work_item: String,
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub title: String,
}

/// A clip the backend has already produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedClip {
    #[serde(rename = "caminho_arquivo")]
    pub file_ref: String,
    #[serde(rename = "inicio_segundos")]
    pub start: f64,
    #[serde(rename = "fim_segundos")]
    pub end: f64,
    #[serde(rename = "titulo", default)]
    pub title: Option<String>,
    #[serde(rename = "indice_sugestao", default)]
    pub index: Option<usize>,
    #[serde(rename = "tamanho_bytes", default)]
    pub size_bytes: Option<u64>,
}

/// Library entry for a previously processed work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemSummary {
    #[serde(rename = "video_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(rename = "titulo", default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "ultima_atualizacao", default)]
    pub last_updated: Option<String>,
    #[serde(rename = "thumbnail", default)]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "estado", default)]
    pub stage_state: Option<StageState>,
}
