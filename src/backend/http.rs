use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{Backend, Operation};
use crate::config::BackendSection;
use crate::errors::StageError;
use crate::models::{
    ExportRequest, ExportedClip, MetadataResolution, Snapshot, Suggestion, Transcript,
    TranscriptSegment, VideoMetadata, WorkItemSummary,
};
use crate::workflow::stage::StageState;

#[derive(Debug, Deserialize)]
struct InfoResponse {
    video_id: String,
    video_info: VideoMetadata,
    #[serde(default)]
    cache: bool,
}

#[derive(Debug, Deserialize)]
struct StateResponse {
    estado: StageState,
}

#[derive(Debug, Default, Deserialize)]
struct AudioRecord {
    #[serde(default)]
    caminho_arquivo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptRecord {
    #[serde(default)]
    texto: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisRecord {
    #[serde(default)]
    sugestoes: Option<Vec<Suggestion>>,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    info_video: Option<VideoMetadata>,
    #[serde(default)]
    audio: Option<AudioRecord>,
    #[serde(default)]
    transcricao: Option<TranscriptRecord>,
    #[serde(default)]
    analise: Option<AnalysisRecord>,
    #[serde(default)]
    ultima_atualizacao: Option<String>,
}

impl From<SnapshotResponse> for Snapshot {
    fn from(r: SnapshotResponse) -> Self {
        Snapshot {
            url: r.url.filter(|u| !u.is_empty()),
            metadata: r.info_video,
            audio_ref: r
                .audio
                .and_then(|a| a.caminho_arquivo)
                .filter(|p| !p.is_empty()),
            transcript_text: r
                .transcricao
                .and_then(|t| t.texto)
                .filter(|t| !t.trim().is_empty()),
            suggestions: r.analise.and_then(|a| a.sugestoes),
            last_updated: r.ultima_atualizacao,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AudioResponse {
    audio_path: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    transcricao: Vec<TranscriptSegment>,
    #[serde(default)]
    texto_completo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    sugestoes: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sugestao: Suggestion,
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    caminho_arquivo: String,
}

#[derive(Debug, Deserialize)]
struct LibraryResponse {
    #[serde(default)]
    videos: Vec<WorkItemSummary>,
}

#[derive(Debug, Deserialize)]
struct ExportsResponse {
    #[serde(default)]
    shorts: Vec<ExportedClip>,
}

/// `Backend` over the processing service's JSON API.
///
/// Timeouts are the transport's concern and come from `[backend]` in the
/// config file; this client never retries.
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendSection) -> anyhow::Result<Self> {
        let base = Url::parse(&config.url)
            .with_context(|| format!("Invalid backend URL: {}", config.url))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("Backend URL cannot carry a path: {}", config.url));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("clipflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, op: Operation, segments: &[&str]) -> Result<Url, StageError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StageError::transport(op.to_string(), "backend URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        op: Operation,
        segments: &[&str],
    ) -> Result<T, StageError> {
        let url = self.endpoint(op, segments)?;
        debug!(operation = %op, %url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(op, e))?;
        decode(op, resp).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        op: Operation,
        segments: &[&str],
        body: Value,
    ) -> Result<T, StageError> {
        let url = self.endpoint(op, segments)?;
        debug!(operation = %op, %url, "POST");
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(op, e))?;
        decode(op, resp).await
    }
}

fn transport_error(op: Operation, err: reqwest::Error) -> StageError {
    warn!(operation = %op, error = %err, "Backend unreachable");
    StageError::transport(op.to_string(), err.to_string())
}

async fn decode<T: DeserializeOwned>(
    op: Operation,
    resp: reqwest::Response,
) -> Result<T, StageError> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| transport_error(op, e))?;
    let value: Value = serde_json::from_str(&body).map_err(|_| {
        warn!(operation = %op, %status, "Backend response is not JSON");
        StageError::transport(op.to_string(), format!("unexpected response (HTTP {})", status))
    })?;
    interpret(op, value)
}

/// Unwrap the backend's `{success, error, ...}` envelope.
///
/// Any envelope that does not say `success: true` is a business failure,
/// whatever the HTTP status was.
fn interpret<T: DeserializeOwned>(op: Operation, value: Value) -> Result<T, StageError> {
    let success = value.get("success").and_then(Value::as_bool).unwrap_or(false);
    if !success {
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} reported failure", op));
        warn!(operation = %op, %message, "Backend rejected request");
        return Err(StageError::business(op.to_string(), message));
    }

    serde_json::from_value(value).map_err(|e| {
        StageError::business(op.to_string(), format!("response missing field: {}", e))
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn resolve_metadata(&self, url: &str) -> Result<MetadataResolution, StageError> {
        let resp: InfoResponse = self
            .post(
                Operation::ResolveMetadata,
                &["api", "youtube", "info"],
                json!({ "url": url }),
            )
            .await?;
        Ok(MetadataResolution {
            id: resp.video_id,
            metadata: resp.video_info,
            cached: resp.cache,
        })
    }

    async fn fetch_stage_state(&self, work_item: &str) -> Result<StageState, StageError> {
        let resp: StateResponse = self
            .get(
                Operation::FetchStageState,
                &["api", "youtube", "estado", work_item],
            )
            .await?;
        Ok(resp.estado)
    }

    async fn fetch_snapshot(&self, work_item: &str) -> Result<Snapshot, StageError> {
        let resp: SnapshotResponse = self
            .get(
                Operation::FetchSnapshot,
                &["api", "youtube", "dados", work_item],
            )
            .await?;
        Ok(resp.into())
    }

    async fn start_audio_extraction(
        &self,
        work_item: &str,
        url: &str,
    ) -> Result<String, StageError> {
        let resp: AudioResponse = self
            .post(
                Operation::AudioExtraction,
                &["api", "audio", "download"],
                json!({ "url": url, "video_id": work_item }),
            )
            .await?;
        Ok(resp.audio_path)
    }

    async fn start_transcription(
        &self,
        audio_ref: &str,
        work_item: &str,
        url: &str,
    ) -> Result<Transcript, StageError> {
        let resp: TranscriptionResponse = self
            .post(
                Operation::Transcription,
                &["api", "transcricao"],
                json!({ "audio_path": audio_ref, "video_id": work_item, "url": url }),
            )
            .await?;
        Ok(Transcript {
            segments: resp.transcricao,
            full_text: resp.texto_completo.unwrap_or_default(),
        })
    }

    async fn start_analysis(
        &self,
        work_item: &str,
        transcript_text: Option<&str>,
        full_reanalysis: bool,
    ) -> Result<Vec<Suggestion>, StageError> {
        let mut body = json!({ "video_id": work_item, "reprocessar": full_reanalysis });
        if let Some(text) = transcript_text {
            body["transcricao_texto"] = Value::String(text.to_string());
        }
        let resp: AnalysisResponse = self
            .post(Operation::Analysis, &["api", "analise", "sugestoes"], body)
            .await?;
        Ok(resp.sugestoes)
    }

    async fn commit_interval(
        &self,
        work_item: &str,
        index: usize,
        start: f64,
        end: f64,
    ) -> Result<Suggestion, StageError> {
        let resp: CommitResponse = self
            .post(
                Operation::CommitInterval,
                &["api", "analise", "atualizar-intervalo"],
                json!({
                    "video_id": work_item,
                    "indice": index,
                    "inicio_segundos": start,
                    "fim_segundos": end,
                }),
            )
            .await?;
        Ok(resp.sugestao)
    }

    async fn start_export(&self, request: &ExportRequest) -> Result<String, StageError> {
        let resp: ExportResponse = self
            .post(
                Operation::Export,
                &["api", "shorts", "baixar"],
                json!({
                    "video_id": request.work_item,
                    "inicio_segundos": request.start,
                    "fim_segundos": request.end,
                    "titulo": request.title,
                    "indice_sugestao": request.index,
                }),
            )
            .await?;
        Ok(resp.caminho_arquivo)
    }

    async fn list_work_items(&self) -> Result<Vec<WorkItemSummary>, StageError> {
        let resp: LibraryResponse = self
            .get(Operation::ListWorkItems, &["api", "biblioteca", "listar"])
            .await?;
        Ok(resp.videos)
    }

    async fn list_exports(&self, work_item: &str) -> Result<Vec<ExportedClip>, StageError> {
        let resp: ExportsResponse = self
            .get(
                Operation::ListExports,
                &["api", "shorts", "listar", work_item],
            )
            .await?;
        Ok(resp.shorts)
    }
}
