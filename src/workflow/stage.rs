use serde::{Deserialize, Serialize};

/// One step of the processing pipeline.
///
/// `Stage::ORDER` is the fixed execution order used by every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    AudioExtraction,
    Transcription,
    Analysis,
}

impl Stage {
    pub const ORDER: [Stage; 3] = [Stage::AudioExtraction, Stage::Transcription, Stage::Analysis];

    /// The flag a successful run of this stage sets.
    pub fn flag(self) -> StageFlag {
        match self {
            Stage::AudioExtraction => StageFlag::AudioReady,
            Stage::Transcription => StageFlag::TranscriptReady,
            Stage::Analysis => StageFlag::Analyzed,
        }
    }

    /// Human-readable progress label.
    pub fn label(self) -> &'static str {
        match self {
            Stage::AudioExtraction => "Extracting audio",
            Stage::Transcription => "Transcribing audio",
            Stage::Analysis => "Analyzing transcript",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::AudioExtraction => write!(f, "audio extraction"),
            Stage::Transcription => write!(f, "transcription"),
            Stage::Analysis => write!(f, "analysis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageFlag {
    InfoFetched,
    AudioReady,
    TranscriptReady,
    Analyzed,
    HasExports,
}

/// Completion flags for a work item, mirrored from the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageState {
    #[serde(rename = "info_video", default)]
    pub info_fetched: bool,
    #[serde(rename = "audio", default)]
    pub audio_ready: bool,
    #[serde(rename = "transcricao", default)]
    pub transcript_ready: bool,
    #[serde(rename = "analise", default)]
    pub analyzed: bool,
    #[serde(rename = "shorts", default)]
    pub has_exports: bool,
}

impl StageState {
    pub fn get(&self, flag: StageFlag) -> bool {
        match flag {
            StageFlag::InfoFetched => self.info_fetched,
            StageFlag::AudioReady => self.audio_ready,
            StageFlag::TranscriptReady => self.transcript_ready,
            StageFlag::Analyzed => self.analyzed,
            StageFlag::HasExports => self.has_exports,
        }
    }

    /// Flip one flag to true. Flags are never cleared locally.
    pub fn set(&mut self, flag: StageFlag) {
        match flag {
            StageFlag::InfoFetched => self.info_fetched = true,
            StageFlag::AudioReady => self.audio_ready = true,
            StageFlag::TranscriptReady => self.transcript_ready = true,
            StageFlag::Analyzed => self.analyzed = true,
            StageFlag::HasExports => self.has_exports = true,
        }
    }

    pub fn is_done(&self, stage: Stage) -> bool {
        self.get(stage.flag())
    }

    /// Stages still to run, in execution order.
    pub fn pending(&self) -> Vec<Stage> {
        Stage::ORDER
            .into_iter()
            .filter(|s| !self.is_done(*s))
            .collect()
    }

    /// Furthest point reached along the pipeline.
    pub fn phase(&self) -> WorkflowPhase {
        if self.analyzed {
            WorkflowPhase::Analyzed
        } else if self.transcript_ready {
            WorkflowPhase::TranscriptReady
        } else if self.audio_ready {
            WorkflowPhase::AudioReady
        } else if self.info_fetched {
            WorkflowPhase::InfoFetched
        } else {
            WorkflowPhase::Unstarted
        }
    }
}

/// Logical per-work-item state derived from the flag tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkflowPhase {
    Unstarted,
    InfoFetched,
    AudioReady,
    TranscriptReady,
    Analyzed,
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowPhase::Unstarted => write!(f, "unstarted"),
            WorkflowPhase::InfoFetched => write!(f, "info fetched"),
            WorkflowPhase::AudioReady => write!(f, "audio ready"),
            WorkflowPhase::TranscriptReady => write!(f, "transcript ready"),
            WorkflowPhase::Analyzed => write!(f, "analyzed"),
        }
    }
}
