use crate::analysis::{AnalysisDataset, SingleChart};
use crate::gateway::{GatewayError, RunReply};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const READY_TEXT: &str = "Ready to process your data";
pub const RUNNING_TEXT: &str = "Running ETL Pipeline...";
pub const SUCCESS_TEXT: &str = "Pipeline completed successfully!";
pub const FAILURE_TEXT: &str = "Pipeline failed";
pub const INTERRUPTED_TEXT: &str = "Pipeline run was interrupted";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub user_agent: String,
    pub session_file: PathBuf,
}

/// Pipeline run state. Serialized in the `{ "type": .., "text": .. }` shape the
/// session file has always used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text")]
pub enum RunStatus {
    #[serde(rename = "ready")]
    Ready(String),
    #[serde(rename = "processing")]
    Running(String),
    #[serde(rename = "success")]
    Succeeded(String),
    #[serde(rename = "error")]
    Failed(String),
}

impl Default for RunStatus {
    fn default() -> Self {
        RunStatus::Ready(READY_TEXT.to_string())
    }
}

impl RunStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Running(_))
    }

    pub fn message(&self) -> &str {
        match self {
            RunStatus::Ready(m)
            | RunStatus::Running(m)
            | RunStatus::Succeeded(m)
            | RunStatus::Failed(m) => m,
        }
    }

    /// Short label for UI/CLI layers.
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Ready(_) => "ready",
            RunStatus::Running(_) => "processing",
            RunStatus::Succeeded(_) => "success",
            RunStatus::Failed(_) => "error",
        }
    }
}

/// Raw, user-edited filter form. Fields are kept exactly as typed; see
/// `orchestrator::filter` for normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub hp_min: String,
    #[serde(default)]
    pub is_evolved: bool,
}

/// A single edit of the filter form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriteriaEdit {
    TypeName(String),
    HpMin(String),
    Evolved(bool),
}

impl FilterCriteria {
    pub fn apply(&mut self, edit: CriteriaEdit) {
        match edit {
            CriteriaEdit::TypeName(v) => self.type_name = v,
            CriteriaEdit::HpMin(v) => self.hp_min = v,
            CriteriaEdit::Evolved(v) => self.is_evolved = v,
        }
    }
}

/// The subset of criteria actually transmitted to the filter endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_min: Option<u32>,
    // Only ever `Some(true)`: an unchecked box is transmitted as absence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_evolved: Option<bool>,
}

impl EffectiveQuery {
    /// Query-string pairs in the order the filter endpoint documents them.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(t) = &self.type_name {
            pairs.push(("type_name", t.clone()));
        }
        if let Some(hp) = self.hp_min {
            pairs.push(("hp_min", hp.to_string()));
        }
        if let Some(e) = self.is_evolved {
            pairs.push(("is_evolved", e.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonRecord {
    pub name: String,
    pub hp: u32,
    // Remaining columns are carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PokemonRecord {
    /// Upper-cased first character of the name, used as the record avatar.
    pub fn avatar(&self) -> String {
        self.name
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityFlags {
    pub filters_shown: bool,
    pub results_shown: bool,
}

/// Requests issued by the state-owning components. The dispatcher turns each into
/// a gateway call whose outcome comes back as a `RemoteEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRequest {
    RunPipeline,
    FilterQuery { seq: u64, query: EffectiveQuery },
    FetchAnalysis { seq: u64 },
    FetchChart { seq: u64, name: String },
}

/// Continuations of remote operations, delivered back onto the app loop.
#[derive(Debug)]
pub enum RemoteEvent {
    PipelineFinished(Result<RunReply, GatewayError>),
    FilterFinished {
        seq: u64,
        result: Result<Vec<PokemonRecord>, GatewayError>,
    },
    AnalysisFinished {
        seq: u64,
        result: Result<AnalysisDataset, GatewayError>,
    },
    ChartFinished {
        seq: u64,
        result: Result<SingleChart, GatewayError>,
    },
}
