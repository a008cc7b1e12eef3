//! Boundary to the Pokelytics backend.
//!
//! The backend exposes three operations the client relies on (run the ETL pipeline,
//! filter the loaded Pokémon, fetch the analysis dataset) plus a single-chart lookup.
//! Everything behind these calls is opaque to the client.

mod http;

use crate::analysis::{AnalysisDataset, SingleChart};
use crate::model::{EffectiveQuery, PokemonRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpGateway;

/// Body of a run-pipeline response, on success or failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReply {
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Remote unreachable, timed out, or the connection broke mid-response.
    #[error("{0}")]
    Transport(String),
    /// The server answered with a non-success status.
    #[error("server responded with status {status}")]
    Status { status: u16, detail: Option<String> },
    /// The server answered, but not in the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Server-provided detail, if the failure carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            GatewayError::Status {
                detail: Some(d), ..
            } => Some(d.as_str()),
            _ => None,
        }
    }
}

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn run_pipeline(&self) -> Result<RunReply, GatewayError>;

    async fn filter_query(
        &self,
        query: &EffectiveQuery,
    ) -> Result<Vec<PokemonRecord>, GatewayError>;

    async fn fetch_analysis(&self) -> Result<AnalysisDataset, GatewayError>;

    async fn fetch_chart(&self, name: &str) -> Result<SingleChart, GatewayError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted gateway for exercising the app loop without a server.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct ScriptedGateway {
        pub pipeline: Mutex<VecDeque<Result<RunReply, GatewayError>>>,
        pub records: Mutex<Vec<PokemonRecord>>,
        pub filter_error: Mutex<Option<String>>,
        /// Queries for this type name answer after a delay.
        pub slow_type: Mutex<Option<String>>,
        pub analysis: Mutex<Option<serde_json::Value>>,
        pub calls: Mutex<Vec<String>>,
        pub queries: Mutex<Vec<EffectiveQuery>>,
    }

    impl ScriptedGateway {
        pub fn with_records(records: Vec<PokemonRecord>) -> Self {
            Self {
                records: Mutex::new(records),
                ..Default::default()
            }
        }

        pub fn push_pipeline(&self, reply: Result<RunReply, GatewayError>) {
            self.pipeline.lock().unwrap().push_back(reply);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record_call(&self, name: &str) {
            self.calls.lock().unwrap().push(name.to_string());
        }
    }

    #[async_trait]
    impl RemoteGateway for ScriptedGateway {
        async fn run_pipeline(&self) -> Result<RunReply, GatewayError> {
            self.record_call("run-pipeline");
            self.pipeline.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(RunReply {
                    detail: Some("Pipeline completed.".into()),
                })
            })
        }

        async fn filter_query(
            &self,
            query: &EffectiveQuery,
        ) -> Result<Vec<PokemonRecord>, GatewayError> {
            self.record_call("filter-query");
            self.queries.lock().unwrap().push(query.clone());
            let failure = self.filter_error.lock().unwrap().clone();
            if let Some(msg) = failure {
                return Err(GatewayError::Transport(msg));
            }
            let slow = self.slow_type.lock().unwrap().clone();
            if slow.is_some() && slow == query.type_name {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            let min = query.hp_min.unwrap_or(0);
            let wanted = query.type_name.clone().map(serde_json::Value::String);
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.hp >= min)
                .filter(|r| wanted.is_none() || r.extra.get("type") == wanted.as_ref())
                .cloned()
                .collect())
        }

        async fn fetch_analysis(&self) -> Result<AnalysisDataset, GatewayError> {
            self.record_call("fetch-analysis");
            match self.analysis.lock().unwrap().clone() {
                Some(v) => AnalysisDataset::from_response(v),
                None => Err(GatewayError::Status {
                    status: 500,
                    detail: None,
                }),
            }
        }

        async fn fetch_chart(&self, name: &str) -> Result<SingleChart, GatewayError> {
            self.record_call(&format!("fetch-chart:{name}"));
            Err(GatewayError::Status {
                status: 500,
                detail: Some("Failed to connect to database".into()),
            })
        }
    }
}
