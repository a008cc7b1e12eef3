use super::{GatewayError, RemoteGateway, RunReply};
use crate::analysis::{AnalysisDataset, SingleChart};
use crate::model::{ClientConfig, EffectiveQuery, PokemonRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;

const RUN_PIPELINE_PATH: &str = "pokemon/etl/run-pipeline";
const FILTER_PATH: &str = "pokemon/filter_pokemons";
const ANALYSIS_PATH: &str = "pokemon/analysis";

/// reqwest-backed gateway talking to the FastAPI backend.
#[derive(Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        Url::parse(&cfg.base_url).with_context(|| format!("invalid base url {}", cfg.base_url))?;
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| GatewayError::Transport(format!("invalid url: {e}")))
    }

    async fn json_or_status<T: DeserializeOwned>(resp: Response) -> Result<T, GatewayError> {
        let status = resp.status();
        if !status.is_success() {
            let detail = resp
                .json::<RunReply>()
                .await
                .ok()
                .and_then(|r| r.detail);
            return Err(GatewayError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

fn transport(e: reqwest::Error) -> GatewayError {
    GatewayError::Transport(e.to_string())
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn run_pipeline(&self) -> Result<RunReply, GatewayError> {
        let url = self.endpoint(RUN_PIPELINE_PATH)?;
        tracing::debug!(%url, "issuing run-pipeline");
        let resp = self.http.post(url).send().await.map_err(transport)?;
        Self::json_or_status(resp).await
    }

    async fn filter_query(
        &self,
        query: &EffectiveQuery,
    ) -> Result<Vec<PokemonRecord>, GatewayError> {
        let mut url = self.endpoint(FILTER_PATH)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query.to_query_pairs() {
                pairs.append_pair(k, &v);
            }
        }
        tracing::debug!(%url, "issuing filter-query");
        let resp = self.http.get(url).send().await.map_err(transport)?;
        Self::json_or_status(resp).await
    }

    async fn fetch_analysis(&self) -> Result<AnalysisDataset, GatewayError> {
        let url = self.endpoint(ANALYSIS_PATH)?;
        tracing::debug!(%url, "issuing fetch-analysis");
        let resp = self.http.get(url).send().await.map_err(transport)?;
        let body: serde_json::Value = Self::json_or_status(resp).await?;
        AnalysisDataset::from_response(body)
    }

    async fn fetch_chart(&self, name: &str) -> Result<SingleChart, GatewayError> {
        let url = self.endpoint(&format!("{ANALYSIS_PATH}/{name}"))?;
        tracing::debug!(%url, "issuing fetch-chart");
        let resp = self.http.get(url).send().await.map_err(transport)?;
        Self::json_or_status(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cfg(base: &str) -> ClientConfig {
        ClientConfig {
            base_url: base.into(),
            timeout: Duration::from_secs(1),
            user_agent: "test".into(),
            session_file: "session.json".into(),
        }
    }

    #[test]
    fn endpoints_ignore_trailing_slash() {
        let g = HttpGateway::new(&cfg("http://localhost:8000/")).unwrap();
        assert_eq!(
            g.endpoint(RUN_PIPELINE_PATH).unwrap().as_str(),
            "http://localhost:8000/pokemon/etl/run-pipeline"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(HttpGateway::new(&cfg("not a url")).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let g = HttpGateway::new(&cfg("http://127.0.0.1:9")).unwrap();
        let err = g.run_pipeline().await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert!(err.detail().is_none());
    }
}
