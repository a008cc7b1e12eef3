//! Pipeline run controller.
//!
//! `Ready -> Running -> {Succeeded | Failed}`; a new run may start from any state
//! except `Running`. There are no automatic retries.

use super::filter::FilterQueryEngine;
use crate::gateway::{GatewayError, RunReply};
use crate::model::{
    RemoteRequest, RunStatus, FAILURE_TEXT, INTERRUPTED_TEXT, RUNNING_TEXT, SUCCESS_TEXT,
};
use crate::storage::{SessionPersistence, StateSlice};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("a pipeline run is already in progress")]
    AlreadyRunning,
}

#[derive(Debug)]
pub struct PipelineController {
    status: RunStatus,
}

impl PipelineController {
    /// Take over the hydrated status. A persisted `Running` has no request behind it
    /// any more, so it is converted to a failure.
    pub fn restore(status: RunStatus, persistence: &mut SessionPersistence) -> Self {
        let mut ctl = Self { status };
        if ctl.status.is_running() {
            tracing::info!("previous run did not finish before reload");
            ctl.transition(RunStatus::Failed(INTERRUPTED_TEXT.into()), persistence);
        }
        ctl
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn start(
        &mut self,
        filters: &mut FilterQueryEngine,
        persistence: &mut SessionPersistence,
    ) -> Result<RemoteRequest, ControllerError> {
        if self.is_running() {
            tracing::debug!("start rejected: run in progress");
            return Err(ControllerError::AlreadyRunning);
        }
        self.transition(RunStatus::Running(RUNNING_TEXT.into()), persistence);
        filters.hide_all(persistence);
        Ok(RemoteRequest::RunPipeline)
    }

    /// Map the raw run-pipeline outcome onto a transition. Application-level detail
    /// wins over generic messages.
    pub fn on_reply(
        &mut self,
        result: Result<RunReply, GatewayError>,
        filters: &mut FilterQueryEngine,
        persistence: &mut SessionPersistence,
    ) -> Option<RemoteRequest> {
        match result {
            Ok(reply) => {
                let message = reply.detail.unwrap_or_else(|| SUCCESS_TEXT.to_string());
                self.on_remote_success(message, filters, persistence)
            }
            Err(GatewayError::Status { detail, .. }) => {
                let message = detail.unwrap_or_else(|| FAILURE_TEXT.to_string());
                self.on_remote_failure(message, persistence);
                None
            }
            Err(e) => {
                self.on_remote_failure(format!("Error: {e}"), persistence);
                None
            }
        }
    }

    pub fn on_remote_success(
        &mut self,
        message: String,
        filters: &mut FilterQueryEngine,
        persistence: &mut SessionPersistence,
    ) -> Option<RemoteRequest> {
        if !self.is_running() {
            tracing::warn!("ignoring pipeline success with no run in progress");
            return None;
        }
        self.transition(RunStatus::Succeeded(message), persistence);
        Some(filters.show_filters(persistence))
    }

    pub fn on_remote_failure(&mut self, message: String, persistence: &mut SessionPersistence) {
        if !self.is_running() {
            tracing::warn!("ignoring pipeline failure with no run in progress");
            return;
        }
        self.transition(RunStatus::Failed(message), persistence);
    }

    /// Errors from other components surface on the run status channel.
    pub fn report_failure(&mut self, message: String, persistence: &mut SessionPersistence) {
        self.transition(RunStatus::Failed(message), persistence);
    }

    fn transition(&mut self, next: RunStatus, persistence: &mut SessionPersistence) {
        tracing::info!(from = self.status.label(), to = next.label(), message = next.message(), "run status");
        self.status = next;
        persistence.persist(StateSlice::Status(&self.status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VisibilityFlags;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;

    fn setup() -> (PipelineController, FilterQueryEngine, SessionPersistence) {
        let mut p = SessionPersistence::new(Box::new(MemoryStore::new()));
        let ctl = PipelineController::restore(RunStatus::default(), &mut p);
        (ctl, FilterQueryEngine::default(), p)
    }

    #[test]
    fn start_hides_results_and_issues_run() {
        let (mut ctl, mut filters, mut p) = setup();
        filters.show_filters(&mut p);

        assert_eq!(
            ctl.start(&mut filters, &mut p),
            Ok(RemoteRequest::RunPipeline)
        );
        assert_eq!(ctl.status(), &RunStatus::Running(RUNNING_TEXT.into()));
        assert_eq!(filters.flags(), VisibilityFlags::default());
        assert_eq!(p.hydrate().status, RunStatus::Running(RUNNING_TEXT.into()));
    }

    #[test]
    fn start_while_running_is_rejected_without_change() {
        let (mut ctl, mut filters, mut p) = setup();
        ctl.start(&mut filters, &mut p).unwrap();
        let before = ctl.status().clone();

        assert_eq!(
            ctl.start(&mut filters, &mut p),
            Err(ControllerError::AlreadyRunning)
        );
        assert_eq!(ctl.status(), &before);
    }

    #[test]
    fn success_shows_filters_and_refreshes() {
        let (mut ctl, mut filters, mut p) = setup();
        ctl.start(&mut filters, &mut p).unwrap();

        let next = ctl.on_reply(Ok(RunReply { detail: None }), &mut filters, &mut p);
        assert!(matches!(next, Some(RemoteRequest::FilterQuery { .. })));
        assert_eq!(ctl.status(), &RunStatus::Succeeded(SUCCESS_TEXT.into()));
        assert!(filters.flags().filters_shown);
        assert!(p.hydrate().flags.filters_shown);
    }

    #[test]
    fn failures_prefer_server_detail() {
        let (mut ctl, mut filters, mut p) = setup();

        ctl.start(&mut filters, &mut p).unwrap();
        let next = ctl.on_reply(
            Err(GatewayError::Status {
                status: 500,
                detail: Some("Failed to connect to database".into()),
            }),
            &mut filters,
            &mut p,
        );
        assert_eq!(next, None);
        assert_eq!(
            ctl.status(),
            &RunStatus::Failed("Failed to connect to database".into())
        );
        assert!(!filters.flags().filters_shown);

        ctl.start(&mut filters, &mut p).unwrap();
        ctl.on_reply(
            Err(GatewayError::Status {
                status: 502,
                detail: None,
            }),
            &mut filters,
            &mut p,
        );
        assert_eq!(ctl.status(), &RunStatus::Failed(FAILURE_TEXT.into()));

        ctl.start(&mut filters, &mut p).unwrap();
        ctl.on_reply(
            Err(GatewayError::Transport("connection refused".into())),
            &mut filters,
            &mut p,
        );
        assert_eq!(
            ctl.status(),
            &RunStatus::Failed("Error: connection refused".into())
        );
    }

    #[test]
    fn persisted_running_status_becomes_interrupted() {
        let mut p = SessionPersistence::new(Box::new(MemoryStore::new()));
        let ctl = PipelineController::restore(RunStatus::Running(RUNNING_TEXT.into()), &mut p);
        assert_eq!(ctl.status(), &RunStatus::Failed(INTERRUPTED_TEXT.into()));
        assert_eq!(p.hydrate().status, RunStatus::Failed(INTERRUPTED_TEXT.into()));
    }

    #[test]
    fn stray_replies_are_ignored() {
        let (mut ctl, mut filters, mut p) = setup();
        assert_eq!(
            ctl.on_remote_success("late".into(), &mut filters, &mut p),
            None
        );
        assert_eq!(ctl.status(), &RunStatus::default());
    }
}
