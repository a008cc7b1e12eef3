//! Application state and the single event loop that mutates it.
//!
//! All state lives in `App` and is mutated from one task only. Remote operations run
//! as spawned tasks; their continuations come back as `RemoteEvent`s over an
//! unbounded channel and are applied by `App::handle`.

use super::filter::{FilterOutcome, FilterQueryEngine};
use super::pipeline::{ControllerError, PipelineController};
use crate::analysis::AnalysisRenderer;
use crate::gateway::RemoteGateway;
use crate::model::{
    CriteriaEdit, FilterCriteria, PokemonRecord, RemoteEvent, RemoteRequest, RunStatus,
    VisibilityFlags,
};
use crate::storage::{SessionPersistence, Snapshot};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Turns issued requests into gateway calls on the runtime.
#[derive(Clone)]
pub struct Dispatcher {
    gateway: Arc<dyn RemoteGateway>,
    event_tx: UnboundedSender<RemoteEvent>,
}

impl Dispatcher {
    pub fn new(gateway: Arc<dyn RemoteGateway>) -> (Self, UnboundedReceiver<RemoteEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self { gateway, event_tx }, event_rx)
    }

    pub fn dispatch(&self, request: RemoteRequest) {
        let gateway = self.gateway.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let ev = match request {
                RemoteRequest::RunPipeline => {
                    RemoteEvent::PipelineFinished(gateway.run_pipeline().await)
                }
                RemoteRequest::FilterQuery { seq, query } => RemoteEvent::FilterFinished {
                    seq,
                    result: gateway.filter_query(&query).await,
                },
                RemoteRequest::FetchAnalysis { seq } => RemoteEvent::AnalysisFinished {
                    seq,
                    result: gateway.fetch_analysis().await,
                },
                RemoteRequest::FetchChart { seq, name } => RemoteEvent::ChartFinished {
                    seq,
                    result: gateway.fetch_chart(&name).await,
                },
            };
            // The receiver is gone only when the app is shutting down.
            let _ = event_tx.send(ev);
        });
    }
}

pub struct App {
    persistence: SessionPersistence,
    pipeline: PipelineController,
    filters: FilterQueryEngine,
    analysis: AnalysisRenderer,
    dispatcher: Dispatcher,
    in_flight: usize,
}

impl App {
    /// Hydrate session state and resume: if filters were visible before the reload,
    /// results are refreshed right away.
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        mut persistence: SessionPersistence,
    ) -> (Self, UnboundedReceiver<RemoteEvent>) {
        let snapshot = persistence.hydrate();
        let pipeline = PipelineController::restore(snapshot.status.clone(), &mut persistence);
        let filters = FilterQueryEngine::restore(&snapshot);
        let (dispatcher, event_rx) = Dispatcher::new(gateway);
        let mut app = Self {
            persistence,
            pipeline,
            filters,
            analysis: AnalysisRenderer::new(),
            dispatcher,
            in_flight: 0,
        };
        if app.filters.flags().filters_shown {
            let req = app.filters.refresh();
            app.issue(req);
        }
        (app, event_rx)
    }

    pub fn status(&self) -> &RunStatus {
        self.pipeline.status()
    }

    pub fn flags(&self) -> VisibilityFlags {
        self.filters.flags()
    }

    pub fn records(&self) -> &[PokemonRecord] {
        self.filters.records()
    }

    pub fn criteria(&self) -> &FilterCriteria {
        self.filters.criteria()
    }

    pub fn analysis(&self) -> &AnalysisRenderer {
        &self.analysis
    }

    #[cfg(test)]
    pub fn persistence(&self) -> &SessionPersistence {
        &self.persistence
    }

    /// No remote call is outstanding.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    pub fn start_pipeline(&mut self) -> Result<(), ControllerError> {
        let req = self
            .pipeline
            .start(&mut self.filters, &mut self.persistence)?;
        self.issue(req);
        Ok(())
    }

    pub fn edit_filter(&mut self, edit: CriteriaEdit) {
        if let Some(req) = self.filters.edit(edit, &mut self.persistence) {
            self.issue(req);
        }
    }

    pub fn request_analysis(&mut self) {
        let req = self.analysis.request_analysis();
        self.issue(req);
    }

    pub fn request_chart(&mut self, name: &str) -> Result<(), String> {
        let req = self.analysis.request_chart(name)?;
        self.issue(req);
        Ok(())
    }

    /// Current in-memory state in its persisted shape.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.pipeline.status().clone(),
            flags: self.filters.flags(),
            records: self.filters.records().to_vec(),
            criteria: self.filters.criteria().clone(),
        }
    }

    /// Forget the session: every key is cleared and in-memory state goes back to
    /// defaults. Refused while a run is in progress.
    pub fn reset(&mut self) -> Result<(), ControllerError> {
        if self.pipeline.is_running() {
            return Err(ControllerError::AlreadyRunning);
        }
        self.persistence.clear();
        self.pipeline = PipelineController::restore(RunStatus::default(), &mut self.persistence);
        self.filters.reset(&mut self.persistence);
        self.analysis.reset();
        let snapshot = self.snapshot();
        self.persistence.persist_all(&snapshot);
        Ok(())
    }

    /// Apply one remote continuation.
    pub fn handle(&mut self, ev: RemoteEvent) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match ev {
            RemoteEvent::PipelineFinished(result) => {
                if let Some(req) =
                    self.pipeline
                        .on_reply(result, &mut self.filters, &mut self.persistence)
                {
                    self.issue(req);
                }
            }
            RemoteEvent::FilterFinished { seq, result } => {
                match self.filters.on_response(seq, result, &mut self.persistence) {
                    FilterOutcome::Applied(n) => tracing::debug!(seq, records = n, "filter applied"),
                    FilterOutcome::Superseded => {}
                    FilterOutcome::Failed(message) => {
                        self.pipeline.report_failure(message, &mut self.persistence)
                    }
                }
            }
            RemoteEvent::AnalysisFinished { seq, result } => {
                self.analysis.on_analysis(seq, result);
            }
            RemoteEvent::ChartFinished { seq, result } => {
                self.analysis.on_chart(seq, result);
            }
        }
    }

    /// Process continuations until nothing is in flight.
    pub async fn settle(&mut self, event_rx: &mut UnboundedReceiver<RemoteEvent>) {
        while !self.is_idle() {
            match event_rx.recv().await {
                Some(ev) => self.handle(ev),
                None => break,
            }
        }
    }

    fn issue(&mut self, req: RemoteRequest) {
        self.in_flight += 1;
        self.dispatcher.dispatch(req);
    }
}
