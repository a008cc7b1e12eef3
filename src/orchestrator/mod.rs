//! Application-level orchestration.
//!
//! This module owns the pipeline run lifecycle, the filter query engine and the event
//! loop glue that applies remote continuations. UI/CLI layers call into `App` and never
//! mutate component state directly.

mod app;
pub(crate) mod filter;
mod pipeline;

pub(crate) use app::App;
