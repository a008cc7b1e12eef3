//! Analysis dataset and chart specification transforms.
//!
//! The backend returns a mapping of chart id to `{ title, type, data }`. Each entry is
//! parsed independently and mapped to a rendering specification by one pure function
//! per chart kind. A malformed entry only affects itself.

use crate::gateway::GatewayError;
use crate::model::RemoteRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Radial axis headroom above the largest series value.
pub const RADAR_HEADROOM: f64 = 1.2;
/// Presentation-only delay between consecutive charts.
pub const STAGGER_STEP: Duration = Duration::from_millis(100);

/// Charts the backend can serve individually.
pub const KNOWN_CHARTS: [&str; 6] = [
    "pokemon_stats",
    "type_distribution",
    "abilities_frequency",
    "moves_frequency",
    "evolution_distribution",
    "type_combination",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChartKind {
    Radar,
    Pie,
    Bar,
    Unknown(String),
}

impl From<String> for ChartKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "radar" => ChartKind::Radar,
            "pie" => ChartKind::Pie,
            "bar" => ChartKind::Bar,
            _ => ChartKind::Unknown(s),
        }
    }
}

impl From<ChartKind> for String {
    fn from(k: ChartKind) -> Self {
        match k {
            ChartKind::Radar => "radar".into(),
            ChartKind::Pie => "pie".into(),
            ChartKind::Bar => "bar".into(),
            ChartKind::Unknown(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("chart entry is not an object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("series value for `{0}` is not a number")]
    NotANumber(String),
    #[error("empty series")]
    EmptySeries,
    #[error("unsupported chart kind `{0}`")]
    UnknownKind(String),
}

/// A named statistical series tagged with its target visualization.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub kind: ChartKind,
    /// Label/value pairs in server order.
    pub series: Vec<(String, f64)>,
}

impl ChartSpec {
    fn from_parts(title: String, kind: ChartKind, data: &Value) -> Result<Self, ChartError> {
        let obj = data.as_object().ok_or(ChartError::MissingField("data"))?;
        let series = obj
            .iter()
            .map(|(k, v)| {
                v.as_f64()
                    .map(|n| (k.clone(), n))
                    .ok_or_else(|| ChartError::NotANumber(k.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            title,
            kind,
            series,
        })
    }

    /// Parse one `{ title, type, data }` entry of the analysis response.
    pub fn from_value(v: &Value) -> Result<Self, ChartError> {
        let obj = v.as_object().ok_or(ChartError::NotAnObject)?;
        let title = obj
            .get("title")
            .and_then(Value::as_str)
            .ok_or(ChartError::MissingField("title"))?
            .to_string();
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .map(|s| ChartKind::from(s.to_string()))
            .ok_or(ChartError::MissingField("type"))?;
        let data = obj.get("data").ok_or(ChartError::MissingField("data"))?;
        Self::from_parts(title, kind, data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetEntry {
    pub id: String,
    pub chart: Result<ChartSpec, ChartError>,
}

/// Full response of the analysis endpoint; immutable once received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisDataset {
    pub entries: Vec<DatasetEntry>,
}

impl AnalysisDataset {
    /// Parse the `{ "status": .., "data": { id: chart, .. } }` envelope.
    ///
    /// Only a missing or non-object `data` rejects the whole dataset; individual
    /// malformed charts are kept as errors so the rest still render.
    pub fn from_response(body: Value) -> Result<Self, GatewayError> {
        let data = body
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| GatewayError::Malformed("analysis response has no `data` object".into()))?;
        let entries = data
            .iter()
            .map(|(id, v)| DatasetEntry {
                id: id.clone(),
                chart: ChartSpec::from_value(v),
            })
            .collect();
        Ok(Self { entries })
    }
}

/// Response of the single-chart endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleChart {
    pub graph_name: String,
    pub chart_type: ChartKind,
    pub data: Value,
}

impl SingleChart {
    pub fn into_spec(self) -> Result<(String, ChartSpec), ChartError> {
        let title = self.graph_name.clone();
        let spec = ChartSpec::from_parts(title, self.chart_type, &self.data)?;
        Ok((self.graph_name, spec))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarAxis {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarEntry {
    pub label: String,
    pub value: f64,
}

/// Data-to-spec output for one chart; drawing is up to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChartRender {
    Radar {
        axes: Vec<RadarAxis>,
        range: (f64, f64),
    },
    Pie {
        slices: Vec<Slice>,
    },
    Bar {
        bars: Vec<BarEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedChart {
    pub id: String,
    pub title: String,
    #[serde(with = "humantime_serde")]
    pub stagger: Duration,
    pub render: ChartRender,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedChart {
    pub id: String,
    pub reason: ChartError,
}

/// Result of rendering a whole dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendering {
    pub charts: Vec<RenderedChart>,
    pub skipped: Vec<SkippedChart>,
}

/// "special-attack" -> "SPECIAL ATTACK"
pub fn radar_label(key: &str) -> String {
    key.replace('-', " ").to_uppercase()
}

/// "water" -> "Water"; only the first character changes.
pub fn pie_label(key: &str) -> String {
    capitalize_first(key)
}

/// "special-attack" -> "Special Attack"
pub fn bar_label(key: &str) -> String {
    key.replace('-', " ")
        .split(' ')
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn radar(series: &[(String, f64)]) -> ChartRender {
    let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
    let max = crate::metrics::max_value(&values).unwrap_or(0.0);
    ChartRender::Radar {
        axes: series
            .iter()
            .map(|(k, v)| RadarAxis {
                label: radar_label(k),
                value: *v,
            })
            .collect(),
        range: (0.0, max * RADAR_HEADROOM),
    }
}

pub fn pie(series: &[(String, f64)]) -> ChartRender {
    ChartRender::Pie {
        slices: series
            .iter()
            .map(|(k, v)| Slice {
                label: pie_label(k),
                value: *v,
            })
            .collect(),
    }
}

pub fn bar(series: &[(String, f64)]) -> ChartRender {
    ChartRender::Bar {
        bars: series
            .iter()
            .map(|(k, v)| BarEntry {
                label: bar_label(k),
                value: *v,
            })
            .collect(),
    }
}

/// Map a single chart to its rendering specification.
pub fn render_chart(spec: &ChartSpec) -> Result<ChartRender, ChartError> {
    if spec.series.is_empty() {
        return Err(ChartError::EmptySeries);
    }
    match &spec.kind {
        ChartKind::Radar => Ok(radar(&spec.series)),
        ChartKind::Pie => Ok(pie(&spec.series)),
        ChartKind::Bar => Ok(bar(&spec.series)),
        ChartKind::Unknown(k) => Err(ChartError::UnknownKind(k.clone())),
    }
}

/// Render every chart of a dataset; a failing chart is skipped, never fatal.
pub fn render_all(dataset: &AnalysisDataset) -> Rendering {
    let mut out = Rendering::default();
    for entry in &dataset.entries {
        let rendered = entry
            .chart
            .as_ref()
            .map_err(|e| e.clone())
            .and_then(|spec| render_chart(spec).map(|r| (spec.title.clone(), r)));
        match rendered {
            Ok((title, render)) => {
                let stagger = STAGGER_STEP * out.charts.len() as u32;
                out.charts.push(RenderedChart {
                    id: entry.id.clone(),
                    title,
                    stagger,
                    render,
                });
            }
            Err(reason) => {
                tracing::warn!(chart = %entry.id, %reason, "skipping chart");
                out.skipped.push(SkippedChart {
                    id: entry.id.clone(),
                    reason,
                });
            }
        }
    }
    out
}

/// Lifecycle of one analysis request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AnalysisState {
    #[default]
    Idle,
    Loading,
    Ready(Rendering),
    Failed(String),
}

/// Owns the analysis dataset for the lifetime of one request. Only the response to
/// the most recent request is applied.
#[derive(Debug, Default)]
pub struct AnalysisRenderer {
    state: AnalysisState,
    dataset: Option<AnalysisDataset>,
    latest_seq: u64,
}

impl AnalysisRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn dataset(&self) -> Option<&AnalysisDataset> {
        self.dataset.as_ref()
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    fn begin(&mut self) -> u64 {
        self.latest_seq += 1;
        self.state = AnalysisState::Loading;
        self.dataset = None;
        self.latest_seq
    }

    /// Back to idle. Requests still in flight are invalidated.
    pub fn reset(&mut self) {
        self.latest_seq += 1;
        self.state = AnalysisState::Idle;
        self.dataset = None;
    }

    pub fn request_analysis(&mut self) -> RemoteRequest {
        RemoteRequest::FetchAnalysis { seq: self.begin() }
    }

    /// Ask for one named chart. Unknown names are rejected without a request.
    pub fn request_chart(&mut self, name: &str) -> Result<RemoteRequest, String> {
        if !KNOWN_CHARTS.contains(&name) {
            return Err(format!(
                "Invalid graph name. Valid options: {}",
                KNOWN_CHARTS.join(", ")
            ));
        }
        Ok(RemoteRequest::FetchChart {
            seq: self.begin(),
            name: name.to_string(),
        })
    }

    fn is_current(&self, seq: u64) -> bool {
        if seq != self.latest_seq {
            tracing::debug!(
                seq,
                latest = self.latest_seq,
                "discarding superseded analysis response"
            );
            return false;
        }
        true
    }

    /// Apply a full-analysis response. Returns false when it was superseded.
    pub fn on_analysis(&mut self, seq: u64, result: Result<AnalysisDataset, GatewayError>) -> bool {
        if !self.is_current(seq) {
            return false;
        }
        self.apply_dataset(result);
        true
    }

    /// Apply a single-chart response. Returns false when it was superseded.
    pub fn on_chart(&mut self, seq: u64, result: Result<SingleChart, GatewayError>) -> bool {
        if !self.is_current(seq) {
            return false;
        }
        match result {
            Ok(single) => {
                let id = single.graph_name.clone();
                let dataset = AnalysisDataset {
                    entries: vec![DatasetEntry {
                        id,
                        chart: single.into_spec().map(|(_, spec)| spec),
                    }],
                };
                self.apply_dataset(Ok(dataset));
            }
            Err(e) => self.fail(&e),
        }
        true
    }

    fn apply_dataset(&mut self, result: Result<AnalysisDataset, GatewayError>) {
        match result {
            Ok(dataset) => {
                let rendering = render_all(&dataset);
                tracing::info!(
                    charts = rendering.charts.len(),
                    skipped = rendering.skipped.len(),
                    "analysis rendered"
                );
                self.state = AnalysisState::Ready(rendering);
                self.dataset = Some(dataset);
            }
            Err(e) => self.fail(&e),
        }
    }

    fn fail(&mut self, e: &GatewayError) {
        let message = match (e.detail(), e) {
            (Some(d), _) => d.to_string(),
            (None, GatewayError::Transport(cause)) => format!("Error: {cause}"),
            (None, _) => "Failed to generate analysis".to_string(),
        };
        tracing::warn!(error = %e, "analysis request failed");
        self.state = AnalysisState::Failed(message);
        self.dataset = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spec(kind: ChartKind, series: &[(&str, f64)]) -> ChartSpec {
        ChartSpec {
            title: "t".into(),
            kind,
            series: series.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn radar_uppercases_axes_and_adds_headroom() {
        let s = spec(
            ChartKind::Radar,
            &[("hp", 45.0), ("attack", 49.0), ("defense", 49.0)],
        );
        let ChartRender::Radar { axes, range } = render_chart(&s).unwrap() else {
            panic!("expected radar");
        };
        let labels: Vec<_> = axes.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["HP", "ATTACK", "DEFENSE"]);
        assert_eq!(range.0, 0.0);
        assert!((range.1 - 58.8).abs() < 1e-9);
    }

    #[test]
    fn radar_labels_replace_every_hyphen() {
        assert_eq!(radar_label("special-attack"), "SPECIAL ATTACK");
        assert_eq!(radar_label("a-b-c"), "A B C");
    }

    #[test]
    fn pie_keeps_values_and_capitalizes_first_letter() {
        let s = spec(ChartKind::Pie, &[("water", 3.0), ("fire", 2.0)]);
        assert_eq!(
            render_chart(&s).unwrap(),
            ChartRender::Pie {
                slices: vec![
                    Slice {
                        label: "Water".into(),
                        value: 3.0
                    },
                    Slice {
                        label: "Fire".into(),
                        value: 2.0
                    },
                ]
            }
        );
        assert_eq!(pie_label("not-evolved"), "Not-evolved");
    }

    #[test]
    fn bar_title_cases_each_word_in_order() {
        let s = spec(
            ChartKind::Bar,
            &[("overgrow", 3.0), ("solar-power", 1.0), ("Single Type", 7.0)],
        );
        let ChartRender::Bar { bars } = render_chart(&s).unwrap() else {
            panic!("expected bar");
        };
        let labels: Vec<_> = bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Overgrow", "Solar Power", "Single Type"]);
        assert_eq!(bars[2].value, 7.0);
    }

    #[test]
    fn empty_series_and_unknown_kind_do_not_render() {
        assert_eq!(
            render_chart(&spec(ChartKind::Bar, &[])),
            Err(ChartError::EmptySeries)
        );
        assert_eq!(
            render_chart(&spec(ChartKind::Unknown("heatmap".into()), &[("a", 1.0)])),
            Err(ChartError::UnknownKind("heatmap".into()))
        );
    }

    fn sample_response() -> Value {
        json!({
            "status": "success",
            "data": {
                "pokemon_stats": {"title": "Average Pokémon Stats", "type": "radar",
                                  "data": {"hp": 45, "attack": 49}},
                "mystery": {"title": "Mystery", "type": "heatmap", "data": {"x": 1}},
                "type_distribution": {"title": "Type Distribution", "type": "pie",
                                      "data": {"water": 3, "fire": 2}},
                "broken": {"title": "Broken", "type": "bar", "data": {"x": "many"}},
                "type_combination": {"title": "Type Combination Distribution", "type": "bar",
                                     "data": {"Single Type": 6, "Dual Type": 4}}
            }
        })
    }

    #[test]
    fn unknown_and_malformed_charts_are_isolated() {
        let dataset = AnalysisDataset::from_response(sample_response()).unwrap();
        assert_eq!(dataset.entries.len(), 5);

        let rendering = render_all(&dataset);
        let ids: Vec<_> = rendering.charts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["pokemon_stats", "type_distribution", "type_combination"]
        );
        assert_eq!(rendering.skipped.len(), 2);
        assert_eq!(
            rendering.skipped[0].reason,
            ChartError::UnknownKind("heatmap".into())
        );
        assert_eq!(
            rendering.skipped[1].reason,
            ChartError::NotANumber("x".into())
        );
        assert_eq!(rendering.charts[2].stagger, Duration::from_millis(200));
    }

    #[test]
    fn rendering_is_deterministic() {
        let dataset = AnalysisDataset::from_response(sample_response()).unwrap();
        assert_eq!(render_all(&dataset), render_all(&dataset));
    }

    #[test]
    fn response_without_data_is_rejected_whole() {
        let err = AnalysisDataset::from_response(json!({"status": "success"})).unwrap_err();
        assert!(matches!(err, GatewayError::Malformed(_)));
    }

    #[test]
    fn renderer_reports_failures_without_partial_dataset() {
        let mut r = AnalysisRenderer::new();
        assert_eq!(r.request_analysis(), RemoteRequest::FetchAnalysis { seq: 1 });
        assert_eq!(r.state(), &AnalysisState::Loading);

        r.on_analysis(1, Err(GatewayError::Status {
            status: 500,
            detail: None,
        }));
        assert_eq!(
            r.state(),
            &AnalysisState::Failed("Failed to generate analysis".into())
        );
        assert!(r.dataset().is_none());

        r.request_analysis();
        r.on_analysis(2, Err(GatewayError::Transport("connection refused".into())));
        assert_eq!(
            r.state(),
            &AnalysisState::Failed("Error: connection refused".into())
        );
    }

    #[test]
    fn single_chart_requests_validate_the_name() {
        let mut r = AnalysisRenderer::new();
        assert!(r.request_chart("nope").is_err());
        assert_eq!(r.state(), &AnalysisState::Idle);
        assert_eq!(
            r.request_chart("moves_frequency").unwrap(),
            RemoteRequest::FetchChart {
                seq: 1,
                name: "moves_frequency".into()
            }
        );

        r.on_chart(1, Ok(SingleChart {
            graph_name: "moves_frequency".into(),
            chart_type: ChartKind::Bar,
            data: json!({"tackle": 8, "vine-whip": 2}),
        }));
        let AnalysisState::Ready(rendering) = r.state() else {
            panic!("expected ready");
        };
        assert_eq!(rendering.charts.len(), 1);
        assert_eq!(
            rendering.charts[0].render,
            ChartRender::Bar {
                bars: vec![
                    BarEntry {
                        label: "Tackle".into(),
                        value: 8.0
                    },
                    BarEntry {
                        label: "Vine Whip".into(),
                        value: 2.0
                    },
                ]
            }
        );
    }

    #[test]
    fn superseded_analysis_response_is_dropped() {
        let mut r = AnalysisRenderer::new();
        let RemoteRequest::FetchAnalysis { seq: full } = r.request_analysis() else {
            panic!("expected analysis request");
        };
        let Ok(RemoteRequest::FetchChart { seq: single, .. }) = r.request_chart("moves_frequency")
        else {
            panic!("expected chart request");
        };

        // The chart answers first, then the older full analysis arrives late.
        assert!(r.on_chart(
            single,
            Ok(SingleChart {
                graph_name: "moves_frequency".into(),
                chart_type: ChartKind::Bar,
                data: json!({"tackle": 8}),
            })
        ));
        let dataset = AnalysisDataset::from_response(sample_response()).unwrap();
        assert!(!r.on_analysis(full, Ok(dataset)));

        let AnalysisState::Ready(rendering) = r.state() else {
            panic!("expected ready");
        };
        assert_eq!(rendering.charts.len(), 1);
        assert_eq!(rendering.charts[0].id, "moves_frequency");
    }

    #[test]
    fn reset_invalidates_in_flight_request() {
        let mut r = AnalysisRenderer::new();
        let RemoteRequest::FetchAnalysis { seq } = r.request_analysis() else {
            panic!("expected analysis request");
        };
        r.reset();
        assert!(!r.on_analysis(seq, Err(GatewayError::Transport("late".into()))));
        assert_eq!(r.state(), &AnalysisState::Idle);
    }
}
