use crate::analysis::Rendering;
use crate::model::{CriteriaEdit, FilterCriteria};
use std::time::Instant;

pub const TAB_PIPELINE: usize = 0;
pub const TAB_ANALYSIS: usize = 1;
pub const TAB_HELP: usize = 2;
pub const TAB_COUNT: usize = 3;

/// Text field currently being typed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    TypeName,
    HpMin,
}

impl EditField {
    pub fn label(self) -> &'static str {
        match self {
            EditField::TypeName => "Type",
            EditField::HpMin => "HP Min",
        }
    }
}

/// View-only state. Everything persisted lives in `App`.
pub struct UiState {
    pub tab: usize,
    pub info: String,
    pub editing: Option<EditField>,
    pub input: String,
    // Set when an analysis response lands; charts reveal relative to it.
    pub analysis_ready_at: Option<Instant>,
    pub chart_offset: usize,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: TAB_PIPELINE,
            info: String::new(),
            editing: None,
            input: String::new(),
            analysis_ready_at: None,
            chart_offset: 0,
        }
    }
}

impl UiState {
    pub fn next_tab(&mut self) {
        self.tab = (self.tab + 1) % TAB_COUNT;
    }

    /// Start editing a field, seeding the buffer with its saved value.
    pub fn begin_edit(&mut self, field: EditField, criteria: &FilterCriteria) {
        self.input = match field {
            EditField::TypeName => criteria.type_name.clone(),
            EditField::HpMin => criteria.hp_min.clone(),
        };
        self.editing = Some(field);
    }

    pub fn push_char(&mut self, c: char) {
        if self.editing.is_some() {
            self.input.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        self.input.pop();
    }

    /// Finish editing and hand back the edit to apply.
    pub fn commit(&mut self) -> Option<CriteriaEdit> {
        let field = self.editing.take()?;
        let value = std::mem::take(&mut self.input);
        Some(match field {
            EditField::TypeName => CriteriaEdit::TypeName(value),
            EditField::HpMin => CriteriaEdit::HpMin(value),
        })
    }

    pub fn cancel(&mut self) {
        self.editing = None;
        self.input.clear();
    }

    pub fn mark_analysis_ready(&mut self, now: Instant) {
        self.analysis_ready_at = Some(now);
        self.chart_offset = 0;
    }

    /// How many charts have passed their reveal delay.
    pub fn revealed_charts(&self, rendering: &Rendering, now: Instant) -> usize {
        let Some(ready_at) = self.analysis_ready_at else {
            return rendering.charts.len();
        };
        let elapsed = now.saturating_duration_since(ready_at);
        rendering
            .charts
            .iter()
            .take_while(|c| c.stagger <= elapsed)
            .count()
    }

    pub fn scroll_charts(&mut self, delta: isize, total: usize) {
        let max = total.saturating_sub(1);
        self.chart_offset = self.chart_offset.saturating_add_signed(delta).min(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{render_all, AnalysisDataset, STAGGER_STEP};
    use serde_json::json;

    #[test]
    fn commit_returns_typed_value_and_leaves_edit_mode() {
        let mut state = UiState::default();
        let criteria = FilterCriteria {
            hp_min: "4".into(),
            ..Default::default()
        };
        state.begin_edit(EditField::HpMin, &criteria);
        state.push_char('5');
        assert_eq!(state.commit(), Some(CriteriaEdit::HpMin("45".into())));
        assert!(state.editing.is_none());
        assert!(state.input.is_empty());
        assert_eq!(state.commit(), None);
    }

    #[test]
    fn cancel_discards_buffer() {
        let mut state = UiState::default();
        state.begin_edit(EditField::TypeName, &FilterCriteria::default());
        state.push_char('x');
        state.cancel();
        assert_eq!(state.commit(), None);
    }

    #[test]
    fn charts_reveal_one_step_apart() {
        let dataset = AnalysisDataset::from_response(json!({"data": {
            "a": {"title": "A", "type": "bar", "data": {"x": 1}},
            "b": {"title": "B", "type": "bar", "data": {"x": 2}},
            "c": {"title": "C", "type": "bar", "data": {"x": 3}},
        }}))
        .unwrap();
        let rendering = render_all(&dataset);
        let start = Instant::now();
        let mut state = UiState::default();
        state.mark_analysis_ready(start);
        assert_eq!(state.revealed_charts(&rendering, start), 1);
        assert_eq!(state.revealed_charts(&rendering, start + STAGGER_STEP), 2);
        assert_eq!(state.revealed_charts(&rendering, start + STAGGER_STEP * 5), 3);
    }

    #[test]
    fn tab_cycles() {
        let mut state = UiState::default();
        for _ in 0..TAB_COUNT {
            state.next_tab();
        }
        assert_eq!(state.tab, TAB_PIPELINE);
    }
}
