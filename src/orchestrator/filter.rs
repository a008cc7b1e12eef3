//! Filter query engine.
//!
//! Owns the filter criteria, the displayed record set and the visibility flags.
//! Every refresh is tagged with a monotonically increasing sequence number; only the
//! response to the most recently issued query may update the record set.

use crate::gateway::GatewayError;
use crate::model::{
    CriteriaEdit, EffectiveQuery, FilterCriteria, PokemonRecord, RemoteRequest, VisibilityFlags,
};
use crate::storage::{SessionPersistence, Snapshot, StateSlice};

/// Trim every field; an `hp_min` that is not a non-negative integer becomes unset.
pub fn normalize(criteria: &FilterCriteria) -> FilterCriteria {
    let hp = criteria.hp_min.trim();
    FilterCriteria {
        type_name: criteria.type_name.trim().to_string(),
        hp_min: if hp.parse::<u32>().is_ok() {
            hp.to_string()
        } else {
            String::new()
        },
        is_evolved: criteria.is_evolved,
    }
}

/// Build the query that is actually transmitted. `is_evolved` is sent only when
/// true; the backend treats absence and `false` the same.
pub fn effective_query(criteria: &FilterCriteria) -> EffectiveQuery {
    let n = normalize(criteria);
    EffectiveQuery {
        hp_min: n.hp_min.parse().ok(),
        type_name: (!n.type_name.is_empty()).then_some(n.type_name),
        is_evolved: n.is_evolved.then_some(true),
    }
}

/// What happened to a filter-query response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Record set replaced; carries the new record count.
    Applied(usize),
    /// A newer query was issued since; the response was dropped.
    Superseded,
    /// The current query failed; the record set is unchanged.
    Failed(String),
}

#[derive(Debug, Default)]
pub struct FilterQueryEngine {
    criteria: FilterCriteria,
    records: Vec<PokemonRecord>,
    flags: VisibilityFlags,
    latest_seq: u64,
}

impl FilterQueryEngine {
    pub fn restore(snapshot: &Snapshot) -> Self {
        Self {
            criteria: snapshot.criteria.clone(),
            records: snapshot.records.clone(),
            flags: snapshot.flags,
            latest_seq: 0,
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn records(&self) -> &[PokemonRecord] {
        &self.records
    }

    pub fn flags(&self) -> VisibilityFlags {
        self.flags
    }

    pub fn effective_query(&self) -> EffectiveQuery {
        effective_query(&self.criteria)
    }

    /// Issue a fresh query for the current criteria, superseding any in flight.
    pub fn refresh(&mut self) -> RemoteRequest {
        self.latest_seq += 1;
        let query = self.effective_query();
        tracing::debug!(seq = self.latest_seq, ?query, "filter refresh issued");
        RemoteRequest::FilterQuery {
            seq: self.latest_seq,
            query,
        }
    }

    /// Apply one form edit. While filters are shown, the edit triggers a refresh.
    pub fn edit(
        &mut self,
        edit: CriteriaEdit,
        persistence: &mut SessionPersistence,
    ) -> Option<RemoteRequest> {
        self.criteria.apply(edit);
        persistence.persist(StateSlice::Criteria(&self.criteria));
        if self.flags.filters_shown {
            Some(self.refresh())
        } else {
            None
        }
    }

    /// Reveal the filter form and load results for the current criteria.
    pub fn show_filters(&mut self, persistence: &mut SessionPersistence) -> RemoteRequest {
        if !self.flags.filters_shown {
            self.flags.filters_shown = true;
            persistence.persist(StateSlice::FiltersVisible(true));
        }
        self.refresh()
    }

    /// Hide everything and drop the record set. Queries still in flight are
    /// invalidated so stale results cannot reappear.
    pub fn hide_all(&mut self, persistence: &mut SessionPersistence) {
        self.flags = VisibilityFlags::default();
        self.records.clear();
        self.latest_seq += 1;
        persistence.persist(StateSlice::FiltersVisible(false));
        persistence.persist(StateSlice::ResultsVisible(false));
        persistence.persist(StateSlice::Records(&self.records));
    }

    /// Back to an empty form with nothing shown.
    pub fn reset(&mut self, persistence: &mut SessionPersistence) {
        self.criteria = FilterCriteria::default();
        persistence.persist(StateSlice::Criteria(&self.criteria));
        self.hide_all(persistence);
    }

    pub fn on_response(
        &mut self,
        seq: u64,
        result: Result<Vec<PokemonRecord>, GatewayError>,
        persistence: &mut SessionPersistence,
    ) -> FilterOutcome {
        if seq != self.latest_seq {
            tracing::debug!(seq, latest = self.latest_seq, "discarding superseded filter response");
            return FilterOutcome::Superseded;
        }
        match result {
            Ok(records) => {
                self.records = records;
                self.flags.results_shown = true;
                persistence.persist(StateSlice::Records(&self.records));
                persistence.persist(StateSlice::ResultsVisible(true));
                FilterOutcome::Applied(self.records.len())
            }
            Err(e) => {
                tracing::warn!(seq, error = %e, "filter query failed");
                let message = match e.detail() {
                    Some(detail) => detail.to_string(),
                    None => format!("Error loading Pokémon: {e}"),
                };
                FilterOutcome::Failed(message)
            }
        }
    }
}
