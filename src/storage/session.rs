use super::KeyValueStore;
use crate::model::{FilterCriteria, PokemonRecord, RunStatus, VisibilityFlags};
use serde::de::DeserializeOwned;
use serde::Serialize;

const STATUS_KEY: &str = "status";
const FILTERS_VISIBLE_KEY: &str = "filters-visible";
const RESULTS_VISIBLE_KEY: &str = "results-visible";
const RECORD_SET_KEY: &str = "record-set";
const FILTER_CRITERIA_KEY: &str = "filter-criteria";

pub const SESSION_KEYS: [&str; 5] = [
    STATUS_KEY,
    FILTERS_VISIBLE_KEY,
    RESULTS_VISIBLE_KEY,
    RECORD_SET_KEY,
    FILTER_CRITERIA_KEY,
];

/// In-memory projection of everything that is persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub status: RunStatus,
    pub flags: VisibilityFlags,
    pub records: Vec<PokemonRecord>,
    pub criteria: FilterCriteria,
}

/// One independently persisted piece of state, always written whole.
#[derive(Debug, Clone, Copy)]
pub enum StateSlice<'a> {
    Status(&'a RunStatus),
    FiltersVisible(bool),
    ResultsVisible(bool),
    Records(&'a [PokemonRecord]),
    Criteria(&'a FilterCriteria),
}

/// Write-through mirror of session state into a key-value store.
pub struct SessionPersistence {
    store: Box<dyn KeyValueStore>,
}

impl SessionPersistence {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read every key. Absent or unparsable values fall back to that slice's
    /// default, independently per key; this never fails.
    pub fn hydrate(&self) -> Snapshot {
        Snapshot {
            status: self.read_json(STATUS_KEY).unwrap_or_default(),
            flags: VisibilityFlags {
                filters_shown: self.read_flag(FILTERS_VISIBLE_KEY),
                results_shown: self.read_flag(RESULTS_VISIBLE_KEY),
            },
            records: self.read_json(RECORD_SET_KEY).unwrap_or_default(),
            criteria: self.read_json(FILTER_CRITERIA_KEY).unwrap_or_default(),
        }
    }

    /// Overwrite the key for `slice` with its full current value. Failures are
    /// logged and otherwise swallowed.
    pub fn persist(&mut self, slice: StateSlice<'_>) {
        let written = match slice {
            StateSlice::Status(s) => self.write_json(STATUS_KEY, s),
            StateSlice::FiltersVisible(v) => self.write_raw(FILTERS_VISIBLE_KEY, v.to_string()),
            StateSlice::ResultsVisible(v) => self.write_raw(RESULTS_VISIBLE_KEY, v.to_string()),
            StateSlice::Records(r) => self.write_json(RECORD_SET_KEY, &r),
            StateSlice::Criteria(c) => self.write_json(FILTER_CRITERIA_KEY, c),
        };
        if let Err(e) = written {
            tracing::warn!(error = %e, "failed to persist session state");
        }
    }

    pub fn persist_all(&mut self, snapshot: &Snapshot) {
        self.persist(StateSlice::Status(&snapshot.status));
        self.persist(StateSlice::FiltersVisible(snapshot.flags.filters_shown));
        self.persist(StateSlice::ResultsVisible(snapshot.flags.results_shown));
        self.persist(StateSlice::Records(&snapshot.records));
        self.persist(StateSlice::Criteria(&snapshot.criteria));
    }

    /// Drop every session key; the next hydrate yields defaults.
    pub fn clear(&mut self) {
        for key in SESSION_KEYS {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(key, error = %e, "failed to clear session key");
            }
        }
    }

    /// Raw stored value, for diagnostics and round-trip checks.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.store.get(key).ok().flatten()
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(key, error = %e, "ignoring corrupt session value");
                None
            }
        }
    }

    fn read_flag(&self, key: &str) -> bool {
        match self.raw(key).as_deref() {
            Some("true") => true,
            Some("false") | None => false,
            Some(other) => {
                tracing::debug!(key, value = other, "ignoring corrupt session flag");
                false
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), super::StoreError> {
        let text = serde_json::to_string(value)?;
        self.store.set(key, text)
    }

    fn write_raw(&mut self, key: &str, value: String) -> Result<(), super::StoreError> {
        self.store.set(key, value)
    }
}
