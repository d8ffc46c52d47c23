use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::StateStore;

/// Storage key the browser client used for the gallery; kept so state
/// exported from it loads unchanged.
pub const HISTORY_STORAGE_KEY: &str = "flux-image-history";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub url: String,
    pub prompt: String,
    /// Creation instant, unix epoch milliseconds.
    pub timestamp: i64,
    pub liked: bool,
}

impl GenerationRecord {
    pub fn new(url: impl Into<String>, prompt: impl Into<String>) -> Self {
        GenerationRecord {
            url: url.into(),
            prompt: prompt.into(),
            timestamp: Utc::now().timestamp_millis(),
            liked: false,
        }
    }
}

/// Newest-first log of completed generations. Records are only ever touched
/// through the operations here; every mutation persists the full list before
/// returning to the caller.
pub struct HistoryStore {
    records: Vec<GenerationRecord>,
    cap: Option<usize>,
    store: Arc<dyn StateStore>,
}

impl HistoryStore {
    /// Reads persisted history through the store. Absent or unparseable
    /// state starts the store empty; startup never fails on bad state.
    pub fn load(store: Arc<dyn StateStore>, cap: Option<usize>) -> Self {
        let mut records = match store.load(HISTORY_STORAGE_KEY) {
            Some(value) => match serde_json::from_value::<Vec<GenerationRecord>>(value) {
                Ok(records) => records,
                Err(err) => {
                    warn!("Stored generation history failed to parse, starting empty: {err}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        if let Some(max) = cap {
            records.truncate(max);
        }
        HistoryStore {
            records,
            cap,
            store,
        }
    }

    pub fn records(&self) -> &[GenerationRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&GenerationRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Prepends a record, evicting from the tail while the configured cap is
    /// exceeded.
    pub fn append(&mut self, record: GenerationRecord) -> Result<()> {
        self.records.insert(0, record);
        if let Some(max) = self.cap {
            self.records.truncate(max);
        }
        self.persist()
    }

    /// Flips the liked flag at `index`. An out-of-range index is a defined
    /// no-op; the return value reports whether a record changed.
    pub fn toggle_liked(&mut self, index: usize) -> Result<bool> {
        match self.records.get_mut(index) {
            Some(record) => {
                record.liked = !record.liked;
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Empties the store and erases the persisted document.
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.store.remove(HISTORY_STORAGE_KEY)
    }

    fn persist(&self) -> Result<()> {
        let value = serde_json::to_value(&self.records)?;
        self.store.save(HISTORY_STORAGE_KEY, &value)
    }
}
