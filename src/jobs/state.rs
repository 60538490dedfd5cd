//! Single-flight gate and persisted discovery record
//!
//! At most one crawl runs at a time. [`JobState::try_begin`] hands out an
//! RAII guard when the gate is free; dropping the guard releases it, so a
//! panicking or early-returning runner never wedges the system.
//!
//! The most recent discovery result is persisted to a JSON file so it
//! survives restarts. Loading is tolerant: a missing or malformed file means
//! "no previous discovery", never a startup failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Outcome of the most recent completed discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LastDiscovery {
    #[serde(deserialize_with = "number_or_string")]
    pub pages_found: usize,
    pub timestamp: DateTime<Utc>,
    pub start_url: String,
}

/// Older state files stored the count as a JSON string; accept both.
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(usize),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Default)]
struct Inner {
    running: bool,
    last: Option<LastDiscovery>,
}

#[derive(Debug)]
pub struct JobState {
    inner: Mutex<Inner>,
    state_path: PathBuf,
}

impl JobState {
    /// Creates the state, loading any previously persisted discovery record.
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let last = load_record(&state_path);
        Self {
            inner: Mutex::new(Inner {
                running: false,
                last,
            }),
            state_path,
        }
    }

    /// Claims the gate. Returns `None` when a job is already running.
    pub fn try_begin(self: &Arc<Self>) -> Option<JobGuard> {
        let mut inner = self.inner.lock().unwrap();
        if inner.running {
            return None;
        }
        inner.running = true;
        Some(JobGuard {
            state: Arc::clone(self),
        })
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    pub fn last_discovery(&self) -> Option<LastDiscovery> {
        self.inner.lock().unwrap().last.clone()
    }

    /// Records a discovery outcome and persists it.
    ///
    /// A persistence failure is logged but does not fail the run; the
    /// in-memory record is already updated.
    pub fn set_last_discovery(&self, record: LastDiscovery) {
        self.inner.lock().unwrap().last = Some(record.clone());
        match serde_json::to_string_pretty(&record) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.state_path, json) {
                    tracing::warn!(
                        path = %self.state_path.display(),
                        error = %e,
                        "failed to persist discovery record"
                    );
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize discovery record"),
        }
    }
}

fn load_record(path: &Path) -> Option<LastDiscovery> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return None,
    };
    match serde_json::from_str(&contents) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "ignoring malformed discovery record"
            );
            None
        }
    }
}

/// Holds the single-flight gate; dropping it releases the gate.
#[derive(Debug)]
pub struct JobGuard {
    state: Arc<JobState>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.state.inner.lock().unwrap().running = false;
    }
}
