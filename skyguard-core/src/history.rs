//! Per-cycle parameter history
//!
//! A JSON-lines log with one snapshot per completed cycle. The freeze
//! detector is its only reader.
//!
//! ```json
//! {"K1":100.0,"K2":0.0,...,"acc200":0.84,"frozen":false,"thr_clear":-25.0,...,"timestamp":"2024-03-02T21:15:00","total_samples":812}
//! ```
//!
//! Lines written by first-generation stations use `ts` for the timestamp
//! and are read back unchanged.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::classifier::Thresholds;
use crate::coefficients::CoefficientSet;
use crate::engine::freeze::HistorySource;
use crate::errors::SkyGuardResult;
use crate::model::ModelCoefficients;

/// One history line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the cycle ran
    #[serde(alias = "ts")]
    pub timestamp: NaiveDateTime,
    /// Size of the training window
    pub total_samples: usize,
    /// Rolling 200-sample accuracy
    #[serde(rename = "acc200")]
    pub accuracy_200: Option<f64>,
    /// K1..K7 after the cycle
    #[serde(flatten)]
    pub model: ModelCoefficients,
    /// Thresholds after the cycle
    #[serde(flatten)]
    pub thresholds: Thresholds,
    /// Lock state after the cycle
    #[serde(default)]
    pub frozen: bool,
}

impl HistoryEntry {
    /// Snapshot of `set` after a cycle
    pub fn snapshot(
        timestamp: NaiveDateTime,
        set: &CoefficientSet,
        total_samples: usize,
        accuracy_200: Option<f64>,
    ) -> Self {
        Self {
            timestamp,
            total_samples,
            accuracy_200,
            model: set.model,
            thresholds: set.thresholds,
            frozen: set.frozen,
        }
    }
}

/// Append-only JSON-lines history
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    /// Log backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry
    pub fn append(&self, entry: &HistoryEntry) -> SkyGuardResult<()> {
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// The last `count` readable entries, oldest first
    ///
    /// Unreadable lines are skipped; a missing file has no entries.
    pub fn read_last(&self, count: usize) -> SkyGuardResult<Vec<HistoryEntry>> {
        if count == 0 || !self.path.exists() {
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&self.path)?;
        let mut skipped = 0usize;
        let mut entries: Vec<HistoryEntry> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(_) => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        if skipped > 0 {
            warn!("{}: skipped {} unreadable lines", self.path.display(), skipped);
        }

        let excess = entries.len().saturating_sub(count);
        entries.drain(..excess);
        Ok(entries)
    }
}

impl HistorySource for HistoryLog {
    fn recent(&self, count: usize) -> SkyGuardResult<Vec<HistoryEntry>> {
        self.read_last(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_uses_flat_keys() {
        let set = CoefficientSet::default();
        let stamp = "2024-03-02T21:15:00".parse().unwrap();
        let json = serde_json::to_value(HistoryEntry::snapshot(stamp, &set, 12, None)).unwrap();

        assert_eq!(json["K1"], 100.0);
        assert_eq!(json["thr_heavy"], -12.0);
        assert_eq!(json["acc200"], serde_json::Value::Null);
        assert_eq!(json["total_samples"], 12);
        assert_eq!(json["timestamp"], "2024-03-02T21:15:00");
    }

    #[test]
    fn legacy_line_is_readable() {
        let line = r#"{"ts": "2024-01-01T10:00:00", "total_samples": 5, "acc200": 0.8,
            "K1": 99.0, "K2": 1.0, "K3": 0.0, "K4": 0.0, "K5": 0.0, "K6": 0.0, "K7": 0.0,
            "thr_clear": -25.0, "thr_light": -18.0, "thr_heavy": -12.0, "frozen": false}"#;
        let entry: HistoryEntry = serde_json::from_str(line).unwrap();
        assert_eq!(entry.model.k1, 99.0);
        assert_eq!(entry.accuracy_200, Some(0.8));
    }
}
