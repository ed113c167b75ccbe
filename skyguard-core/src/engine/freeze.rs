//! Freeze detector
//!
//! Locks the model once it has converged, so that a well-calibrated station
//! stops drifting on noisy labels. Convergence means all of:
//!
//! 1. enough samples (`freeze_min_samples`)
//! 2. good recent accuracy (`freeze_min_acc200` over the last 200)
//! 3. at least half of `freeze_history_window` snapshots available
//! 4. over those snapshots, every threshold and every K moved by less than
//!    its own epsilon (largest value minus smallest value)
//!
//! Freezing is terminal. Once `frozen` is set no cycle touches the thresholds,
//! the coefficients or the flag again; only editing the document by hand
//! releases the lock.

use core::fmt;

use chrono::NaiveDateTime;
use log::info;
use serde::{Deserialize, Serialize};

use crate::coefficients::CoefficientSet;
use crate::constants::defaults;
use crate::constants::learning::FREEZE_MIN_HISTORY;
use crate::errors::SkyGuardResult;
use crate::history::HistoryEntry;
use crate::model::COEFFICIENT_COUNT;

/// Freeze settings stored in the coefficient document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreezeSettings {
    /// Master switch
    pub freeze_enabled: bool,
    /// Samples in the training window required to freeze
    pub freeze_min_samples: usize,
    /// 200-sample accuracy required to freeze
    pub freeze_min_acc200: f64,
    /// History snapshots inspected
    pub freeze_history_window: usize,
    /// Allowed drift of each threshold
    pub freeze_eps_thr: f64,
    #[allow(missing_docs)]
    pub freeze_eps_k1: f64,
    #[allow(missing_docs)]
    pub freeze_eps_k2: f64,
    #[allow(missing_docs)]
    pub freeze_eps_k3: f64,
    #[allow(missing_docs)]
    pub freeze_eps_k4: f64,
    #[allow(missing_docs)]
    pub freeze_eps_k5: f64,
    #[allow(missing_docs)]
    pub freeze_eps_k6: f64,
    #[allow(missing_docs)]
    pub freeze_eps_k7: f64,
}

impl Default for FreezeSettings {
    fn default() -> Self {
        let [k1, k2, k3, k4, k5, k6, k7] = defaults::FREEZE_EPS_COEFFICIENTS;
        Self {
            freeze_enabled: true,
            freeze_min_samples: defaults::FREEZE_MIN_SAMPLES,
            freeze_min_acc200: defaults::FREEZE_MIN_ACCURACY,
            freeze_history_window: defaults::FREEZE_HISTORY_WINDOW,
            freeze_eps_thr: defaults::FREEZE_EPS_THRESHOLDS,
            freeze_eps_k1: k1,
            freeze_eps_k2: k2,
            freeze_eps_k3: k3,
            freeze_eps_k4: k4,
            freeze_eps_k5: k5,
            freeze_eps_k6: k6,
            freeze_eps_k7: k7,
        }
    }
}

impl FreezeSettings {
    /// Per-coefficient epsilons, K1 first
    pub fn coefficient_epsilons(&self) -> [f64; COEFFICIENT_COUNT] {
        [
            self.freeze_eps_k1,
            self.freeze_eps_k2,
            self.freeze_eps_k3,
            self.freeze_eps_k4,
            self.freeze_eps_k5,
            self.freeze_eps_k6,
            self.freeze_eps_k7,
        ]
    }

    /// Snapshots required before drift is measured
    pub fn min_history(&self) -> usize {
        FREEZE_MIN_HISTORY.max(self.freeze_history_window / 2)
    }
}

/// Source of recent history snapshots
pub trait HistorySource {
    /// Up to `count` most recent entries, oldest first
    fn recent(&self, count: usize) -> SkyGuardResult<Vec<HistoryEntry>>;
}

impl HistorySource for [HistoryEntry] {
    fn recent(&self, count: usize) -> SkyGuardResult<Vec<HistoryEntry>> {
        let start = self.len().saturating_sub(count);
        Ok(self[start..].to_vec())
    }
}

impl HistorySource for Vec<HistoryEntry> {
    fn recent(&self, count: usize) -> SkyGuardResult<Vec<HistoryEntry>> {
        self.as_slice().recent(count)
    }
}

/// Names of the ten watched parameters, in [`parameter_values`] order
pub const PARAMETER_NAMES: [&str; 10] = [
    "thr_clear", "thr_light", "thr_heavy", "K1", "K2", "K3", "K4", "K5", "K6", "K7",
];

/// Watched parameters of one snapshot: three thresholds then K1..K7
pub fn parameter_values(entry: &HistoryEntry) -> [f64; 10] {
    let mut values = [0.0; 10];
    values[..3].copy_from_slice(&entry.thresholds.to_array());
    values[3..].copy_from_slice(&entry.model.to_array());
    values
}

/// Largest spread (max - min) of each parameter over `entries`
pub fn parameter_spread(entries: &[HistoryEntry]) -> [f64; 10] {
    let mut lo = [f64::INFINITY; 10];
    let mut hi = [f64::NEG_INFINITY; 10];
    for entry in entries {
        for (i, value) in parameter_values(entry).into_iter().enumerate() {
            lo[i] = lo[i].min(value);
            hi[i] = hi[i].max(value);
        }
    }
    if entries.is_empty() {
        return [0.0; 10];
    }
    core::array::from_fn(|i| hi[i] - lo[i])
}

/// Result of one freeze check
#[derive(Debug, Clone, PartialEq)]
pub enum FreezeOutcome {
    /// `freeze_enabled` is false
    Disabled,
    /// The model was already locked
    AlreadyFrozen,
    /// Training window smaller than `freeze_min_samples`
    NeedSamples {
        /// Samples available
        have: usize,
        /// Samples required
        need: usize,
    },
    /// 200-sample accuracy missing or below `freeze_min_acc200`
    AccuracyTooLow {
        /// Measured accuracy
        accuracy: Option<f64>,
        /// Required accuracy
        need: f64,
    },
    /// Fewer snapshots than required
    HistoryTooShort {
        /// Snapshots available
        have: usize,
        /// Snapshots required
        need: usize,
    },
    /// A parameter drifted by at least its epsilon
    StillMoving {
        /// Name of the first offending parameter
        parameter: &'static str,
        /// Its spread over the window
        spread: f64,
        /// Its epsilon
        epsilon: f64,
    },
    /// The model has just been locked
    Frozen {
        /// Lock time
        at: NaiveDateTime,
    },
}

impl FreezeOutcome {
    /// Whether this check locked the model
    pub fn froze(&self) -> bool {
        matches!(self, Self::Frozen { .. })
    }
}

impl fmt::Display for FreezeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Freeze disabled"),
            Self::AlreadyFrozen => write!(f, "Frozen (no updates)"),
            Self::NeedSamples { have, need } => {
                write!(f, "Freeze not ready (need more samples: {have}/{need})")
            }
            Self::AccuracyTooLow { accuracy: Some(acc), need } => {
                write!(f, "Freeze not ready (acc200 {acc:.3} below {need})")
            }
            Self::AccuracyTooLow { accuracy: None, .. } => {
                write!(f, "Freeze not ready (acc200 unavailable)")
            }
            Self::HistoryTooShort { have, need } => {
                write!(f, "Freeze not ready (history too short: {have}/{need})")
            }
            Self::StillMoving { parameter, spread, epsilon } => write!(
                f,
                "Freeze not ready (params still moving: {parameter} spread {spread:.4} >= {epsilon})"
            ),
            Self::Frozen { at } => write!(f, "Frozen (model locked at {})", at.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

/// Evaluate the freeze conditions and lock `set` when they all hold
///
/// `total` is the size of the training window and `accuracy_200` its rolling
/// accuracy after this cycle's sample was appended.
pub fn check_freeze<H: HistorySource + ?Sized>(
    set: &mut CoefficientSet,
    total: usize,
    accuracy_200: Option<f64>,
    history: &H,
    now: NaiveDateTime,
) -> SkyGuardResult<FreezeOutcome> {
    let settings = set.freeze;

    if set.frozen {
        return Ok(FreezeOutcome::AlreadyFrozen);
    }
    if !settings.freeze_enabled {
        return Ok(FreezeOutcome::Disabled);
    }
    if total < settings.freeze_min_samples {
        return Ok(FreezeOutcome::NeedSamples {
            have: total,
            need: settings.freeze_min_samples,
        });
    }
    if !accuracy_200.is_some_and(|acc| acc >= settings.freeze_min_acc200) {
        return Ok(FreezeOutcome::AccuracyTooLow {
            accuracy: accuracy_200,
            need: settings.freeze_min_acc200,
        });
    }

    let entries = history.recent(settings.freeze_history_window)?;
    let need = settings.min_history();
    if entries.len() < need {
        return Ok(FreezeOutcome::HistoryTooShort { have: entries.len(), need });
    }

    let mut epsilons = [settings.freeze_eps_thr; 10];
    epsilons[3..].copy_from_slice(&settings.coefficient_epsilons());

    let spread = parameter_spread(&entries);
    for ((&parameter, &spread), &epsilon) in PARAMETER_NAMES.iter().zip(spread.iter()).zip(epsilons.iter()) {
        // NaN spread fails this test as well
        if !(spread < epsilon) {
            return Ok(FreezeOutcome::StillMoving { parameter, spread, epsilon });
        }
    }

    set.frozen = true;
    set.freeze_timestamp = Some(now);
    info!("Model converged over {} snapshots, freezing", entries.len());
    Ok(FreezeOutcome::Frozen { at: now })
}
