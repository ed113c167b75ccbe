//! Online learning engine
//!
//! One labelled cycle runs the phases strictly in order:
//!
//! ```text
//! Phase 1 (thresholds) -> Phase 2 (K1, K2) -> Phase 3 (K3..K7) -> freeze check
//! ```
//!
//! Phase 1 runs on every cycle. Phases 2 and 3 are gated by their sample
//! minimums and never make the training loss worse. The freeze check may lock
//! the model, after which every later cycle leaves the coefficient set alone.

/// Phases 2 and 3
pub mod descent;
/// Convergence lock
pub mod freeze;
/// Phase 1
pub mod thresholds;

use core::fmt;

use chrono::NaiveDateTime;

use crate::classifier::CloudClass;
use crate::coefficients::CoefficientSet;
use crate::constants::LONG_ACCURACY_WINDOW;
use crate::errors::SkyGuardResult;
use crate::quality::rolling_accuracy;
use crate::samples::Observation;

pub use descent::{descend_primary, descend_secondary, loss};
pub use freeze::{check_freeze, FreezeOutcome, FreezeSettings, HistorySource};
pub use thresholds::adapt_thresholds;

/// What a learning phase did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseOutcome {
    /// Phase 1 moved a threshold
    Adjusted,
    /// Phase 1 had nothing to do, the prediction was right
    Unchanged,
    /// A descent step was accepted
    Improved {
        /// Loss before the step
        before: f64,
        /// Loss after the step
        after: f64,
    },
    /// A descent step was evaluated and rejected
    NoImprovement {
        /// Loss at the current coefficients
        before: f64,
        /// Loss the candidate would have had
        candidate: f64,
    },
    /// The phase is switched off
    Disabled,
    /// Too few samples for the phase
    InsufficientSamples {
        /// Samples in the training window
        have: usize,
        /// Samples required
        need: usize,
    },
    /// The model is frozen
    Frozen,
}

impl PhaseOutcome {
    /// Whether the phase changed the coefficient set
    pub fn changed(&self) -> bool {
        matches!(self, Self::Adjusted | Self::Improved { .. })
    }
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adjusted => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged (prediction correct)"),
            Self::Improved { before, after } => {
                write!(f, "updated (loss {before:.4} -> {after:.4})")
            }
            Self::NoImprovement { before, candidate } => {
                write!(f, "skipped (no improvement: {before:.4} -> {candidate:.4})")
            }
            Self::Disabled => write!(f, "disabled"),
            Self::InsufficientSamples { have, need } => {
                write!(f, "skipped (not enough samples: {have}/{need})")
            }
            Self::Frozen => write!(f, "skipped (frozen)"),
        }
    }
}

/// Outcome of one learning cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Phase 1
    pub thresholds: PhaseOutcome,
    /// Phase 2
    pub primary: PhaseOutcome,
    /// Phase 3
    pub secondary: PhaseOutcome,
    /// Freeze check
    pub freeze: FreezeOutcome,
    /// Size of the training window
    pub total_samples: usize,
    /// Rolling 200-sample accuracy of the training window
    pub accuracy_200: Option<f64>,
}

/// Runs the learning phases against a coefficient set
#[derive(Debug)]
pub struct LearningEngine<'a> {
    set: &'a mut CoefficientSet,
}

impl<'a> LearningEngine<'a> {
    /// Engine operating on `set`
    pub fn new(set: &'a mut CoefficientSet) -> Self {
        Self { set }
    }

    /// Run one full cycle for a labelled prediction
    ///
    /// `window` is the training window with this cycle's sample already
    /// appended. A frozen set is left untouched.
    pub fn learn<H: HistorySource + ?Sized>(
        &mut self,
        predicted: CloudClass,
        label: CloudClass,
        window: &[Observation],
        history: &H,
        now: NaiveDateTime,
    ) -> SkyGuardResult<CycleReport> {
        let total_samples = window.len();
        let accuracy_200 = rolling_accuracy(window, LONG_ACCURACY_WINDOW);

        if self.set.frozen {
            return Ok(CycleReport {
                thresholds: PhaseOutcome::Frozen,
                primary: PhaseOutcome::Frozen,
                secondary: PhaseOutcome::Frozen,
                freeze: FreezeOutcome::AlreadyFrozen,
                total_samples,
                accuracy_200,
            });
        }

        let learn_rate = self.set.learning.learn_rate_thr;
        let thresholds = adapt_thresholds(&mut self.set.thresholds, predicted, label, learn_rate);
        let primary = descend_primary(self.set, window);
        let secondary = descend_secondary(self.set, window);
        let freeze = check_freeze(self.set, total_samples, accuracy_200, history, now)?;

        Ok(CycleReport {
            thresholds,
            primary,
            secondary,
            freeze,
            total_samples,
            accuracy_200,
        })
    }
}
