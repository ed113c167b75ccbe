//! Fixed Learning Parameters
//!
//! Values that shape the learning phases but are deliberately not part of the
//! coefficient document.

// ===== FINITE DIFFERENCES =====

/// Central-difference step for K1 and K2 (Phase 2).
///
/// K1 is a percentage scale factor, K2 is ten times a temperature offset,
/// hence the larger step for K2.
pub const PRIMARY_EPSILONS: [f64; 2] = [0.25, 1.0];

/// Central-difference steps for K3..K7 (Phase 3).
///
/// K4 lives on a per-mille scale and gets a proportionally larger step.
pub const SECONDARY_EPSILONS: [f64; 5] = [1.0, 5.0, 1.0, 1.0, 1.0];

// ===== ACCURACY WINDOWS =====

/// Short rolling accuracy window (most recent samples).
pub const SHORT_ACCURACY_WINDOW: usize = 50;

/// Long rolling accuracy window, also used by the freeze detector.
pub const LONG_ACCURACY_WINDOW: usize = 200;

// ===== PHASE 1 =====

/// Smallest multiplier applied to the threshold learning rate.
pub const THRESHOLD_STEP_MIN: f64 = 0.2;

/// Largest multiplier applied to the threshold learning rate.
pub const THRESHOLD_STEP_MAX: f64 = 2.0;

// ===== FREEZE =====

/// Minimum number of history entries needed to measure any drift.
pub const FREEZE_MIN_HISTORY: usize = 2;
