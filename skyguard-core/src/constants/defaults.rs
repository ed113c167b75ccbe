//! Factory Defaults of the Coefficient Document
//!
//! These values seed a fresh station and backfill any key missing from an
//! older document. They come from the field deployment of the camera station.

// ===== MODEL =====

/// Default K1..K7.
///
/// With `K1 = 100` and everything else zero the model reduces to
/// `Tsky = Ts - Ta`.
pub const MODEL_COEFFICIENTS: [f64; 7] = [100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

/// Default (min, max) bounds for K1..K7.
pub const MODEL_BOUNDS: [(f64, f64); 7] = [
    (50.0, 150.0),
    (-400.0, 400.0),
    (0.0, 200.0),
    (0.0, 1200.0),
    (0.0, 200.0),
    (-200.0, 200.0),
    (-200.0, 200.0),
];

// ===== CLASSIFIER =====

/// Default upper bound of the "clear" class (°C virtual sky temperature).
pub const THR_CLEAR: f64 = -25.0;

/// Default upper bound of the "light clouds" class.
pub const THR_LIGHT: f64 = -18.0;

/// Default upper bound of the "heavy clouds" class.
pub const THR_HEAVY: f64 = -12.0;

/// Regression targets per class, clear to overcast (°C).
///
/// Heuristic mid-points of each class, used only by Phases 2 and 3.
pub const TARGET_SKY_TEMPERATURES: [f64; 4] = [-30.0, -21.0, -15.0, -6.0];

// ===== LEARNING RATES AND GATES =====

/// Phase 1 threshold learning rate.
pub const LEARN_RATE_THRESHOLDS: f64 = 0.15;

/// Phase 2 learning rate.
pub const LEARN_RATE_PRIMARY: f64 = 0.02;

/// Phase 3 learning rate, roughly a quarter of Phase 2.
pub const LEARN_RATE_SECONDARY: f64 = 0.005;

/// Samples required before Phase 2 runs.
pub const MIN_SAMPLES_PRIMARY: usize = 80;

/// Samples required before Phase 3 runs.
pub const MIN_SAMPLES_SECONDARY: usize = 1500;

/// Most recent rows used for training.
pub const TRAINING_MAX_ROWS: usize = 6000;

/// Most recent rows used for the operator report.
pub const REPORT_MAX_ROWS: usize = 4000;

// ===== FREEZE =====

/// Samples required before the model may freeze.
pub const FREEZE_MIN_SAMPLES: usize = 800;

/// Rolling 200-sample accuracy required before the model may freeze.
pub const FREEZE_MIN_ACCURACY: f64 = 0.82;

/// Number of trailing history entries inspected for drift.
pub const FREEZE_HISTORY_WINDOW: usize = 30;

/// Maximum drift of each threshold inside the window (°C).
pub const FREEZE_EPS_THRESHOLDS: f64 = 0.25;

/// Maximum drift of K1..K7 inside the window.
pub const FREEZE_EPS_COEFFICIENTS: [f64; 7] = [0.5, 2.0, 1.0, 6.0, 1.0, 1.0, 1.0];

// ===== QUALITY REPORT =====

/// Samples before the threshold phase is reported ready.
pub const QUALITY_MIN_SAMPLES_THR: usize = 80;

/// Samples before the K1/K2 phase is reported ready.
pub const QUALITY_MIN_SAMPLES_K: usize = 250;

/// Rolling 50-sample accuracy gates (thresholds, K1/K2).
pub const QUALITY_MIN_ACC50: (f64, f64) = (0.75, 0.80);

/// Rolling 200-sample accuracy gates (thresholds, K1/K2, K3..K7).
pub const QUALITY_MIN_ACC200: (f64, f64, f64) = (0.70, 0.75, 0.78);

/// Ambient span gates in °C (thresholds, K1/K2, K3..K7).
pub const QUALITY_MIN_TA_RANGE: (f64, f64, f64) = (6.0, 12.0, 15.0);

/// Labels a class needs before it counts as represented.
pub const QUALITY_MIN_CLASS_COUNT: usize = 10;

/// Represented classes required (thresholds, K1/K2, K3..K7).
pub const QUALITY_MIN_CLASSES: (usize, usize, usize) = (2, 3, 3);
