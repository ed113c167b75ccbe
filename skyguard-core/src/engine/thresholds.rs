//! Phase 1: threshold nudging
//!
//! Runs on every labelled cycle. A wrong prediction moves the one threshold
//! that separates the predicted class from the labelled class side, by a step
//! that grows with the size of the miss:
//!
//! ```text
//! direction = +1 if predicted < label else -1
//! step      = learn_rate * clamp(|label - predicted|, 0.2, 2.0)
//! ```
//!
//! The threshold is chosen by the lowest class involved: `thr_clear` when
//! either side is clear, `thr_light` when either is light clouds, otherwise
//! `thr_heavy`. The three values are re-sorted afterwards, which can move a
//! value to a different name when a nudge crossed a neighbour.

use crate::classifier::{CloudClass, Thresholds};
use crate::coefficients::clamp;
use crate::constants::learning::{THRESHOLD_STEP_MAX, THRESHOLD_STEP_MIN};

use super::PhaseOutcome;

/// Which threshold a miss between `predicted` and `label` moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    /// `thr_clear`
    Clear,
    /// `thr_light`
    Light,
    /// `thr_heavy`
    Heavy,
}

impl ThresholdKind {
    /// Threshold responsible for the boundary between two classes
    pub fn between(predicted: CloudClass, label: CloudClass) -> Self {
        let involves = |class| predicted == class || label == class;
        if involves(CloudClass::Clear) {
            Self::Clear
        } else if involves(CloudClass::LightClouds) {
            Self::Light
        } else {
            Self::Heavy
        }
    }

    fn slot(self, thresholds: &mut Thresholds) -> &mut f64 {
        match self {
            Self::Clear => &mut thresholds.clear,
            Self::Light => &mut thresholds.light,
            Self::Heavy => &mut thresholds.heavy,
        }
    }
}

/// Signed step for a miss, zero when the prediction was right
pub fn threshold_step(predicted: CloudClass, label: CloudClass, learn_rate: f64) -> f64 {
    if predicted == label {
        return 0.0;
    }
    let direction = if predicted < label { 1.0 } else { -1.0 };
    let miss = f64::from(predicted.distance(label));
    direction * learn_rate * clamp(miss, THRESHOLD_STEP_MIN, THRESHOLD_STEP_MAX)
}

/// Apply one Phase 1 update in place
pub fn adapt_thresholds(
    thresholds: &mut Thresholds,
    predicted: CloudClass,
    label: CloudClass,
    learn_rate: f64,
) -> PhaseOutcome {
    if predicted == label {
        return PhaseOutcome::Unchanged;
    }

    let step = threshold_step(predicted, label, learn_rate);
    *ThresholdKind::between(predicted, label).slot(thresholds) += step;
    thresholds.normalize();

    PhaseOutcome::Adjusted
}

#[cfg(test)]
mod tests {
    use super::*;

    const LR: f64 = 0.15;

    #[test]
    fn correct_prediction_changes_nothing() {
        let mut thr = Thresholds::default();
        let outcome = adapt_thresholds(&mut thr, CloudClass::HeavyClouds, CloudClass::HeavyClouds, LR);
        assert_eq!(outcome, PhaseOutcome::Unchanged);
        assert_eq!(thr, Thresholds::default());
    }

    #[test]
    fn under_prediction_raises_clear_threshold() {
        let mut thr = Thresholds::default();
        adapt_thresholds(&mut thr, CloudClass::Clear, CloudClass::LightClouds, LR);
        assert!((thr.clear - (-25.0 + 0.15)).abs() < 1e-12);
        assert_eq!(thr.light, -18.0);
        assert_eq!(thr.heavy, -12.0);
    }

    #[test]
    fn over_prediction_lowers_threshold() {
        let mut thr = Thresholds::default();
        adapt_thresholds(&mut thr, CloudClass::Overcast, CloudClass::HeavyClouds, LR);
        assert!((thr.heavy - (-12.0 - 0.15)).abs() < 1e-12);
    }

    #[test]
    fn step_is_capped_at_two_classes() {
        let step = threshold_step(CloudClass::Clear, CloudClass::Overcast, LR);
        assert!((step - 0.3).abs() < 1e-12);
        assert!((threshold_step(CloudClass::Overcast, CloudClass::Clear, LR) + 0.3).abs() < 1e-12);
    }

    #[test]
    fn threshold_selection() {
        use CloudClass::*;
        assert_eq!(ThresholdKind::between(Overcast, Clear), ThresholdKind::Clear);
        assert_eq!(ThresholdKind::between(LightClouds, Overcast), ThresholdKind::Light);
        assert_eq!(ThresholdKind::between(HeavyClouds, Overcast), ThresholdKind::Heavy);
        assert_eq!(ThresholdKind::between(Overcast, HeavyClouds), ThresholdKind::Heavy);
    }

    #[test]
    fn crossing_nudge_is_resorted() {
        let mut thr = Thresholds { clear: -18.1, light: -18.0, heavy: -12.0 };
        adapt_thresholds(&mut thr, CloudClass::Clear, CloudClass::Overcast, 1.0);
        // clear moved to -16.1, past light
        assert!(thr.is_ordered());
        assert_eq!(thr.clear, -18.0);
        assert!((thr.light - (-16.1)).abs() < 1e-12);
    }
}
