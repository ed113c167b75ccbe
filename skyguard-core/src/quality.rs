//! Dataset quality and phase readiness
//!
//! Summarizes the recent sample window for the operator: how many labels there
//! are, how they spread over the four classes, how well the current model
//! predicted them, and how much of the ambient temperature range they cover.
//!
//! Three readiness lamps translate those numbers into advice. They never gate
//! learning; the phases have their own sample minimums.

use core::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::classifier::CloudClass;
use crate::coefficients::CoefficientSet;
use crate::constants::{defaults, LONG_ACCURACY_WINDOW, SHORT_ACCURACY_WINDOW};
use crate::samples::Observation;

/// Readiness thresholds stored in the coefficient document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Samples for the threshold lamp
    pub quality_min_samples_thr: usize,
    /// Samples for the K1/K2 lamp
    pub quality_min_samples_k: usize,
    /// 50-sample accuracy for the threshold lamp
    pub quality_min_acc50_thr: f64,
    /// 50-sample accuracy for the K1/K2 lamp
    pub quality_min_acc50_k: f64,
    /// 200-sample accuracy for the threshold lamp
    pub quality_min_acc200_thr: f64,
    /// 200-sample accuracy for the K1/K2 lamp
    pub quality_min_acc200_k: f64,
    /// Ambient span (°C) for the threshold lamp
    pub quality_min_ta_range_thr: f64,
    /// Ambient span (°C) for the K1/K2 lamp
    pub quality_min_ta_range_k: f64,
    /// Labels a class needs to count as represented
    pub quality_min_class_count: usize,
    /// Represented classes for the threshold lamp
    pub quality_min_classes_thr: usize,
    /// Represented classes for the K1/K2 lamp
    pub quality_min_classes_k: usize,
    /// Represented classes for the K3..K7 lamp
    pub quality_min_classes_phase3: usize,
    /// 200-sample accuracy for the K3..K7 lamp
    pub quality_min_acc200_phase3: f64,
    /// Ambient span (°C) for the K3..K7 lamp
    pub quality_min_ta_range_phase3: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        let (acc50_thr, acc50_k) = defaults::QUALITY_MIN_ACC50;
        let (acc200_thr, acc200_k, acc200_p3) = defaults::QUALITY_MIN_ACC200;
        let (range_thr, range_k, range_p3) = defaults::QUALITY_MIN_TA_RANGE;
        let (classes_thr, classes_k, classes_p3) = defaults::QUALITY_MIN_CLASSES;

        Self {
            quality_min_samples_thr: defaults::QUALITY_MIN_SAMPLES_THR,
            quality_min_samples_k: defaults::QUALITY_MIN_SAMPLES_K,
            quality_min_acc50_thr: acc50_thr,
            quality_min_acc50_k: acc50_k,
            quality_min_acc200_thr: acc200_thr,
            quality_min_acc200_k: acc200_k,
            quality_min_ta_range_thr: range_thr,
            quality_min_ta_range_k: range_k,
            quality_min_class_count: defaults::QUALITY_MIN_CLASS_COUNT,
            quality_min_classes_thr: classes_thr,
            quality_min_classes_k: classes_k,
            quality_min_classes_phase3: classes_p3,
            quality_min_acc200_phase3: acc200_p3,
            quality_min_ta_range_phase3: range_p3,
        }
    }
}

/// Fraction of correct predictions among the last `window` observations
///
/// `None` when there are no observations.
pub fn rolling_accuracy(observations: &[Observation], window: usize) -> Option<f64> {
    let n = window.min(observations.len());
    if n == 0 {
        return None;
    }
    let recent = &observations[observations.len() - n..];
    let correct = recent.iter().filter(|o| o.is_correct()).count();
    Some(correct as f64 / n as f64)
}

/// Label count per class, clear first
pub fn class_counts(observations: &[Observation]) -> [usize; 4] {
    let mut counts = [0; 4];
    for observation in observations {
        counts[usize::from(observation.label.index())] += 1;
    }
    counts
}

/// How evenly labels spread over the four classes, 0..=1
///
/// `1 - sum|count - total/4| / (2 * total)`, floored at 0. An empty dataset
/// scores 0.
pub fn balance_score(counts: &[usize; 4]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let ideal = total as f64 / 4.0;
    let deviation: f64 = counts.iter().map(|&c| (c as f64 - ideal).abs()).sum();
    (1.0 - deviation / (2.0 * total as f64)).max(0.0)
}

/// `(min, max)` ambient temperature, `None` when empty
pub fn ambient_range(observations: &[Observation]) -> Option<(f64, f64)> {
    observations.iter().map(|o| o.ambient).fold(None, |range, ta| match range {
        None => Some((ta, ta)),
        Some((lo, hi)) => Some((lo.min(ta), hi.max(ta))),
    })
}

/// Advisory readiness of each learning phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    /// Phase 1, thresholds
    pub thresholds: bool,
    /// Phase 2, K1/K2
    pub primary: bool,
    /// Phase 3, K3..K7
    pub secondary: bool,
}

/// Operator lamp for a readiness flag
pub fn lamp(ready: bool) -> &'static str {
    if ready {
        "GREEN"
    } else {
        "YELLOW"
    }
}

/// Statistics of one sample window
#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    /// Observations in the window
    pub total: usize,
    /// Labels per class, clear first
    pub class_counts: [usize; 4],
    /// Accuracy over the last 50
    pub accuracy_50: Option<f64>,
    /// Accuracy over the last 200
    pub accuracy_200: Option<f64>,
    /// Lowest and highest ambient temperature
    pub ambient_range: Option<(f64, f64)>,
    /// Label balance, 0..=1
    pub balance: f64,
    /// Phase lamps
    pub readiness: Readiness,
}

impl QualityReport {
    /// Compute the report for `observations` under the gates in `set`
    pub fn compute(observations: &[Observation], set: &CoefficientSet) -> Self {
        let class_counts = class_counts(observations);
        let mut report = Self {
            total: observations.len(),
            class_counts,
            accuracy_50: rolling_accuracy(observations, SHORT_ACCURACY_WINDOW),
            accuracy_200: rolling_accuracy(observations, LONG_ACCURACY_WINDOW),
            ambient_range: ambient_range(observations),
            balance: balance_score(&class_counts),
            readiness: Readiness::default(),
        };
        report.readiness = report.assess(&set.quality, set.learning.min_samples_phase3);
        report
    }

    /// Ambient span in °C, 0 when empty
    pub fn ambient_span(&self) -> f64 {
        self.ambient_range.map_or(0.0, |(lo, hi)| hi - lo)
    }

    /// Classes with at least `min_count` labels
    pub fn classes_with_at_least(&self, min_count: usize) -> usize {
        self.class_counts.iter().filter(|&&c| c >= min_count).count()
    }

    /// Count for one class
    pub fn count(&self, class: CloudClass) -> usize {
        self.class_counts[usize::from(class.index())]
    }

    fn assess(&self, gates: &QualityThresholds, min_samples_phase3: usize) -> Readiness {
        let at_least = |value: Option<f64>, min: f64| value.is_some_and(|v| v >= min);
        let span = self.ambient_span();
        let classes = self.classes_with_at_least(gates.quality_min_class_count);

        Readiness {
            thresholds: self.total >= gates.quality_min_samples_thr
                && at_least(self.accuracy_50, gates.quality_min_acc50_thr)
                && at_least(self.accuracy_200, gates.quality_min_acc200_thr)
                && span >= gates.quality_min_ta_range_thr
                && classes >= gates.quality_min_classes_thr,
            primary: self.total >= gates.quality_min_samples_k
                && at_least(self.accuracy_50, gates.quality_min_acc50_k)
                && at_least(self.accuracy_200, gates.quality_min_acc200_k)
                && span >= gates.quality_min_ta_range_k
                && classes >= gates.quality_min_classes_k,
            secondary: self.total >= min_samples_phase3
                && at_least(self.accuracy_200, gates.quality_min_acc200_phase3)
                && span >= gates.quality_min_ta_range_phase3
                && classes >= gates.quality_min_classes_phase3,
        }
    }

    /// Operator summary including freeze status from `set`
    pub fn render(&self, set: &CoefficientSet) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_summary(&mut out, set);
        out
    }

    fn write_summary(&self, out: &mut String, set: &CoefficientSet) -> fmt::Result {
        let yes_no = |flag: bool| if flag { "YES" } else { "NO" };
        let ratio = |value: Option<f64>| match value {
            Some(v) => format!("{v:.3}"),
            None => "n/a".to_string(),
        };

        writeln!(out, "Quality Report")?;
        writeln!(out, "Samples total: {}", self.total)?;
        write!(out, "Samples per class:")?;
        for class in CloudClass::ALL {
            write!(out, " c{}={}", class.index(), self.count(class))?;
        }
        writeln!(out)?;
        match self.ambient_range {
            Some((lo, hi)) => writeln!(
                out,
                "Ta min: {lo:.2} Ta max: {hi:.2} Ta span: {:.2} °C",
                hi - lo
            )?,
            None => writeln!(out, "Ta range: n/a")?,
        }
        writeln!(out, "Rolling accuracy last50 : {}", ratio(self.accuracy_50))?;
        writeln!(out, "Rolling accuracy last200: {}", ratio(self.accuracy_200))?;
        writeln!(out, "Label balance score (0..1): {:.3}", self.balance)?;
        writeln!(out)?;
        writeln!(out, "Readiness")?;
        writeln!(out, "Thresholds (Phase1) : {}", lamp(self.readiness.thresholds))?;
        writeln!(out, "K1/K2 (Phase2)      : {}", lamp(self.readiness.primary))?;
        writeln!(out, "K3..K7 (Phase3)     : {}", lamp(self.readiness.secondary))?;
        writeln!(out, "Freeze enabled      : {}", yes_no(set.freeze.freeze_enabled))?;
        writeln!(out, "Frozen              : {}", yes_no(set.frozen))?;
        if let (true, Some(stamp)) = (set.frozen, set.freeze_timestamp) {
            writeln!(out, "Freeze timestamp    : {}", stamp.format("%Y-%m-%dT%H:%M:%S"))?;
        }
        Ok(())
    }
}
