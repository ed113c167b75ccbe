//! One calibration cycle, end to end
//!
//! ```text
//! load coefficients ─> read sensor ─> predict ─> ask label
//!                                                   │ none: abort, nothing written
//!                                                   v
//! append sample ─> re-read window ─> learn ─> save coefficients ─> append history
//! ```
//!
//! The sample is logged with the coefficients that made the prediction, before
//! any update. A frozen model still logs samples and history but its document
//! is never rewritten.
//!
//! ## Failure behaviour
//!
//! Sensor failures and an aborted label leave all three files untouched. A
//! failure after the sample was appended aborts the rest of the cycle; the
//! files are not rolled back and may disagree until the next cycle. Two
//! stations sharing the same files concurrently are not supported.

use std::path::{Path, PathBuf};

use log::info;

use crate::classifier::CloudClass;
use crate::clock::{Clock, SystemClock};
use crate::coefficients::{CoefficientSet, CoefficientStore};
use crate::engine::{CycleReport, LearningEngine};
use crate::errors::SkyGuardResult;
use crate::history::{HistoryEntry, HistoryLog};
use crate::label::LabelSource;
use crate::quality::QualityReport;
use crate::samples::{Sample, SampleStore};
use crate::sensor::{Reading, TemperatureSource};

/// Default coefficient document name
pub const COEFFICIENTS_FILE: &str = "skyguard_coeffs.json";
/// Default sample log name
pub const SAMPLES_FILE: &str = "skyguard_samples.csv";
/// Default history log name
pub const HISTORY_FILE: &str = "skyguard_history.jsonl";

/// Locations of the three station files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationPaths {
    /// Coefficient document
    pub coefficients: PathBuf,
    /// Sample log
    pub samples: PathBuf,
    /// History log
    pub history: PathBuf,
}

impl StationPaths {
    /// Default file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            coefficients: dir.join(COEFFICIENTS_FILE),
            samples: dir.join(SAMPLES_FILE),
            history: dir.join(HISTORY_FILE),
        }
    }
}

/// A reading with its model output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Raw temperatures
    pub reading: Reading,
    /// Virtual sky temperature
    pub sky_temperature: f64,
    /// Predicted class
    pub predicted: CloudClass,
}

impl Measurement {
    /// Evaluate `reading` with the coefficients in `set`
    pub fn new(reading: Reading, set: &CoefficientSet) -> Self {
        let sky_temperature = set.sky_temperature(reading.ambient, reading.object);
        Self {
            reading,
            sky_temperature,
            predicted: set.thresholds.classify(sky_temperature),
        }
    }
}

/// State of the station before a measurement
#[derive(Debug, Clone)]
pub struct Overview {
    /// Current coefficient document
    pub coefficients: CoefficientSet,
    /// Quality of the report window
    pub quality: QualityReport,
    /// Unreadable sample rows
    pub skipped_rows: usize,
}

/// A cycle that ran to completion
#[derive(Debug, Clone)]
pub struct CompletedCycle {
    /// Reading and prediction
    pub measurement: Measurement,
    /// Operator label
    pub label: CloudClass,
    /// Per-phase outcomes
    pub report: CycleReport,
    /// Coefficients after the cycle
    pub coefficients: CoefficientSet,
    /// Whether the coefficient document was rewritten
    pub saved: bool,
}

/// How a cycle ended
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// No label given; nothing was written
    Aborted(Measurement),
    /// Sample logged and learning applied
    Completed(Box<CompletedCycle>),
}

/// The calibration station: three stores and a clock
#[derive(Debug, Clone)]
pub struct Station<C = SystemClock> {
    coefficients: CoefficientStore,
    samples: SampleStore,
    history: HistoryLog,
    clock: C,
}

impl Station<SystemClock> {
    /// Station on the system clock
    pub fn new(paths: StationPaths) -> Self {
        Self::with_clock(paths, SystemClock)
    }
}

impl<C: Clock> Station<C> {
    /// Station with an explicit clock
    pub fn with_clock(paths: StationPaths, clock: C) -> Self {
        Self {
            coefficients: CoefficientStore::new(paths.coefficients),
            samples: SampleStore::new(paths.samples),
            history: HistoryLog::new(paths.history),
            clock,
        }
    }

    /// Coefficient store
    pub fn coefficients(&self) -> &CoefficientStore {
        &self.coefficients
    }

    /// Sample store
    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    /// History log
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Current document and quality report, read-only
    pub fn overview(&self) -> SkyGuardResult<Overview> {
        let coefficients = self.coefficients.load()?;
        let window = self.samples.read_recent(coefficients.learning.report_max_rows)?;
        let quality = QualityReport::compute(&window.observations, &coefficients);
        Ok(Overview {
            coefficients,
            quality,
            skipped_rows: window.skipped,
        })
    }

    /// Evaluate a reading with the stored coefficients, read-only
    pub fn predict(&self, reading: Reading) -> SkyGuardResult<Measurement> {
        let set = self.coefficients.load()?;
        Ok(Measurement::new(reading, &set))
    }

    /// Run one full cycle
    pub fn run_cycle<S, L>(&self, source: &mut S, labels: &mut L) -> SkyGuardResult<CycleOutcome>
    where
        S: TemperatureSource + ?Sized,
        L: LabelSource + ?Sized,
    {
        let mut set = self.coefficients.load()?;

        let reading = source.read_temperatures()?;
        let measurement = Measurement::new(reading, &set);

        let Some(label) = labels.request_label(&measurement)? else {
            info!("No label given, cycle aborted");
            return Ok(CycleOutcome::Aborted(measurement));
        };

        let now = self.clock.now();
        self.samples.append(&Sample::capture(now, reading, &set, label))?;

        let window = self.samples.read_recent(set.learning.training_max_rows)?;

        let was_frozen = set.frozen;
        let report = LearningEngine::new(&mut set).learn(
            measurement.predicted,
            label,
            &window.observations,
            &self.history,
            now,
        )?;

        if !was_frozen {
            self.coefficients.save(&set)?;
        }
        self.history.append(&HistoryEntry::snapshot(
            now,
            &set,
            report.total_samples,
            report.accuracy_200,
        ))?;

        info!(
            "Cycle done: predicted {}, label {}, {} samples",
            measurement.predicted, label, report.total_samples
        );

        Ok(CycleOutcome::Completed(Box::new(CompletedCycle {
            measurement,
            label,
            report,
            coefficients: set,
            saved: !was_frozen,
        })))
    }
}
