//! Labelled sample log
//!
//! One CSV row per completed cycle, appended and never rewritten. Each row
//! records the raw reading, the prediction made with the coefficients active at
//! capture time, the operator's label, and a snapshot of those coefficients.
//!
//! ## Format
//!
//! ```csv
//! timestamp,ambient_c,object_c,delta_c,sky_c,predicted,label,k1,k2,k3,k4,k5,k6,k7,thr_clear,thr_light,thr_heavy
//! 2024-03-02T21:15:00,4.51,-17.23,-21.74,-21.74,1,1,100,0,0,0,0,0,0,0,-25,-18,-12
//! ```
//!
//! Columns are located by header name when reading, so logs written by the
//! first-generation stations (`Ta_GradC`, `Ts_GradC`, `pred`) load as well.
//!
//! ## Reading back
//!
//! Training only needs ambient, object, label and prediction. Reading is best
//! effort: a row that fails to parse is skipped and counted, the rest of the
//! log still loads. Only the most recent `max_rows` rows are kept, which bounds
//! training cost and lets the model follow slow drift.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::warn;

use crate::classifier::{CloudClass, Thresholds};
use crate::coefficients::CoefficientSet;
use crate::errors::SkyGuardResult;
use crate::model::ModelCoefficients;
use crate::sensor::Reading;
use crate::validation::round_to;

/// Timestamp layout used in the sample log
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Header row written to a new sample log
pub const CSV_HEADER: [&str; 17] = [
    "timestamp", "ambient_c", "object_c", "delta_c", "sky_c",
    "predicted", "label",
    "k1", "k2", "k3", "k4", "k5", "k6", "k7",
    "thr_clear", "thr_light", "thr_heavy",
];

const AMBIENT_COLUMNS: [&str; 2] = ["ambient_c", "Ta_GradC"];
const OBJECT_COLUMNS: [&str; 2] = ["object_c", "Ts_GradC"];
const PREDICTED_COLUMNS: [&str; 2] = ["predicted", "pred"];
const LABEL_COLUMNS: [&str; 1] = ["label"];

/// The part of a sample that training needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Ambient temperature (°C)
    pub ambient: f64,
    /// Object (sky) temperature (°C)
    pub object: f64,
    /// Operator label
    pub label: CloudClass,
    /// Class predicted at capture time
    pub predicted: CloudClass,
}

impl Observation {
    /// Whether the prediction matched the label
    pub fn is_correct(&self) -> bool {
        self.label == self.predicted
    }
}

/// One full row of the sample log
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Capture time (station local time)
    pub timestamp: NaiveDateTime,
    /// Ambient temperature (°C)
    pub ambient: f64,
    /// Object temperature (°C)
    pub object: f64,
    /// `object - ambient`, rounded to 0.01
    pub delta: f64,
    /// Virtual sky temperature at capture time
    pub sky_temperature: f64,
    /// Class predicted at capture time
    pub predicted: CloudClass,
    /// Operator label
    pub label: CloudClass,
    /// Coefficients active at capture time
    pub model: ModelCoefficients,
    /// Thresholds active at capture time
    pub thresholds: Thresholds,
}

impl Sample {
    /// Capture a sample using the coefficients in `set` before any update
    pub fn capture(
        timestamp: NaiveDateTime,
        reading: Reading,
        set: &CoefficientSet,
        label: CloudClass,
    ) -> Self {
        let sky_temperature = set.sky_temperature(reading.ambient, reading.object);
        Self {
            timestamp,
            ambient: reading.ambient,
            object: reading.object,
            delta: reading.delta(),
            sky_temperature,
            predicted: set.thresholds.classify(sky_temperature),
            label,
            model: set.model,
            thresholds: set.thresholds,
        }
    }

    /// Training view of this sample
    pub fn observation(&self) -> Observation {
        Observation {
            ambient: self.ambient,
            object: self.object,
            label: self.label,
            predicted: self.predicted,
        }
    }

    /// CSV row, without line terminator
    pub fn to_csv_row(&self) -> String {
        let mut fields = vec![
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.ambient.to_string(),
            self.object.to_string(),
            self.delta.to_string(),
            round_to(self.sky_temperature, 4).to_string(),
            self.predicted.index().to_string(),
            self.label.index().to_string(),
        ];
        fields.extend(self.model.to_array().iter().map(f64::to_string));
        fields.extend(self.thresholds.to_array().iter().map(f64::to_string));
        fields.join(",")
    }
}

/// Result of reading the sample log back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleWindow {
    /// Most recent observations, oldest first
    pub observations: Vec<Observation>,
    /// Rows that failed to parse
    pub skipped: usize,
    /// Valid rows in the whole log, before capping
    pub total_rows: usize,
}

impl SampleWindow {
    /// Observations in the window
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Column positions resolved from the header
struct Columns {
    ambient: usize,
    object: usize,
    predicted: usize,
    label: usize,
}

impl Columns {
    fn from_header(header: &str) -> Option<Self> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let find = |candidates: &[&str]| {
            names.iter().position(|name| candidates.contains(name))
        };

        Some(Self {
            ambient: find(&AMBIENT_COLUMNS)?,
            object: find(&OBJECT_COLUMNS)?,
            predicted: find(&PREDICTED_COLUMNS)?,
            label: find(&LABEL_COLUMNS)?,
        })
    }

    fn parse(&self, line: &str) -> Option<Observation> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let float = |index: usize| -> Option<f64> {
            let value = fields.get(index)?.parse::<f64>().ok()?;
            value.is_finite().then_some(value)
        };
        let class = |index: usize| -> Option<CloudClass> {
            let value = fields.get(index)?.parse::<i64>().ok()?;
            CloudClass::from_index(value).ok()
        };

        Some(Observation {
            ambient: float(self.ambient)?,
            object: float(self.object)?,
            label: class(self.label)?,
            predicted: class(self.predicted)?,
        })
    }
}

/// Append-only CSV sample log
#[derive(Debug, Clone)]
pub struct SampleStore {
    path: PathBuf,
}

impl SampleStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first for a new log
    pub fn append(&self, sample: &Sample) -> SkyGuardResult<()> {
        let needs_header = fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if needs_header {
            writeln!(file, "{}", CSV_HEADER.join(","))?;
        }
        writeln!(file, "{}", sample.to_csv_row())?;
        Ok(())
    }

    /// Read the most recent `max_rows` observations; `0` keeps every row
    ///
    /// A missing log is an empty window.
    pub fn read_recent(&self, max_rows: usize) -> SkyGuardResult<SampleWindow> {
        if !self.path.exists() {
            return Ok(SampleWindow::default());
        }

        let text = fs::read_to_string(&self.path)?;
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());

        let Some(header) = lines.next() else {
            return Ok(SampleWindow::default());
        };

        let mut window = SampleWindow::default();

        let Some(columns) = Columns::from_header(header) else {
            window.skipped = lines.count();
            warn!(
                "{}: header lacks required columns, ignoring {} rows",
                self.path.display(),
                window.skipped
            );
            return Ok(window);
        };

        for line in lines {
            match columns.parse(line) {
                Some(observation) => window.observations.push(observation),
                None => window.skipped += 1,
            }
        }

        if window.skipped > 0 {
            warn!("{}: skipped {} malformed rows", self.path.display(), window.skipped);
        }

        window.total_rows = window.observations.len();
        if max_rows > 0 && window.observations.len() > max_rows {
            let excess = window.observations.len() - max_rows;
            window.observations.drain(..excess);
        }

        Ok(window)
    }
}
