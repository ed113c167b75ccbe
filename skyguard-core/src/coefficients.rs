//! Coefficient document and its file-backed store
//!
//! The station keeps every tunable value in one flat JSON document: the model
//! coefficients, the thresholds, their bounds, learning rates, quality gates,
//! freeze settings and the sticky `frozen` flag.
//!
//! ## Schema evolution
//!
//! The document carries a `schema_version`. Loading runs an explicit
//! migration before deserializing:
//!
//! 1. **Version check**: a missing version means version 0 (documents written
//!    by first-generation stations); newer versions than
//!    [`SCHEMA_VERSION`] are rejected.
//!    A `schema_version` that is not a whole number is read as version 0.
//! 2. **Upgrade steps**: 0 → 1 renames `freeze_timestamp_iso` to
//!    `freeze_timestamp` and `phase3_max_rows` to `training_max_rows`, and
//!    turns the empty-string timestamp into `null`.
//! 3. **Default fill**: every key of the factory document that is missing is
//!    inserted; every key whose JSON type disagrees with the factory value is
//!    replaced. Integer keys accept whole floats such as `100.0`. A partial
//!    document therefore never fails to load.
//!
//! Keys the current release does not know are kept and written back
//! unchanged.
//!
//! ## Saving
//!
//! Before writing, the thresholds are re-sorted and K1..K7 are clamped to
//! their bounds. Keys are written sorted, pretty-printed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classifier::{CloudClass, Thresholds};
use crate::constants::defaults;
use crate::engine::freeze::FreezeSettings;
use crate::errors::{SkyGuardError, SkyGuardResult};
use crate::model::{ModelCoefficients, COEFFICIENT_COUNT};
use crate::quality::QualityThresholds;

/// Current version of the coefficient document layout
pub const SCHEMA_VERSION: u32 = 1;

/// Clamp without panicking on inverted bounds
///
/// Matches `f64::clamp` for `lo <= hi`; with inverted bounds the lower bound
/// wins, which is what a hand-edited document with swapped limits expects.
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    if value < lo {
        lo
    } else if value > hi {
        hi
    } else {
        value
    }
}

/// Per-coefficient `[min, max]` ranges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct CoefficientBounds {
    pub k1_min: f64,
    pub k1_max: f64,
    pub k2_min: f64,
    pub k2_max: f64,
    pub k3_min: f64,
    pub k3_max: f64,
    pub k4_min: f64,
    pub k4_max: f64,
    pub k5_min: f64,
    pub k5_max: f64,
    pub k6_min: f64,
    pub k6_max: f64,
    pub k7_min: f64,
    pub k7_max: f64,
}

impl Default for CoefficientBounds {
    fn default() -> Self {
        let b = defaults::MODEL_BOUNDS;
        Self {
            k1_min: b[0].0,
            k1_max: b[0].1,
            k2_min: b[1].0,
            k2_max: b[1].1,
            k3_min: b[2].0,
            k3_max: b[2].1,
            k4_min: b[3].0,
            k4_max: b[3].1,
            k5_min: b[4].0,
            k5_max: b[4].1,
            k6_min: b[5].0,
            k6_max: b[5].1,
            k7_min: b[6].0,
            k7_max: b[6].1,
        }
    }
}

impl CoefficientBounds {
    /// `(min, max)` for coefficient `index` (0 = K1)
    pub fn range(&self, index: usize) -> (f64, f64) {
        self.ranges()[index]
    }

    /// All seven ranges, K1 first
    pub fn ranges(&self) -> [(f64, f64); COEFFICIENT_COUNT] {
        [
            (self.k1_min, self.k1_max),
            (self.k2_min, self.k2_max),
            (self.k3_min, self.k3_max),
            (self.k4_min, self.k4_max),
            (self.k5_min, self.k5_max),
            (self.k6_min, self.k6_max),
            (self.k7_min, self.k7_max),
        ]
    }

    /// Clamp one coefficient to its range
    pub fn clamp(&self, index: usize, value: f64) -> f64 {
        let (lo, hi) = self.range(index);
        clamp(value, lo, hi)
    }

    /// Clamp all seven coefficients
    pub fn clamp_all(&self, coefficients: &ModelCoefficients) -> ModelCoefficients {
        let mut k = coefficients.to_array();
        for (index, value) in k.iter_mut().enumerate() {
            *value = self.clamp(index, *value);
        }
        ModelCoefficients::from_array(k)
    }
}

/// Learning rates, phase switches and sample gates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningSettings {
    /// Phase 1 threshold learning rate
    pub learn_rate_thr: f64,
    /// Phase 2 (K1/K2) switch
    pub phase2_enabled: bool,
    /// Samples required before Phase 2 runs
    pub min_samples_k: usize,
    /// Phase 2 learning rate
    pub learn_rate_k: f64,
    /// Phase 3 (K3..K7) switch
    pub phase3_enabled: bool,
    /// Samples required before Phase 3 runs
    pub min_samples_phase3: usize,
    /// Phase 3 learning rate
    pub learn_rate_phase3: f64,
    /// Most recent sample rows used for training and freeze decisions
    pub training_max_rows: usize,
    /// Most recent sample rows used for the operator report
    pub report_max_rows: usize,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            learn_rate_thr: defaults::LEARN_RATE_THRESHOLDS,
            phase2_enabled: true,
            min_samples_k: defaults::MIN_SAMPLES_PRIMARY,
            learn_rate_k: defaults::LEARN_RATE_PRIMARY,
            phase3_enabled: true,
            min_samples_phase3: defaults::MIN_SAMPLES_SECONDARY,
            learn_rate_phase3: defaults::LEARN_RATE_SECONDARY,
            training_max_rows: defaults::TRAINING_MAX_ROWS,
            report_max_rows: defaults::REPORT_MAX_ROWS,
        }
    }
}

/// Regression target per labelled class (°C)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassTargets {
    /// Target for clear skies
    #[serde(rename = "target_tsky_clear")]
    pub clear: f64,
    /// Target for light clouds
    #[serde(rename = "target_tsky_light")]
    pub light: f64,
    /// Target for heavy clouds
    #[serde(rename = "target_tsky_heavy")]
    pub heavy: f64,
    /// Target for overcast skies
    #[serde(rename = "target_tsky_overcast")]
    pub overcast: f64,
}

impl Default for ClassTargets {
    fn default() -> Self {
        let [clear, light, heavy, overcast] = defaults::TARGET_SKY_TEMPERATURES;
        Self { clear, light, heavy, overcast }
    }
}

impl ClassTargets {
    /// Target virtual sky temperature for a label
    pub fn for_class(&self, class: CloudClass) -> f64 {
        match class {
            CloudClass::Clear => self.clear,
            CloudClass::LightClouds => self.light,
            CloudClass::HeavyClouds => self.heavy,
            CloudClass::Overcast => self.overcast,
        }
    }
}

/// The complete coefficient document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSet {
    /// Layout version, see [`SCHEMA_VERSION`]
    pub schema_version: u32,
    /// Model coefficients K1..K7
    #[serde(flatten)]
    pub model: ModelCoefficients,
    /// Decision thresholds
    #[serde(flatten)]
    pub thresholds: Thresholds,
    /// Clamp ranges for K1..K7
    #[serde(flatten)]
    pub bounds: CoefficientBounds,
    /// Learning rates and gates
    #[serde(flatten)]
    pub learning: LearningSettings,
    /// Per-class regression targets
    #[serde(flatten)]
    pub targets: ClassTargets,
    /// Readiness thresholds of the quality report
    #[serde(flatten)]
    pub quality: QualityThresholds,
    /// Freeze detector settings
    #[serde(flatten)]
    pub freeze: FreezeSettings,
    /// Sticky convergence lock
    pub frozen: bool,
    /// When the lock engaged
    pub freeze_timestamp: Option<NaiveDateTime>,
    /// Keys this release does not know about
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for CoefficientSet {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            model: ModelCoefficients::default(),
            thresholds: Thresholds::default(),
            bounds: CoefficientBounds::default(),
            learning: LearningSettings::default(),
            targets: ClassTargets::default(),
            quality: QualityThresholds::default(),
            freeze: FreezeSettings::default(),
            frozen: false,
            freeze_timestamp: None,
            extra: Map::new(),
        }
    }
}

impl CoefficientSet {
    /// Virtual sky temperature with the current coefficients
    pub fn sky_temperature(&self, ambient: f64, object: f64) -> f64 {
        self.model.sky_temperature(ambient, object)
    }

    /// Predicted class with the current coefficients and thresholds
    pub fn predict(&self, ambient: f64, object: f64) -> CloudClass {
        self.thresholds.classify(self.sky_temperature(ambient, object))
    }

    /// Restore the save-time invariants: ordered thresholds, K within bounds
    pub fn enforce_invariants(&mut self) {
        self.thresholds.normalize();
        self.model = self.bounds.clamp_all(&self.model);
    }

    /// Parse a document, migrating and default-filling as needed
    pub fn from_json_str(text: &str) -> SkyGuardResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(document) = value else {
            return Err(SkyGuardError::MalformedDocument("expected a JSON object"));
        };

        let document = migrate(document)?;
        let mut set: CoefficientSet = serde_json::from_value(Value::Object(document))?;
        set.thresholds.normalize();
        Ok(set)
    }

    /// Serialize with sorted keys, after enforcing invariants
    pub fn to_json_string(&self) -> SkyGuardResult<String> {
        let mut prepared = self.clone();
        prepared.enforce_invariants();

        let sorted: BTreeMap<String, Value> = match serde_json::to_value(&prepared)? {
            Value::Object(map) => map.into_iter().collect(),
            _ => return Err(SkyGuardError::MalformedDocument("document did not serialize to an object")),
        };
        let mut text = serde_json::to_string_pretty(&sorted)?;
        text.push('\n');
        Ok(text)
    }
}

/// Factory document as a JSON map
fn default_document() -> Map<String, Value> {
    match serde_json::to_value(CoefficientSet::default()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Run all upgrade steps and fill in defaults
pub fn migrate(mut document: Map<String, Value>) -> SkyGuardResult<Map<String, Value>> {
    let version = match document.get("schema_version") {
        None => 0,
        Some(value) => read_version(value),
    };

    if version > u64::from(SCHEMA_VERSION) {
        return Err(SkyGuardError::UnsupportedSchema {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }

    if version < 1 {
        upgrade_v0_to_v1(&mut document);
    }

    repair_freeze_timestamp(&mut document);
    backfill_defaults(&mut document);
    document.insert("schema_version".into(), Value::from(SCHEMA_VERSION));

    Ok(document)
}

/// Version number of a stored `schema_version`, repairing odd values
///
/// An integral float counts as that integer; anything else as version 0.
fn read_version(value: &Value) -> u64 {
    if let Some(version) = value.as_u64() {
        return version;
    }
    match integral(value) {
        Some(version) => {
            warn!("schema_version {} is not an integer, reading it as {}", value, version);
            version
        }
        None => {
            warn!("Unreadable schema_version {}, treating the document as version 0", value);
            0
        }
    }
}

/// Non-negative whole number stored as a float
fn integral(value: &Value) -> Option<u64> {
    let number = value.as_f64()?;
    (number >= 0.0 && number.fract() == 0.0 && number <= u64::MAX as f64).then(|| number as u64)
}

/// Keys renamed between version 0 and version 1, old name first
const V0_RENAMES: [(&str, &str); 2] = [
    ("freeze_timestamp_iso", "freeze_timestamp"),
    ("phase3_max_rows", "training_max_rows"),
];

fn upgrade_v0_to_v1(document: &mut Map<String, Value>) {
    for (old, new) in V0_RENAMES {
        let Some(value) = document.remove(old) else {
            continue;
        };
        if document.contains_key(new) {
            warn!("Dropping {} = {}, {} is already set", old, value, new);
        } else {
            info!("Migrating {} to {}", old, new);
            document.insert(new.into(), value);
        }
    }
}

fn repair_freeze_timestamp(document: &mut Map<String, Value>) {
    let Some(Value::String(stamp)) = document.get("freeze_timestamp") else {
        return;
    };

    if stamp.trim().is_empty() {
        document.insert("freeze_timestamp".into(), Value::Null);
    } else if stamp.parse::<NaiveDateTime>().is_err() {
        warn!("Unreadable freeze_timestamp {:?}, dropping it", stamp);
        document.insert("freeze_timestamp".into(), Value::Null);
    }
}

/// Whether `current` can stand in for a key whose factory value is `default`
fn compatible(current: &Value, default: &Value) -> bool {
    match default {
        Value::Null => current.is_null() || current.is_string(),
        Value::Bool(_) => current.is_boolean(),
        Value::Number(n) if n.is_u64() => current.is_u64(),
        Value::Number(_) => current.is_number(),
        Value::String(_) => current.is_string(),
        Value::Array(_) => current.is_array(),
        Value::Object(_) => current.is_object(),
    }
}

fn backfill_defaults(document: &mut Map<String, Value>) -> usize {
    let mut filled = 0;

    for (key, default) in default_document() {
        match document.get(&key) {
            None => {
                info!("Coefficient document: adding missing key {} = {}", key, default);
                document.insert(key, default);
                filled += 1;
            }
            Some(current) if default.is_u64() && !current.is_u64() && integral(current).is_some() => {
                let repaired = integral(current).map_or(default, Value::from);
                info!("Coefficient document: {} = {} read as {}", key, current, repaired);
                document.insert(key, repaired);
            }
            Some(current) if !compatible(current, &default) => {
                warn!(
                    "Coefficient document: {} has unexpected value {}, using default {}",
                    key, current, default
                );
                document.insert(key, default);
                filled += 1;
            }
            Some(_) => {}
        }
    }

    filled
}

/// File-backed coefficient document
#[derive(Debug, Clone)]
pub struct CoefficientStore {
    path: PathBuf,
}

impl CoefficientStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the document; factory defaults when the file is absent
    ///
    /// A missing file is not created here: a cycle that aborts before saving
    /// leaves the filesystem untouched.
    pub fn load(&self) -> SkyGuardResult<CoefficientSet> {
        if !self.path.exists() {
            info!("{} missing, starting from factory defaults", self.path.display());
            return Ok(CoefficientSet::default());
        }

        let text = fs::read_to_string(&self.path)?;
        CoefficientSet::from_json_str(&text)
    }

    /// Write the document, clamping and ordering first
    pub fn save(&self, set: &CoefficientSet) -> SkyGuardResult<()> {
        let text = set.to_json_string()?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    /// Write the factory document unless the file already exists
    ///
    /// Returns `true` when a file was created.
    pub fn ensure_exists(&self) -> SkyGuardResult<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        info!("Creating default coefficient document {}", self.path.display());
        self.save(&CoefficientSet::default())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_document_has_flat_keys() {
        let doc = default_document();
        for key in ["K1", "K7", "thr_clear", "k4_max", "learn_rate_k", "target_tsky_overcast",
                    "quality_min_class_count", "freeze_eps_k4", "frozen", "freeze_timestamp"] {
            assert!(doc.contains_key(key), "missing {key}");
        }
        assert_eq!(doc["schema_version"], 1);
        assert_eq!(doc["freeze_timestamp"], Value::Null);
    }

    #[test]
    fn partial_document_is_backfilled() {
        let set = CoefficientSet::from_json_str(r#"{"K1": 97.5, "thr_light": -19.0}"#).unwrap();
        assert_eq!(set.model.k1, 97.5);
        assert_eq!(set.thresholds.light, -19.0);
        assert_eq!(set.thresholds.clear, -25.0);
        assert_eq!(set.learning.min_samples_k, 80);
        assert_eq!(set.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn legacy_timestamp_key_is_migrated() {
        let legacy = r#"{"frozen": true, "freeze_timestamp_iso": "2024-03-02T21:15:00"}"#;
        let set = CoefficientSet::from_json_str(legacy).unwrap();
        assert!(set.frozen);
        assert_eq!(
            set.freeze_timestamp.unwrap().to_string(),
            "2024-03-02 21:15:00"
        );
        assert!(!set.extra.contains_key("freeze_timestamp_iso"));
    }

    #[test]
    fn empty_legacy_timestamp_becomes_none() {
        let set = CoefficientSet::from_json_str(r#"{"freeze_timestamp_iso": ""}"#).unwrap();
        assert_eq!(set.freeze_timestamp, None);
    }

    #[test]
    fn mistyped_values_fall_back_to_defaults() {
        let doc = r#"{"K2": "oops", "min_samples_k": 12.5, "phase2_enabled": 1}"#;
        let set = CoefficientSet::from_json_str(doc).unwrap();
        assert_eq!(set.model.k2, 0.0);
        assert_eq!(set.learning.min_samples_k, 80);
        assert!(set.learning.phase2_enabled);
    }

    #[test]
    fn integer_values_load_as_floats() {
        let set = CoefficientSet::from_json_str(r#"{"K1": 100, "thr_clear": -26}"#).unwrap();
        assert_eq!(set.model.k1, 100.0);
        assert_eq!(set.thresholds.clear, -26.0);
    }

    #[test]
    fn unknown_keys_survive_round_trip() {
        let set = CoefficientSet::from_json_str(r#"{"site_name": "roof"}"#).unwrap();
        assert_eq!(set.extra["site_name"], "roof");
        let text = set.to_json_string().unwrap();
        assert!(text.contains("\"site_name\": \"roof\""));
    }

    #[test]
    fn training_cap_is_renamed_from_v0() {
        let doc = r#"{"K1": 100, "phase3_max_rows": 300, "freeze_timestamp_iso": ""}"#;
        let set = CoefficientSet::from_json_str(doc).unwrap();
        assert_eq!(set.learning.training_max_rows, 300);
        assert!(!set.extra.contains_key("phase3_max_rows"));

        let both = r#"{"phase3_max_rows": 300, "training_max_rows": 5000}"#;
        let set = CoefficientSet::from_json_str(both).unwrap();
        assert_eq!(set.learning.training_max_rows, 5000);
        assert!(set.extra.is_empty());
    }

    #[test]
    fn v1_documents_keep_unknown_row_key() {
        let doc = r#"{"schema_version": 1, "phase3_max_rows": 300}"#;
        let set = CoefficientSet::from_json_str(doc).unwrap();
        assert_eq!(set.learning.training_max_rows, 6000);
        assert_eq!(set.extra["phase3_max_rows"], 300);
    }

    #[test]
    fn mistyped_schema_version_is_repaired() {
        let set = CoefficientSet::from_json_str(r#"{"schema_version": 1.0, "K1": 99.0}"#).unwrap();
        assert_eq!(set.model.k1, 99.0);
        assert_eq!(set.schema_version, SCHEMA_VERSION);

        let doc = r#"{"schema_version": "one", "freeze_timestamp_iso": "2024-03-02T21:15:00"}"#;
        let set = CoefficientSet::from_json_str(doc).unwrap();
        assert!(set.freeze_timestamp.is_some());

        assert!(CoefficientSet::from_json_str(r#"{"schema_version": -2}"#).is_ok());
        assert!(matches!(
            CoefficientSet::from_json_str(r#"{"schema_version": 9.0}"#),
            Err(SkyGuardError::UnsupportedSchema { found: 9, .. })
        ));
    }

    #[test]
    fn integral_floats_fill_integer_keys() {
        let doc = r#"{"min_samples_k": 100.0, "freeze_history_window": 12.0, "training_max_rows": -5.0}"#;
        let set = CoefficientSet::from_json_str(doc).unwrap();
        assert_eq!(set.learning.min_samples_k, 100);
        assert_eq!(set.freeze.freeze_history_window, 12);
        assert_eq!(set.learning.training_max_rows, 6000);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let err = CoefficientSet::from_json_str(r#"{"schema_version": 9}"#).unwrap_err();
        assert!(matches!(err, SkyGuardError::UnsupportedSchema { found: 9, .. }));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = CoefficientSet::from_json_str("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, SkyGuardError::MalformedDocument(_)));
    }

    #[test]
    fn load_sorts_thresholds() {
        let doc = r#"{"thr_clear": -10.0, "thr_light": -30.0, "thr_heavy": -20.0}"#;
        let set = CoefficientSet::from_json_str(doc).unwrap();
        assert_eq!(set.thresholds.to_array(), [-30.0, -20.0, -10.0]);
    }

    #[test]
    fn save_clamps_coefficients() {
        let mut set = CoefficientSet::default();
        set.model.k1 = 400.0;
        set.model.k6 = -999.0;
        let reloaded = CoefficientSet::from_json_str(&set.to_json_string().unwrap()).unwrap();
        assert_eq!(reloaded.model.k1, 150.0);
        assert_eq!(reloaded.model.k6, -200.0);
    }

    #[test]
    fn keys_are_written_sorted() {
        let text = CoefficientSet::default().to_json_string().unwrap();
        let k1 = text.find("\"K1\"").unwrap();
        let frozen = text.find("\"frozen\"").unwrap();
        let thr = text.find("\"thr_clear\"").unwrap();
        assert!(k1 < frozen && frozen < thr);
    }

    #[test]
    fn inverted_bounds_do_not_panic() {
        assert_eq!(clamp(5.0, 10.0, 0.0), 10.0);
        assert_eq!(clamp(5.0, 0.0, 10.0), 5.0);
        assert_eq!(clamp(-1.0, 0.0, 10.0), 0.0);
    }

    #[test]
    fn targets_follow_class_order() {
        let targets = ClassTargets::default();
        assert_eq!(targets.for_class(CloudClass::Clear), -30.0);
        assert_eq!(targets.for_class(CloudClass::Overcast), -6.0);
    }
}
