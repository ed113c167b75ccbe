//! Self-calibrating cloud-cover classifier for SkyGuard stations
//!
//! Turns the two readings of an MLX90614 IR thermometer (ambient and sky)
//! into a virtual sky temperature, classifies it into four cloud classes, and
//! learns from operator labels one cycle at a time.
//!
//! Key constraints:
//! - No offline training, no held-out data: every label is used immediately
//! - Coefficient updates never make the training loss worse
//! - Once converged the model freezes and stays frozen
//!
//! ```no_run
//! use skyguard_core::{FixedLabel, FixedReading, Station, StationPaths, CloudClass};
//!
//! let station = Station::new(StationPaths::in_dir("/var/lib/skyguard"));
//! let mut sensor = FixedReading::new(4.5, -17.2);
//! let mut label = FixedLabel(Some(CloudClass::LightClouds));
//!
//! let outcome = station.run_cycle(&mut sensor, &mut label)?;
//! # Ok::<(), skyguard_core::SkyGuardError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod classifier;
pub mod clock;
pub mod coefficients;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod history;
pub mod label;
pub mod model;
pub mod quality;
pub mod samples;
pub mod sensor;
#[cfg(target_os = "linux")]
pub mod smbus;
pub mod station;
pub mod validation;

// Public API
pub use classifier::{CloudClass, Thresholds};
pub use clock::{Clock, FixedClock, SystemClock};
pub use coefficients::{CoefficientSet, CoefficientStore};
pub use engine::{CycleReport, FreezeOutcome, LearningEngine, PhaseOutcome};
pub use errors::{SkyGuardError, SkyGuardResult};
pub use history::{HistoryEntry, HistoryLog};
pub use label::{FixedLabel, LabelSource, PromptLabelSource};
pub use model::ModelCoefficients;
pub use quality::QualityReport;
pub use samples::{Observation, Sample, SampleStore};
pub use sensor::{FixedReading, Mlx90614, Reading, RegisterBus, TemperatureSource};
#[cfg(target_os = "linux")]
pub use smbus::LinuxSmbus;
pub use station::{CycleOutcome, Measurement, Station, StationPaths};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
