//! Shared helpers for integration tests
//!
//! - Deterministic sky generator (no external RNG, same data every run)
//! - Station fixture rooted in a temporary directory

#![allow(dead_code)]

use skyguard_core::{
    CloudClass, CoefficientSet, FixedClock, Observation, Station, StationPaths,
};
use tempfile::TempDir;

/// Linear congruential generator, enough for test data
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Uniform in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in `[lo, hi)`
    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Synthetic sky whose true offset is `k1_percent`% of ambient
///
/// Each class sits around its default target temperature with a little noise,
/// so the default thresholds are already roughly right.
pub struct SkyGenerator {
    rng: Lcg,
    k1_percent: f64,
}

impl SkyGenerator {
    pub fn new(seed: u64, k1_percent: f64) -> Self {
        Self { rng: Lcg::new(seed), k1_percent }
    }

    /// `(ambient, object, label)`
    pub fn next(&mut self) -> (f64, f64, CloudClass) {
        let targets = CoefficientSet::default().targets;
        let label = CloudClass::ALL[(self.rng.next_f64() * 4.0) as usize % 4];
        let ambient = self.rng.range(-5.0, 20.0);
        let noise = self.rng.range(-1.0, 1.0);
        let object = targets.for_class(label) + self.k1_percent / 100.0 * ambient + noise;
        (round2(ambient), round2(object), label)
    }

    /// Observations predicted with `set`
    pub fn observations(&mut self, n: usize, set: &CoefficientSet) -> Vec<Observation> {
        (0..n)
            .map(|_| {
                let (ambient, object, label) = self.next();
                Observation { ambient, object, label, predicted: set.predict(ambient, object) }
            })
            .collect()
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Station in a fresh temporary directory with a fixed clock
pub struct Fixture {
    pub dir: TempDir,
    pub paths: StationPaths,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = StationPaths::in_dir(dir.path());
        Self { dir, paths }
    }

    pub fn station(&self) -> Station<FixedClock> {
        Station::with_clock(self.paths.clone(), FixedClock::new(start_time()))
    }

    pub fn station_at(&self, time: chrono::NaiveDateTime) -> Station<FixedClock> {
        Station::with_clock(self.paths.clone(), FixedClock::new(time))
    }

    pub fn file_count(&self) -> usize {
        std::fs::read_dir(self.dir.path()).unwrap().count()
    }
}

pub fn start_time() -> chrono::NaiveDateTime {
    "2024-03-02T21:00:00".parse().unwrap()
}
