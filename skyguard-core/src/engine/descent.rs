//! Phases 2 and 3: greedy coordinate descent on the model coefficients
//!
//! Both phases fit the model so that labelled samples land near a fixed target
//! temperature per class. The loss is the mean squared distance between the
//! virtual sky temperature and the target of each sample's label:
//!
//! ```text
//! loss(K) = 1/n * sum (Tsky(Ta_i, Ts_i, K) - target(label_i))^2
//! ```
//!
//! The gradient is estimated by central differences, one coefficient at a
//! time, with every other coefficient held at its current value. Evaluation points
//! are clamped to the coefficient's bounds but the divisor stays `2 * eps`.
//!
//! ## Acceptance
//!
//! A candidate step is applied only when its loss is less than or equal to
//! the current loss. Otherwise the coefficients stay bit-for-bit unchanged.
//! A NaN loss on either side never compares as acceptable.
//!
//! Phase 2 moves K1 and K2, Phase 3 moves K3..K7 jointly with a smaller
//! learning rate and a much larger sample gate.

use log::{debug, info};

use crate::coefficients::{ClassTargets, CoefficientBounds, CoefficientSet};
use crate::constants::learning::{PRIMARY_EPSILONS, SECONDARY_EPSILONS};
use crate::model::ModelCoefficients;
use crate::samples::Observation;

use super::PhaseOutcome;

/// Coefficient indices moved by Phase 2 (K1, K2)
pub const PRIMARY_INDICES: [usize; 2] = [0, 1];

/// Coefficient indices moved by Phase 3 (K3..K7)
pub const SECONDARY_INDICES: [usize; 5] = [2, 3, 4, 5, 6];

/// Mean squared error against the class targets, 0 for an empty window
pub fn loss(observations: &[Observation], model: &ModelCoefficients, targets: &ClassTargets) -> f64 {
    if observations.is_empty() {
        return 0.0;
    }
    let sum: f64 = observations
        .iter()
        .map(|o| {
            let error = model.sky_temperature(o.ambient, o.object) - targets.for_class(o.label);
            error * error
        })
        .sum();
    sum / observations.len() as f64
}

/// One evaluated descent step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescentStep<const N: usize> {
    /// Loss at the current coefficients
    pub base_loss: f64,
    /// Estimated partial derivatives, in parameter order
    pub gradient: [f64; N],
    /// Clamped candidate coefficients
    pub candidate: ModelCoefficients,
    /// Loss at the candidate
    pub candidate_loss: f64,
}

impl<const N: usize> DescentStep<N> {
    /// Whether the candidate may replace the current coefficients
    pub fn is_acceptable(&self) -> bool {
        self.candidate_loss <= self.base_loss
    }
}

/// The fixed inputs of one descent phase
#[derive(Debug, Clone, Copy)]
pub struct DescentProblem<'a> {
    /// Training window
    pub observations: &'a [Observation],
    /// Per-class regression targets
    pub targets: &'a ClassTargets,
    /// Clamp ranges
    pub bounds: &'a CoefficientBounds,
}

impl DescentProblem<'_> {
    fn loss_at(&self, model: &ModelCoefficients) -> f64 {
        loss(self.observations, model, self.targets)
    }

    fn with_value(model: &ModelCoefficients, index: usize, value: f64) -> ModelCoefficients {
        let mut k = model.to_array();
        k[index] = value;
        ModelCoefficients::from_array(k)
    }

    /// Central-difference derivative of the loss along one coefficient
    pub fn partial(&self, model: &ModelCoefficients, index: usize, eps: f64) -> f64 {
        let value = model.to_array()[index];
        let plus = Self::with_value(model, index, self.bounds.clamp(index, value + eps));
        let minus = Self::with_value(model, index, self.bounds.clamp(index, value - eps));
        (self.loss_at(&plus) - self.loss_at(&minus)) / (2.0 * eps)
    }

    /// Evaluate one step over the coefficients in `indices`
    pub fn step<const N: usize>(
        &self,
        model: &ModelCoefficients,
        indices: [usize; N],
        epsilons: [f64; N],
        learn_rate: f64,
    ) -> DescentStep<N> {
        let base_loss = self.loss_at(model);

        let mut gradient = [0.0; N];
        for (slot, (&index, &eps)) in gradient.iter_mut().zip(indices.iter().zip(epsilons.iter())) {
            *slot = self.partial(model, index, eps);
        }

        let mut k = model.to_array();
        for (&index, &g) in indices.iter().zip(gradient.iter()) {
            k[index] = self.bounds.clamp(index, k[index] - learn_rate * g);
        }
        let candidate = ModelCoefficients::from_array(k);

        DescentStep {
            base_loss,
            gradient,
            candidate,
            candidate_loss: self.loss_at(&candidate),
        }
    }
}

fn apply<const N: usize>(set: &mut CoefficientSet, step: &DescentStep<N>, phase: &str) -> PhaseOutcome {
    debug!(
        "{}: loss {:.6} -> {:.6}, gradient {:?}",
        phase, step.base_loss, step.candidate_loss, step.gradient
    );

    if step.is_acceptable() {
        set.model = step.candidate;
        info!("{}: accepted, loss {:.6} -> {:.6}", phase, step.base_loss, step.candidate_loss);
        PhaseOutcome::Improved {
            before: step.base_loss,
            after: step.candidate_loss,
        }
    } else {
        PhaseOutcome::NoImprovement {
            before: step.base_loss,
            candidate: step.candidate_loss,
        }
    }
}

/// Phase 2: one K1/K2 step
pub fn descend_primary(set: &mut CoefficientSet, observations: &[Observation]) -> PhaseOutcome {
    let learning = set.learning;
    if !learning.phase2_enabled {
        return PhaseOutcome::Disabled;
    }
    if observations.len() < learning.min_samples_k {
        return PhaseOutcome::InsufficientSamples {
            have: observations.len(),
            need: learning.min_samples_k,
        };
    }

    let problem = DescentProblem {
        observations,
        targets: &set.targets,
        bounds: &set.bounds,
    };
    let step = problem.step(&set.model, PRIMARY_INDICES, PRIMARY_EPSILONS, learning.learn_rate_k);
    apply(set, &step, "Phase2")
}

/// Phase 3: one joint K3..K7 step
pub fn descend_secondary(set: &mut CoefficientSet, observations: &[Observation]) -> PhaseOutcome {
    let learning = set.learning;
    if !learning.phase3_enabled {
        return PhaseOutcome::Disabled;
    }
    if observations.len() < learning.min_samples_phase3 {
        return PhaseOutcome::InsufficientSamples {
            have: observations.len(),
            need: learning.min_samples_phase3,
        };
    }

    let problem = DescentProblem {
        observations,
        targets: &set.targets,
        bounds: &set.bounds,
    };
    let step = problem.step(&set.model, SECONDARY_INDICES, SECONDARY_EPSILONS, learning.learn_rate_phase3);
    apply(set, &step, "Phase3")
}
