//! Property tests for ordering, monotonicity and the acceptance rule

use proptest::prelude::*;
use skyguard_core::{
    engine::{adapt_thresholds, descend_primary, descend_secondary, loss},
    CloudClass, CoefficientSet, ModelCoefficients, Observation, Thresholds,
};

fn class() -> impl Strategy<Value = CloudClass> {
    (0u8..4).prop_map(|i| CloudClass::try_from(i).unwrap())
}

fn observation() -> impl Strategy<Value = Observation> {
    (-20.0f64..35.0, -45.0f64..25.0, class(), class()).prop_map(|(ambient, object, label, predicted)| {
        Observation { ambient, object, label, predicted }
    })
}

fn coefficients_within_bounds() -> impl Strategy<Value = ModelCoefficients> {
    (
        50.0f64..150.0,
        -400.0f64..400.0,
        0.0f64..200.0,
        0.0f64..300.0,
        0.0f64..200.0,
        -200.0f64..200.0,
        -200.0f64..200.0,
    )
        .prop_map(|(k1, k2, k3, k4, k5, k6, k7)| ModelCoefficients { k1, k2, k3, k4, k5, k6, k7 })
}

proptest! {
    #[test]
    fn thresholds_are_ordered_after_normalize(a in -60.0f64..20.0, b in -60.0f64..20.0, c in -60.0f64..20.0) {
        let thr = Thresholds::new(a, b, c);
        prop_assert!(thr.is_ordered());
    }

    #[test]
    fn classifier_is_monotone(
        a in -60.0f64..20.0, b in -60.0f64..20.0, c in -60.0f64..20.0,
        x in -80.0f64..40.0, y in -80.0f64..40.0,
    ) {
        let thr = Thresholds::new(a, b, c);
        let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
        prop_assert!(thr.classify(lo) <= thr.classify(hi));
    }

    #[test]
    fn threshold_update_keeps_order(
        a in -60.0f64..20.0, b in -60.0f64..20.0, c in -60.0f64..20.0,
        predicted in class(), label in class(), rate in 0.0f64..5.0,
    ) {
        let mut thr = Thresholds::new(a, b, c);
        adapt_thresholds(&mut thr, predicted, label, rate);
        prop_assert!(thr.is_ordered());
    }

    #[test]
    fn model_is_deterministic(k in coefficients_within_bounds(), ta in -30.0f64..40.0, ts in -50.0f64..30.0) {
        prop_assert_eq!(k.sky_temperature(ta, ts).to_bits(), k.sky_temperature(ta, ts).to_bits());
    }

    #[test]
    fn descent_never_increases_loss(
        k in coefficients_within_bounds(),
        window in prop::collection::vec(observation(), 1..40),
        rate in 0.0001f64..10.0,
    ) {
        let mut set = CoefficientSet::default();
        set.model = k;
        set.learning.min_samples_k = 0;
        set.learning.min_samples_phase3 = 0;
        set.learning.learn_rate_k = rate;
        set.learning.learn_rate_phase3 = rate;

        let before = loss(&window, &set.model, &set.targets);
        prop_assume!(before.is_finite());

        descend_primary(&mut set, &window);
        let middle = loss(&window, &set.model, &set.targets);
        prop_assert!(middle <= before);

        descend_secondary(&mut set, &window);
        let after = loss(&window, &set.model, &set.targets);
        prop_assert!(after <= middle);
    }
}
