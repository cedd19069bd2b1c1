/// Property-based tests for the Truth game's lie-detection scoring.
///
/// `analyze` is a pure function over arbitrary tracking samples, so these
/// properties hold for any input rather than just the hand-picked cases
/// already covered by the in-module unit tests.
use partyhub_core::game::truth::{analyze, FaceTrackingSample};
use proptest::prelude::*;

fn sample_strategy() -> impl Strategy<Value = FaceTrackingSample> {
    (
        0.0f64..1.0,
        0.0f64..1.0,
        0.0f64..1.0,
        0.0f64..1.0,
        0.0f64..1.0,
        prop::option::of(prop_oneof!["nervous", "calm", "neutral"].prop_map(String::from)),
        0u64..10_000,
    )
        .prop_map(
            |(eye_blink_rate, eye_movement, facial_tremor, nostril_movement, stress_level, micro_expression, timestamp)| {
                FaceTrackingSample {
                    eye_blink_rate,
                    eye_movement,
                    facial_tremor,
                    nostril_movement,
                    stress_level,
                    micro_expression,
                    timestamp,
                }
            },
        )
}

proptest! {
    #[test]
    fn confidence_always_in_bounds(samples in prop::collection::vec(sample_strategy(), 0..40)) {
        let analysis = analyze(&samples);
        prop_assert!(analysis.confidence <= 100);
    }

    #[test]
    fn fewer_than_five_samples_never_reads_as_a_lie(samples in prop::collection::vec(sample_strategy(), 0..5)) {
        let analysis = analyze(&samples);
        prop_assert_eq!(analysis.confidence, 0);
        prop_assert!(!analysis.is_lie);
    }

    #[test]
    fn analysis_is_deterministic(samples in prop::collection::vec(sample_strategy(), 5..40)) {
        let first = analyze(&samples);
        let second = analyze(&samples);
        prop_assert_eq!(first.confidence, second.confidence);
        prop_assert_eq!(first.is_lie, second.is_lie);
        prop_assert_eq!(first.comment, second.comment);
    }
}
