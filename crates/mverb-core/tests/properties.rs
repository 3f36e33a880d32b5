//! Property-based tests for automation tracks and preset chunks.

use mverb_core::{chunk, AutomationPoint, ChunkVersion, ParameterTrack, PointQueue, StateSnapshot, VALUE_EPSILON};
use proptest::prelude::*;

fn points() -> impl Strategy<Value = Vec<(i32, f64)>> {
    prop::collection::vec((-16i32..600, 0.0f64..=1.0), 0..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Walking a callback sub-block by sub-block ends on the last point's
    /// value and never emits twice in one window.
    #[test]
    fn track_ends_on_last_point(raw in points(), num_samples in 1usize..512, window in 1usize..64) {
        let points: Vec<AutomationPoint> = raw.iter().map(|(o, v)| AutomationPoint::new(*o, *v)).collect();
        let mut track = ParameterTrack::new(0, 0.5);
        track.begin_changes(&PointQueue::new(0, &points), num_samples);

        let mut remaining = num_samples;
        while remaining > 0 {
            let len = remaining.min(window);
            let mut emits = 0;
            track.advance(len, |_| emits += 1);
            prop_assert!(emits <= 1);
            remaining -= len;
        }

        let expected = points.last().map_or(0.5, |p| p.value);
        prop_assert_eq!(track.value(), expected);
        prop_assert_eq!(track.pending_points(), 0);
    }

    /// A flush reaches the same value as advancing through the callback.
    #[test]
    fn flush_matches_advance(raw in points(), num_samples in 1usize..512) {
        let points: Vec<AutomationPoint> = raw.iter().map(|(o, v)| AutomationPoint::new(*o, *v)).collect();
        let queue = PointQueue::new(0, &points);

        let mut advanced = ParameterTrack::new(0, 0.0);
        advanced.begin_changes(&queue, num_samples);
        advanced.advance(num_samples, |_| {});

        let mut flushed = ParameterTrack::new(0, 0.0);
        flushed.begin_changes(&queue, num_samples);
        flushed.flush_changes();

        prop_assert_eq!(advanced.value(), flushed.value());
    }

    /// Emitted values always differ from the previously applied one.
    #[test]
    fn emits_are_never_redundant(raw in points(), num_samples in 1usize..512) {
        let points: Vec<AutomationPoint> = raw.iter().map(|(o, v)| AutomationPoint::new(*o, *v)).collect();
        let mut track = ParameterTrack::new(0, 0.5);
        track.begin_changes(&PointQueue::new(0, &points), num_samples);

        let mut applied = 0.5;
        for _ in 0..num_samples {
            track.advance(1, |v| {
                assert!((v - applied).abs() > VALUE_EPSILON);
                applied = v;
            });
        }
    }

    /// Narrow chunks lose at most f32 precision.
    #[test]
    fn narrow_chunks_round_trip_within_f32(values in prop::array::uniform10(0.0f64..=1.0)) {
        let snapshot = StateSnapshot::new(values);
        let decoded = chunk::decode(&chunk::encode_with(&snapshot, ChunkVersion::V1)).unwrap();
        for (original, restored) in snapshot.values().iter().zip(decoded.snapshot.values()) {
            prop_assert!((original - restored).abs() < 1e-6);
        }
    }

    /// Arbitrary bytes never panic the decoder.
    #[test]
    fn decoder_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = chunk::decode(&bytes);
    }
}
