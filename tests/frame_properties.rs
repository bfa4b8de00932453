//! Property tests for frame classification and counter consistency.

use icube_control::sdk::{CameraIndex, MockSdk};
use icube_control::FrameSink;
use proptest::prelude::*;
use std::sync::Arc;

const CAPACITY: usize = 256;

fn sink() -> FrameSink<MockSdk> {
    FrameSink::new(&Arc::new(MockSdk::new()), CameraIndex(0), CAPACITY, None)
}

proptest! {
    #[test]
    fn counters_account_for_every_frame(sizes in prop::collection::vec(0usize..CAPACITY * 2, 0..64)) {
        let sink = sink();
        for &size in &sizes {
            sink.on_frame(&vec![1u8; size]);
        }

        let expected_good = sizes.iter().filter(|&&s| s > 0 && s < CAPACITY).count() as u64;
        let counts = sink.counts();
        prop_assert_eq!(counts.total(), sizes.len() as u64);
        prop_assert_eq!(counts.good, expected_good);
    }

    #[test]
    fn valid_frame_is_stored_verbatim(bytes in prop::collection::vec(any::<u8>(), 1..CAPACITY)) {
        let sink = sink();
        sink.on_frame(&[0xFF; 7]);
        sink.on_frame(&bytes);

        prop_assert_eq!(sink.last_image_size(), bytes.len());
        let snapshot = sink.last_frame().unwrap();
        prop_assert_eq!(snapshot.bytes(), bytes.as_slice());
    }

    #[test]
    fn invalid_frame_moves_only_bad_count(size in prop_oneof![Just(0usize), CAPACITY..CAPACITY * 4]) {
        let sink = sink();
        sink.on_frame(&[3; 10]);
        let before = sink.counts();

        sink.on_frame(&vec![0u8; size]);

        let after = sink.counts();
        prop_assert_eq!(after.good, before.good);
        prop_assert_eq!(after.bad, before.bad + 1);
        prop_assert_eq!(sink.last_image_size(), 0);
    }
}
