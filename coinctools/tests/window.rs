use coinctools::window::{self, GapPairing, WindowEstimator};
use coinctools::Tag;

fn tags(raw: &[(i64, u8)]) -> Vec<Tag> {
    raw.iter().map(|&(time, channel)| Tag { time, channel }).collect()
}

#[test]
fn no_pairs_means_no_window() {
    let t = tags(&[(0, 1), (10, 2), (20, 3), (30, 4)]);
    assert_eq!(window::estimate(&t, None), 0);
    assert_eq!(window::estimate(&t, Some(1)), 0);
    assert_eq!(window::estimate(&[], Some(1)), 0);
}

#[test]
fn half_mean_of_reference_gaps() {
    let t = tags(&[
        (0, 1), (5, 2), (50, 5),
        (100, 1), (105, 2), (150, 5),
        (200, 1), (205, 2),
        (300, 1),
    ]);
    let est = WindowEstimator::new(Some(1));
    assert_eq!(est.samples(&t), vec![100, 100, 100]);
    assert_eq!(est.estimate(&t), 50);
    assert_eq!(window::estimate(&t, Some(1)), 50);
}

#[test]
fn estimate_is_pure() {
    let t = tags(&[(0, 1), (7, 1), (19, 2), (30, 1), (41, 2), (90, 1)]);
    let first = window::estimate(&t, None);
    assert_eq!(first, window::estimate(&t, None));
    assert_eq!(t, tags(&[(0, 1), (7, 1), (19, 2), (30, 1), (41, 2), (90, 1)]));
}

#[test]
fn clock_channels_are_not_anchors_or_partners() {
    let t = tags(&[(0, 5), (1, 1), (2, 5), (40, 5), (41, 1)]);
    assert_eq!(window::estimate(&t, None), 20);
    assert_eq!(window::estimate(&t, Some(5)), 0);
}

#[test]
fn sample_cap() {
    let t = tags(&[(0, 1), (100, 1), (400, 1), (900, 1)]);
    let est = WindowEstimator::new(Some(1)).with_max_samples(2);
    assert_eq!(est.samples(&t), vec![100, 300]);
    assert_eq!(est.estimate(&t), 100);
}

#[test]
fn zero_gaps_are_not_sampled() {
    let t = tags(&[(0, 1), (0, 1), (100, 1)]);
    assert_eq!(WindowEstimator::new(Some(1)).samples(&t), vec![100]);
    assert_eq!(window::estimate(&t, Some(1)), 50);
}

#[test]
fn pairing_rules() {
    let t = tags(&[(0, 1), (30, 2), (100, 1), (110, 2)]);

    let same = WindowEstimator::new(Some(1));
    assert_eq!(same.samples(&t), vec![100]);
    assert_eq!(same.estimate(&t), 50);

    let distinct = same.with_pairing(GapPairing::DistinctChannel);
    assert_eq!(distinct.samples(&t), vec![30, 10]);
    assert_eq!(distinct.estimate(&t), 10);
}

#[test]
fn every_channel_anchors_without_reference() {
    let t = tags(&[(0, 1), (10, 2), (40, 1), (70, 2), (75, 3)]);
    let est = WindowEstimator::default();
    assert_eq!(est.samples(&t), vec![40, 60]);
    assert_eq!(est.estimate(&t), 25);
}

#[test]
fn distinct_pairing_stops_on_single_channel_tail() {
    let mut raw = vec![(0, 2), (5, 1)];
    raw.extend((1..2000).map(|i| (10 * i, 1u8)));
    let t = tags(&raw);
    let est = WindowEstimator::default().with_pairing(GapPairing::DistinctChannel);
    assert_eq!(est.samples(&t), vec![5]);
    assert_eq!(est.estimate(&t), 2);
}

#[test]
fn extreme_gap_saturates() {
    let t = tags(&[(i64::MIN, 1), (i64::MAX, 1)]);
    assert_eq!(WindowEstimator::new(Some(1)).samples(&t), vec![i64::MAX]);
    assert_eq!(window::estimate(&t, Some(1)), 1 << 62);
}
