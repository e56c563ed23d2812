#![allow(dead_code)]

use coinctools::Tag;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Photon pairs on channels 1 and 2 every ~1000 units with a small partner
/// delay, a stray channel 3 or 4 hit now and then, and a channel 5 clock.
pub fn load_test_data(n: usize) -> Vec<Tag> {
    let mut rng = StdRng::seed_from_u64(0x9e37_79b9_7f4a_7c15);
    let mut tags = Vec::with_capacity(n);
    let mut time = 0i64;
    while tags.len() < n {
        time += rng.gen_range(500..1500);
        tags.push(Tag { time, channel: 1 });
        tags.push(Tag { time: time + rng.gen_range(0..20), channel: 2 });
        if rng.gen_bool(1.0 / 7.0) {
            tags.push(Tag { time: time + 30, channel: rng.gen_range(3..=4) });
        }
        if rng.gen_bool(1.0 / 3.0) {
            tags.push(Tag { time: time + 40, channel: 5 });
        }
    }
    tags.truncate(n);
    tags
}
