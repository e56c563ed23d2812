//! Tools for counting patterns in tags and grouped events

use crate::bit::mask_to_chans;
use crate::group::FinalizedEvent;
use crate::Tag;

/// Count number of tags in a given channel.
pub fn singles(tags: &[Tag], ch: u8) -> u64 {
    let n = tags.iter().filter(|&&t| t.channel == ch).count();
    return n as u64;
}

/// Event counts per channel pattern
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternCounts {
    by_mask: [u64; 32],
}

impl PatternCounts {
    pub fn add(&mut self, event: &FinalizedEvent) {
        self.by_mask[event.mask() as usize & 0x1f] += 1;
    }

    /// Non-zero patterns as (channels, counts), in mask order
    pub fn nonzero(&self) -> impl Iterator<Item = (Vec<u8>, u64)> + '_ {
        self.by_mask
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(m, &c)| (mask_to_chans(m as u8), c))
    }
}

/// Rate in MHz of `n` tags seen over `micros` microseconds
pub fn rate_mhz(n: u64, micros: f64) -> f64 {
    if micros <= 0.0 {
        return 0.0;
    }
    n as f64 / micros
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(slots: [Option<i64>; 4]) -> FinalizedEvent {
        FinalizedEvent { slots, accepted: true }
    }

    #[test]
    fn counts_by_pattern() {
        let mut counts = PatternCounts::default();
        counts.add(&event([Some(1), Some(2), None, None]));
        counts.add(&event([None, Some(9), Some(9), Some(9)]));
        counts.add(&event([Some(5), Some(6), None, None]));
        assert_eq!(
            counts.nonzero().collect::<Vec<_>>(),
            vec![(vec![1, 2], 2), (vec![2, 3, 4], 1)],
        );
    }

    #[test]
    fn singles_per_channel() {
        let tags = [
            Tag { time: 0, channel: 1 },
            Tag { time: 1, channel: 5 },
            Tag { time: 2, channel: 1 },
        ];
        assert_eq!(singles(&tags, 1), 2);
        assert_eq!(singles(&tags, 3), 0);
    }

    #[test]
    fn rates() {
        assert_eq!(rate_mhz(3000, 1000.0), 3.0);
        assert_eq!(rate_mhz(10, 0.0), 0.0);
    }
}
