//! Coincidence window calibration from one buffer of tags
//!
//! The window is derived from the spacing of detector tags: starting from an
//! anchor tag, the gap to the next partner tag is sampled, anchors advance
//! through the buffer, and the window is half the mean sampled gap. Only
//! detector channels take part; clock and reference channels are ignored.

use crate::bit::BitOps;
use crate::Tag;

/// Maximum number of gap samples collected from one buffer
pub const MAX_SAMPLES: usize = 1000;

/// Which later tag closes a gap opened by an anchor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GapPairing {
    /// The next tag on the anchor's own channel. Matches the acquisition
    /// code that produced the reference data sets.
    SameChannel,
    /// The next tag on any other detector channel
    DistinctChannel,
}

impl GapPairing {
    #[inline]
    fn partners(self, anchor: u8, other: u8) -> bool {
        match self {
            GapPairing::SameChannel => anchor == other,
            GapPairing::DistinctChannel => anchor != other,
        }
    }
}

impl Default for GapPairing {
    fn default() -> Self {
        GapPairing::SameChannel
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowEstimator {
    /// Restrict anchors to this channel
    pub reference_channel: Option<u8>,
    pub pairing: GapPairing,
    pub max_samples: usize,
}

impl Default for WindowEstimator {
    fn default() -> Self {
        WindowEstimator {
            reference_channel: None,
            pairing: GapPairing::default(),
            max_samples: MAX_SAMPLES,
        }
    }
}

impl WindowEstimator {
    pub fn new(reference_channel: Option<u8>) -> Self {
        WindowEstimator {
            reference_channel,
            ..Default::default()
        }
    }

    pub fn with_pairing(mut self, pairing: GapPairing) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    fn is_anchor(&self, t: &Tag) -> bool {
        t.is_data()
            && match self.reference_channel {
                Some(ch) => t.channel == ch,
                None => true,
            }
    }

    /// Collect the positive anchor-to-partner gaps, in buffer order
    pub fn samples(&self, tags: &[Tag]) -> Vec<i64> {
        let mut samples = Vec::new();
        // Channels whose anchors can no longer find a partner
        let mut exhausted = 0u8;
        let mut anchor = tags.iter().position(|t| self.is_anchor(t));

        while let Some(i) = anchor {
            if samples.len() >= self.max_samples {
                break;
            }
            let t0 = tags[i];
            if !exhausted.check(t0.channel as usize) {
                let partner = tags[i + 1..]
                    .iter()
                    .find(|t| t.is_data() && self.pairing.partners(t0.channel, t.channel));
                match partner {
                    Some(t1) => {
                        let gap = t1.time.saturating_sub(t0.time);
                        if gap > 0 {
                            samples.push(gap);
                        }
                    }
                    // Nothing after this tag pairs with it, so nothing after
                    // it pairs with a later anchor of the same channel either.
                    // For distinct pairing the rest of the buffer is all one
                    // channel.
                    None => match (self.pairing, self.reference_channel) {
                        (GapPairing::SameChannel, None) => exhausted.set(t0.channel as usize),
                        _ => break,
                    },
                }
            }
            anchor = tags[i + 1..]
                .iter()
                .position(|t| self.is_anchor(t))
                .map(|j| i + 1 + j);
        }
        samples
    }

    /// Window width in tag time units, 0 when the buffer has no usable gaps
    pub fn estimate(&self, tags: &[Tag]) -> i64 {
        let samples = self.samples(tags);
        if samples.is_empty() {
            return 0;
        }
        let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64;
        (mean / 2.0) as i64
    }
}

/// Estimate a coincidence window with the default pairing and sample cap
pub fn estimate(tags: &[Tag], reference_channel: Option<u8>) -> i64 {
    WindowEstimator::new(reference_channel).estimate(tags)
}
