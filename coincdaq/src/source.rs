//! Where the tags come from: the time tagger itself, or stand-ins for it
//!
//! A source is polled once per round and hands back the tags it collected
//! during the collection time, at most one buffer's worth. Tags within a
//! buffer, and from one buffer to the next, are in time order.

use anyhow::{bail, Result};
use coinctools::cfg::{Mode, Run, SimParams};
use coinctools::{de, Tag, TagBuffer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal, Uniform};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::DaqError;

/// Tag time units (ps) per microsecond
pub const PS_PER_US: i64 = 1_000_000;
/// Channel of the simulated reference clock
pub const CLOCK_CHANNEL: u8 = 5;
/// Reference clock period, 1 us
pub const CLOCK_PERIOD: i64 = 1_000_000;

pub trait TimestampSource: Send {
    /// Collect tags for `dur` and return at most `capacity` of them
    fn poll(&mut self, dur: Duration, capacity: usize) -> Result<TagBuffer>;

    /// Release the device. Called exactly once, by [`Device`].
    fn close(&mut self) {}
}

/// Owns an open source and closes it when dropped, whichever way the run ends
pub struct Device(Box<dyn TimestampSource>);

impl Device {
    pub fn new(source: Box<dyn TimestampSource>) -> Self {
        Device(source)
    }
}

impl Deref for Device {
    type Target = dyn TimestampSource;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for Device {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        debug!("closing tag source");
        self.0.close();
    }
}

/// Open the source a run asks for
pub fn open(run: &Run) -> Result<Device> {
    let source: Box<dyn TimestampSource> = match &run.mode {
        Mode::Signal => return Err(DaqError::NoDevice.into()),
        Mode::Selftest => Box::new(SimSource::new(SimKind::Selftest, run.sim, run.seed)?),
        Mode::Flatgen => Box::new(SimSource::new(SimKind::Flat, run.sim, run.seed)?),
        Mode::Normgen => Box::new(SimSource::new(SimKind::Normal, run.sim, run.seed)?),
        Mode::Replay(path) => Box::new(ReplaySource::from_file(path)?),
    };
    info!("opened {:?} source", run.mode);
    Ok(Device::new(source))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKind {
    /// Bursts of 3 pulses 80 ns apart every 800 ns, on channels 1 and 2 at
    /// once. The estimated window spans a whole burst, so pair these with a
    /// fixed window.
    Selftest,
    /// Photon pairs, partner delay uniform over `center ± width`
    Flat,
    /// Photon pairs, partner delay normal with mean `center`, deviation `width`
    Normal,
}

const BURST_PERIOD: i64 = 80_000;
const BURST_PULSES: i64 = 3;
const BURST_SPACING: i64 = 800_000;
/// Fraction of pairs accompanied by an uncorrelated dark count
const DARK_FRACTION: f64 = 0.1;

enum Delay {
    Flat(Uniform<f64>),
    Normal(Normal<f64>),
}

impl Delay {
    fn sample(&self, rng: &mut StdRng) -> i64 {
        let d = match self {
            Delay::Flat(u) => u.sample(rng),
            Delay::Normal(n) => n.sample(rng),
        };
        d.max(0.0) as i64
    }
}

/// Software tag generator standing in for the tagger
pub struct SimSource {
    kind: SimKind,
    rng: StdRng,
    arrivals: Exp<f64>,
    delay: Delay,
    /// Start of the next collection window
    now: i64,
    next_pair: i64,
    /// Tags generated past the end of the last window
    carry: Vec<Tag>,
}

impl SimSource {
    pub fn new(kind: SimKind, params: SimParams, seed: Option<u64>) -> Result<Self> {
        if !(params.rate > 0.0) {
            bail!("simulated pair rate must be positive, got {} MHz", params.rate);
        }
        if !(params.width >= 0.0) {
            bail!("simulated delay width must not be negative, got {}", params.width);
        }
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        // rate is per us, gaps are drawn in ps
        let arrivals = Exp::new(params.rate / PS_PER_US as f64)?;
        let delay = match kind {
            SimKind::Normal => Delay::Normal(Normal::new(params.center, params.width)?),
            _ => Delay::Flat(Uniform::new_inclusive(
                params.center - params.width,
                params.center + params.width,
            )),
        };
        let next_pair = arrivals.sample(&mut rng) as i64;
        Ok(SimSource {
            kind,
            rng,
            arrivals,
            delay,
            now: 0,
            next_pair,
            carry: Vec::new(),
        })
    }

    fn bursts(start: i64, end: i64, tags: &mut Vec<Tag>) {
        let mut b = (start + BURST_SPACING - 1).div_euclid(BURST_SPACING) * BURST_SPACING;
        while b < end {
            for k in 0..BURST_PULSES {
                let time = b + k * BURST_PERIOD;
                tags.push(Tag { time, channel: 1 });
                tags.push(Tag { time, channel: 2 });
            }
            b += BURST_SPACING;
        }
    }

    fn pairs(&mut self, end: i64, tags: &mut Vec<Tag>) {
        while self.next_pair < end {
            let time = self.next_pair;
            let partner = self.rng.gen_range(2..=4);
            tags.push(Tag { time, channel: 1 });
            tags.push(Tag {
                time: time + self.delay.sample(&mut self.rng),
                channel: partner,
            });
            if self.rng.gen_bool(DARK_FRACTION) {
                let jitter = self.arrivals.sample(&mut self.rng) as i64;
                tags.push(Tag {
                    time: time + jitter,
                    channel: self.rng.gen_range(1..=4),
                });
            }
            self.next_pair += 1 + self.arrivals.sample(&mut self.rng) as i64;
        }
    }

    fn clock(start: i64, end: i64, tags: &mut Vec<Tag>) {
        let mut t = (start + CLOCK_PERIOD - 1).div_euclid(CLOCK_PERIOD) * CLOCK_PERIOD;
        while t < end {
            tags.push(Tag { time: t, channel: CLOCK_CHANNEL });
            t += CLOCK_PERIOD;
        }
    }
}

impl TimestampSource for SimSource {
    fn poll(&mut self, dur: Duration, capacity: usize) -> Result<TagBuffer> {
        let start = self.now;
        let end = start + dur.as_micros() as i64 * PS_PER_US;
        let mut tags = std::mem::take(&mut self.carry);
        match self.kind {
            SimKind::Selftest => Self::bursts(start, end, &mut tags),
            SimKind::Flat | SimKind::Normal => self.pairs(end, &mut tags),
        }
        Self::clock(start, end, &mut tags);
        tags.sort_unstable();

        // Partners landing after the window show up in the next poll
        let split = tags.partition_point(|t| t.time < end);
        self.carry = tags.split_off(split);
        self.now = end;

        if tags.len() > capacity {
            warn!("{} tags collected, buffer keeps {}", tags.len(), capacity);
        }
        Ok(TagBuffer::from_tags(tags, capacity))
    }
}

/// Tags saved by an earlier run, replayed at the pace of the collection time
pub struct ReplaySource {
    tags: Vec<Tag>,
    pos: usize,
    now: Option<i64>,
}

impl ReplaySource {
    pub fn new(tags: Vec<Tag>) -> Self {
        ReplaySource { tags, pos: 0, now: None }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let tags = de::tags_file(path)?;
        info!("loaded {} tags from {}", tags.len(), path.display());
        Ok(ReplaySource::new(tags))
    }
}

impl TimestampSource for ReplaySource {
    fn poll(&mut self, dur: Duration, capacity: usize) -> Result<TagBuffer> {
        let rest = &self.tags[self.pos..];
        let start = match (self.now, rest.first()) {
            (Some(t), _) => t,
            (None, Some(first)) => first.time,
            (None, None) => return Ok(TagBuffer::with_capacity(capacity)),
        };
        let end = start + dur.as_micros() as i64 * PS_PER_US;
        let n = rest
            .iter()
            .take(capacity)
            .take_while(|t| t.time < end)
            .count();
        let buffer = TagBuffer::from_tags(rest[..n].to_vec(), capacity);
        self.pos += n;
        self.now = Some(end);
        Ok(buffer)
    }
}
