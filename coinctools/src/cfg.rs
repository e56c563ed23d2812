//! Configuration tools: formats for declaring and recording runs

use crate::group::Counters;
use chrono::{DateTime, offset::Local};
use serde::{Serialize, Deserialize};
use std::path::PathBuf;
use std::time::Duration;

/// Acquisition run description for both declaring and recording runs in
/// text files. We use JSON as the text file format.
///
/// ## Declaring a run
///
/// Every field has a default, so a declaration only names what differs: e.g.
/// `{"name": "bell_test", "window": {"fixed": 5000}, "collect_rounds": 1000}`.
/// Durations are parsed as in [humantime](https://docs.rs/humantime/), e.g.
/// `100ms` or `2s 500ms`.
///
/// ## Recording a run
///
/// A run is recorded in the same format as the declaration, filling in the
/// fields that were empty: the start timestamp, the window actually used,
/// the collection time after rate calibration, the event counters, and
/// counts per channel and per coincidence pattern. The `singles` field is
/// mapped from `Single::Channel(chan)` to `Single::ChannelCounts(chan, counts)`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct Run {
    /// Base name of the output files
    pub name:               String,
    pub timestamp:          Option<DateTime<Local>>,
    pub mode:               Mode,
    pub window:             Window,
    /// Requested time per poll, capped by calibration
    #[serde(with = "humantime_serde")]
    pub collect_time:       Duration,
    /// Polls after the warm-up buffers
    pub collect_rounds:     u32,
    pub buffer_capacity:    usize,
    pub warmup_buffers:     u32,
    /// Anchor channel for window estimation; `null` uses every detector channel
    pub reference_channel:  Option<u8>,
    /// Write out the event still open when the run ends
    pub flush_on_shutdown:  bool,
    /// Keep the raw tags of every grouped buffer
    pub save_tags:          bool,
    /// Buffers in flight between acquisition and grouping
    pub queue_depth:        usize,
    /// Stop once this many events have been written
    pub event_limit:        Option<u64>,
    pub sim:                SimParams,
    pub seed:               Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_used:        Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub collect_time_used:  Option<Duration>,
    /// Total tag rate in MHz measured during calibration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rate:         Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts:             Option<Counters>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub singles:            Vec<Single>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub coincidences:       Vec<Coincidence>,
}

/// Where the tags come from
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Tags from the time tagger inputs
    Signal,
    /// Periodic bursts as from the tagger's internal signal generator
    Selftest,
    /// Software generated, uniform partner delays
    Flatgen,
    /// Software generated, normally distributed partner delays
    Normgen,
    /// Tags saved by an earlier run
    Replay(PathBuf),
}

/// Coincidence window: estimated from the first grouped buffer, or fixed
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Auto,
    Fixed(i64),
}

/// Parameters of the software generators, in tag time units (ps)
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
#[serde(default)]
pub struct SimParams {
    /// Pair rate in MHz
    pub rate:   f64,
    /// Centre of the partner delay distribution
    pub center: f64,
    /// Width of the partner delay distribution
    pub width:  f64,
}

/// Specify a channel, or specify a channel with some number of counts
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "snake_case")]
pub enum Single {
    Channel(u8),
    ChannelCounts((u8, u64)),
}

/// Written events with one channel pattern, with the device counter index
/// of that pattern
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Coincidence {
    pub channels:   Vec<u8>,
    pub index:      i8,
    pub counts:     u64,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Signal
    }
}

impl Default for Window {
    fn default() -> Self {
        Window::Auto
    }
}

impl Default for SimParams {
    fn default() -> Self {
        SimParams {
            rate:   1.0,
            center: 1000.,
            width:  1000.,
        }
    }
}

/// Creates a run with the acquisition defaults
impl Default for Run {
    fn default() -> Self {
        Run {
            name:               String::from("data_test"),
            timestamp:          None,
            mode:               Mode::default(),
            window:             Window::default(),
            collect_time:       Duration::from_millis(100),
            collect_rounds:     100,
            buffer_capacity:    crate::BUFFER_CAPACITY,
            warmup_buffers:     2,
            reference_channel:  Some(1),
            flush_on_shutdown:  false,
            save_tags:          false,
            queue_depth:        4,
            event_limit:        None,
            sim:                SimParams::default(),
            seed:               None,
            window_used:        None,
            collect_time_used:  None,
            total_rate:         None,
            counts:             None,
            singles:            Vec::new(),
            coincidences:       Vec::new(),
        }
    }
}

impl Run {
    /// Channels whose singles should be recorded
    pub fn singles_channels(&self) -> Vec<u8> {
        let chs: Vec<u8> = self
            .singles
            .iter()
            .map(|s| match s {
                Single::Channel(ch) => *ch,
                Single::ChannelCounts((ch, _)) => *ch,
            })
            .collect();
        if chs.is_empty() {
            crate::CHAN4.to_vec()
        } else {
            chs
        }
    }
}
