//! Streaming grouping of tags into coincidence events
//!
//! Tags are folded one at a time into a pending event holding one slot per
//! detector channel. A tag arriving more than one coincidence window after
//! its predecessor closes the pending event and opens the next one. A closed
//! event is accepted when it saw more than one channel and no channel twice.
//!
//! The scan is continuous across calls to [`EventGrouper::process`], so an
//! event straddling two device buffers is grouped exactly as if the buffers
//! had arrived as one.

use crate::bit::BitOps;
use crate::{Tag, DATA_CHANNELS};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Running totals for one grouping instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Event boundaries seen
    pub events_opened: u64,
    /// Accepted events handed to the sink
    pub events_written: u64,
    /// Closed events that were not accepted
    pub events_rejected: u64,
    /// Tags that hit an already filled slot
    pub duplicate_hits: u64,
    /// Tags earlier than their predecessor
    pub out_of_order: u64,
    /// Detector tags folded into events
    pub tags_grouped: u64,
    /// Clock and reference tags passed over
    pub tags_skipped: u64,
}

/// The event currently being filled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingEvent {
    pub slots: [Option<i64>; DATA_CHANNELS],
    pub good: bool,
}

impl PendingEvent {
    /// Open an event with its first tag in place
    fn open(first: Tag) -> Self {
        let mut slots = [None; DATA_CHANNELS];
        slots[first.channel as usize - 1] = Some(first.time);
        PendingEvent { slots, good: true }
    }

    /// Put a tag in its channel's slot, spoiling the event if the slot is taken
    fn fold(&mut self, tag: Tag) -> bool {
        let slot = &mut self.slots[tag.channel as usize - 1];
        match slot {
            None => {
                *slot = Some(tag.time);
                true
            }
            Some(_) => {
                self.good = false;
                false
            }
        }
    }

    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn close(self) -> FinalizedEvent {
        FinalizedEvent {
            slots: self.slots,
            accepted: self.good && self.filled() > 1,
        }
    }
}

/// A closed event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinalizedEvent {
    /// Timestamp per detector channel 1..=4, `None` where the channel was silent
    pub slots: [Option<i64>; DATA_CHANNELS],
    pub accepted: bool,
}

impl FinalizedEvent {
    /// Filled slots in channel order
    pub fn times(&self) -> impl Iterator<Item = i64> + '_ {
        self.slots.iter().flatten().copied()
    }

    /// Channel activity bitmask (bit 0 = channel 1)
    pub fn mask(&self) -> u8 {
        let mut m = 0u8;
        for (i, s) in self.slots.iter().enumerate() {
            m.change(i, s.is_some());
        }
        m
    }

    pub fn channels(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Scan state carried from one buffer to the next
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GrouperState {
    /// Last detector tag seen, `None` before the first one
    pub last: Option<Tag>,
    pub pending: Option<PendingEvent>,
}

/// Stateful single pass grouping of a tag stream
#[derive(Clone, Debug)]
pub struct EventGrouper {
    window: i64,
    state: GrouperState,
    counters: Counters,
}

impl EventGrouper {
    pub fn new(window: i64) -> Self {
        EventGrouper {
            window,
            state: GrouperState::default(),
            counters: Counters::default(),
        }
    }

    pub fn window(&self) -> i64 {
        self.window
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn state(&self) -> &GrouperState {
        &self.state
    }

    /// True when the tag starts a new event
    #[inline]
    fn is_boundary(&self, tag: Tag) -> bool {
        match self.state.last {
            None => true,
            Some(last) => {
                let delta_t = tag.time.saturating_sub(last.time);
                let delta_ch = (tag.channel as i16 - last.channel as i16).abs();
                delta_t > self.window && delta_ch < 5
            }
        }
    }

    /// Fold one tag in, calling `emit` for the event it closes, if any
    #[inline]
    pub fn push<F>(&mut self, tag: Tag, mut emit: F)
    where
        F: FnMut(&FinalizedEvent),
    {
        if !tag.is_data() {
            self.counters.tags_skipped += 1;
            return;
        }
        self.counters.tags_grouped += 1;
        if let Some(last) = self.state.last {
            if tag.time < last.time {
                self.counters.out_of_order += 1;
                warn!(
                    "tag out of order: {} on channel {} after {} on channel {}",
                    tag.time, tag.channel, last.time, last.channel,
                );
            }
        }

        if self.is_boundary(tag) {
            self.counters.events_opened += 1;
            if let Some(pending) = self.state.pending.take() {
                let event = pending.close();
                self.tally(&event);
                emit(&event);
            }
            self.state.pending = Some(PendingEvent::open(tag));
        } else if let Some(pending) = self.state.pending.as_mut() {
            if !pending.fold(tag) {
                self.counters.duplicate_hits += 1;
            }
        }
        self.state.last = Some(tag);
    }

    /// Group a buffer, returning every event it closed, accepted or not
    pub fn process(&mut self, tags: &[Tag]) -> Vec<FinalizedEvent> {
        let mut events = Vec::new();
        self.process_with(tags, |e| events.push(*e));
        events
    }

    /// Group a buffer, handing each closed event to `emit`
    pub fn process_with<F>(&mut self, tags: &[Tag], mut emit: F)
    where
        F: FnMut(&FinalizedEvent),
    {
        for &tag in tags {
            self.push(tag, &mut emit);
        }
    }

    /// Close the pending event at the end of a run. Runs normally end without
    /// this, leaving the last event unwritten.
    pub fn finish(&mut self) -> Option<FinalizedEvent> {
        let event = self.state.pending.take()?.close();
        self.tally(&event);
        Some(event)
    }

    fn tally(&mut self, event: &FinalizedEvent) {
        if event.accepted {
            self.counters.events_written += 1;
        } else {
            self.counters.events_rejected += 1;
        }
    }
}
