pub mod bit;
pub mod cfg;
pub mod de;
pub mod group;
pub mod pat;
pub mod ser;
pub mod window;

/// The basic representation of a tagged event
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct Tag {
    /// Counter in time units from arbitrary offset
    pub time: i64,
    /// Channel (1-indexed) of the event
    pub channel: u8,
}

impl Tag {
    /// True for the detector channels that take part in events. Higher
    /// channels carry clock or reference signals.
    #[inline]
    pub fn is_data(&self) -> bool {
        self.channel >= 1 && self.channel <= DATA_CHANNELS as u8
    }
}

/// Number of detector channels grouped into events
pub const DATA_CHANNELS: usize = 4;
/// Default number of tags the device hands back per poll
pub const BUFFER_CAPACITY: usize = 100_000;
pub const CHAN4: [u8; 4] = [1, 2, 3, 4];

/// One poll worth of tags: a bounded container with an explicit valid
/// length. Anything beyond the valid length is never visible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagBuffer {
    tags: Vec<Tag>,
    capacity: usize,
}

impl TagBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        TagBuffer {
            tags: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Build a buffer from the parallel timestamp/channel arrays a device
    /// fills in, honouring its `valid` count.
    pub fn from_raw(times: &[i64], channels: &[u8], valid: usize) -> Self {
        let n = valid.min(times.len()).min(channels.len());
        TagBuffer {
            tags: times[..n]
                .iter()
                .zip(&channels[..n])
                .map(|(&time, &channel)| Tag { time, channel })
                .collect(),
            capacity: times.len().max(n),
        }
    }

    /// Build a buffer holding at most `capacity` of `tags`, dropping the rest.
    pub fn from_tags(mut tags: Vec<Tag>, capacity: usize) -> Self {
        tags.truncate(capacity);
        TagBuffer { tags, capacity }
    }

    /// Append a tag; returns false (and drops the tag) once full
    pub fn push(&mut self, tag: Tag) -> bool {
        if self.tags.len() >= self.capacity {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn valid(&self) -> &[Tag] {
        &self.tags
    }

    pub fn valid_count(&self) -> usize {
        self.tags.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tags.len() >= self.capacity
    }
}
