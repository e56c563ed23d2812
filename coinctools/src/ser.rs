//! Serialization of tags and events, supporting `.tsv`, `.tsv.zst` and the
//! event text format

use crate::group::FinalizedEvent;
use crate::Tag;
use anyhow::Result;
use std::io::Write;
use zstd::stream;

/// First line of every event file
pub const EVENTS_HEADER: &str = "#timestamp  channel";

/// Writer for the event text format: a header line, then one line per event
/// holding the timestamps of its filled channels, in channel order, separated
/// by single spaces. Lines are as wide as the event.
pub struct EventWriter<W: Write> {
    wtr: csv::Writer<W>,
}

impl<W: Write> EventWriter<W> {
    pub fn new(mut inner: W) -> Result<Self> {
        writeln!(inner, "{}", EVENTS_HEADER)?;
        let wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(b' ')
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(inner);
        Ok(EventWriter { wtr })
    }

    pub fn write(&mut self, event: &FinalizedEvent) -> Result<()> {
        self.wtr.write_record(event.times().map(|t| t.to_string()))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.wtr.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.wtr.into_inner().map_err(|e| anyhow::anyhow!("{}", e.error()))
    }
}

/// Serialize tags to tab-separated values (channel, time).
pub fn tsv(wtr: &mut csv::Writer<impl Write>, tags: &[Tag]) -> Result<()> {
    for tag in tags.iter() {
        wtr.write_record(&[tag.channel.to_string(), tag.time.to_string()])?;
    }
    Ok(())
}

/// Serialize to .tsv.zst format: one zstd frame of tab-separated tags
///
/// Like many compressors, `zstd`'s API is linear under concatenation, in that
/// `zstd(m1 + m2) == zstd(m1) + zstd(m2)` (ignoring that the compressed bytes
/// will actually differ). So while we write repeated compressed frames when
/// saving data, it suffices to compress them individually.
pub fn tsv_zst(wtr: &mut impl Write, tags: &[Tag]) -> Result<()> {
    let mut zwtr = stream::write::Encoder::new(wtr, 0)?;
    {
        let mut cwtr = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .from_writer(&mut zwtr);
        tsv(&mut cwtr, tags)?;
        cwtr.flush()?;
    }
    zwtr.finish()?;
    Ok(())
}
