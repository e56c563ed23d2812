//! Deserialization of tags and events, supporting `.tsv`, `.tsv.zst` and the
//! event text format

use crate::Tag;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::vec::Vec;
use zstd::stream;

/// Deserialize tags from tab-separated values (channel, time).
pub fn tsv(rdr: &mut csv::Reader<impl Read>) -> Result<Vec<Tag>> {
    let mut tags: Vec<Tag> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let channel = record.get(0).context("missing channel column")?;
        let time = record.get(1).context("missing time column")?;
        tags.push(Tag {
            time: time.parse::<i64>()?,
            channel: channel.parse::<u8>()?,
        });
    }
    Ok(tags)
}

/// Deserialize from .tsv.zst format: zstd-compressed tab-separated tags
///
/// `unzstd(m1.z + m2.z) == unzstd(m1.z) + unzstd(m2.z) == m1 + m2`, so a file
/// of repeated compressed frames decompresses as one stream.
pub fn tsv_zst(rdr: impl Read) -> Result<Vec<Tag>> {
    let zrdr = stream::read::Decoder::new(rdr)?;
    let mut crdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_reader(zrdr);
    tsv(&mut crdr)
}

/// Load a tag file, compressed when its name ends in `.zst`
pub fn tags_file(path: &Path) -> Result<Vec<Tag>> {
    let f = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let brdr = BufReader::new(f);
    let tags = match path.extension().and_then(|e| e.to_str()) {
        Some("zst") => tsv_zst(brdr)?,
        _ => {
            let mut crdr = csv::ReaderBuilder::new()
                .has_headers(false)
                .delimiter(b'\t')
                .from_reader(brdr);
            tsv(&mut crdr)?
        }
    };
    Ok(tags)
}

/// Deserialize an event file into the timestamps of each event. The header
/// and any other `#` line are skipped.
pub fn events(rdr: impl Read) -> Result<Vec<Vec<i64>>> {
    let mut crdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(b' ')
        .comment(Some(b'#'))
        .from_reader(rdr);
    let mut events = Vec::new();
    for result in crdr.records() {
        let record = result?;
        let times = record
            .iter()
            .filter(|f| !f.is_empty())
            .map(|f| f.parse::<i64>())
            .collect::<Result<Vec<_>, _>>()?;
        events.push(times);
    }
    Ok(events)
}
