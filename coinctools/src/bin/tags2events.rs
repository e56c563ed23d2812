//! `tags2events [OPTIONS] TAGS`
//!
//! Group saved time tags (tab-separated `channel\ttime`, optionally zstd
//! compressed as `.tsv.zst`) into coincidence events, writing the event
//! text format to standard output and the per-pattern counts to standard
//! error. Without `--win` the window is estimated from the first `--calib`
//! tags, as an acquisition run would.

use coinctools::{bit, de, pat, ser, window};
use coinctools::group::EventGrouper;

use anyhow::{bail, Result};
use std::io::{stderr, stdout, BufWriter, Write};
use std::path::PathBuf;

#[derive(Debug, argh::FromArgs, Clone)]
/// cli app args
pub struct CliArgs {
    /// tags file path
    #[argh(positional)]
    pub tags: PathBuf,
    /// fixed coincidence window
    #[argh(option)]
    pub win: Option<i64>,
    /// reference channel for window estimation (0 for none)
    #[argh(option, default = "1")]
    pub reference: u8,
    /// number of tags used for window estimation
    #[argh(option, default = "coinctools::BUFFER_CAPACITY")]
    pub calib: usize,
    /// write out the event still open at the end of the file
    #[argh(switch)]
    pub flush: bool,
}

fn main() -> Result<()> {
    let config: CliArgs = argh::from_env();

    let tags = de::tags_file(&config.tags)?;

    let win = match config.win {
        Some(w) => w,
        None => {
            let reference = if config.reference == 0 { None } else { Some(config.reference) };
            let calib = &tags[..config.calib.min(tags.len())];
            window::estimate(calib, reference)
        }
    };
    if win <= 0 {
        bail!("no usable coincidence window for {}", config.tags.display());
    }

    let stdout = stdout();
    let mut wtr = ser::EventWriter::new(BufWriter::new(stdout.lock()))?;
    let mut counts = pat::PatternCounts::default();
    let mut grouper = EventGrouper::new(win);
    let mut result = Ok(());
    grouper.process_with(&tags, |e| {
        if e.accepted && result.is_ok() {
            counts.add(e);
            result = wtr.write(e);
        }
    });
    result?;
    if config.flush {
        if let Some(e) = grouper.finish().filter(|e| e.accepted) {
            counts.add(&e);
            wtr.write(&e)?;
        }
    }
    wtr.flush()?;

    let stderr = stderr();
    let mut log = stderr.lock();
    let c = grouper.counters();
    writeln!(log, "window\t{}", win)?;
    writeln!(log, "opened\t{}\nwritten\t{}", c.events_opened, c.events_written)?;
    for (chs, n) in counts.nonzero() {
        let m = bit::chans_to_mask(&chs);
        let idx = bit::mask_to_coincidence_index(m).map(|i| i as i64).unwrap_or(-1);
        writeln!(log, "{:?}\t{}\t{}", chs, idx, n)?;
    }
    Ok(())
}
