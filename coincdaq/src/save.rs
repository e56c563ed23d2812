use anyhow::{anyhow, Context, Result};
use chrono::Local;
use coinctools::cfg::Run;
use coinctools::group::FinalizedEvent;
use coinctools::ser::EventWriter;
use coinctools::{ser, Tag};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use crate::error::DaqError;

/// Receives every accepted event, in stream order
pub trait EventSink {
    fn write_event(&mut self, event: &FinalizedEvent) -> Result<()>;

    /// Called once when the run ends
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects events in memory
impl EventSink for Vec<FinalizedEvent> {
    fn write_event(&mut self, event: &FinalizedEvent) -> Result<()> {
        self.push(*event);
        Ok(())
    }
}

/// Event text file, `<name>.txt`
///
/// The file is created with the first event, or when the run finishes, so a
/// run that fails during calibration leaves nothing behind.
pub struct TextSink {
    path: PathBuf,
    wtr: Option<EventWriter<BufWriter<File>>>,
}

impl TextSink {
    /// Fails right away if the file already exists
    pub fn create(path: &Path) -> Result<Self> {
        ensure_absent(path)?;
        Ok(TextSink { path: path.to_path_buf(), wtr: None })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut EventWriter<BufWriter<File>>> {
        let wtr = match self.wtr.take() {
            Some(w) => w,
            None => {
                let f = create_new(&self.path)?;
                info!("writing events to {}", self.path.display());
                EventWriter::new(BufWriter::new(f))?
            }
        };
        Ok(self.wtr.insert(wtr))
    }
}

impl EventSink for TextSink {
    fn write_event(&mut self, event: &FinalizedEvent) -> Result<()> {
        self.writer()?.write(event)
    }

    fn finish(&mut self) -> Result<()> {
        let path = self.path.clone();
        self.writer()?
            .flush()
            .with_context(|| format!("flushing {}", path.display()))
    }
}

/// Refuse to go on when an output file is already there
pub fn ensure_absent(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(DaqError::OutputExists(path.to_path_buf()).into());
    }
    Ok(())
}

/// Create a file that must not exist yet
pub fn create_new(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => DaqError::OutputExists(path.to_path_buf()).into(),
            _ => anyhow!(e).context(format!("creating {}", path.display())),
        })
}

/// Output file for `name` with the given extension, e.g. `data_test.txt`
pub fn output_path(name: &str, ext: &str) -> PathBuf {
    let mut s = String::from(name);
    s.push('.');
    s.push_str(ext);
    PathBuf::from(s)
}

/// Background writer appending one zstd frame of raw tags per grouped buffer.
/// The file is created with the first frame.
pub struct SaveHandle {
    pub sender: flume::Sender<Vec<Tag>>,
    join_handle: JoinHandle<Result<()>>,
}

impl SaveHandle {
    pub fn new(path: &Path) -> Result<Self> {
        ensure_absent(path)?;
        let path = path.to_path_buf();
        let (sender, receiver) = flume::unbounded::<Vec<Tag>>();
        let join_handle = thread::spawn(move || {
            let mut wtr: Option<BufWriter<File>> = None;
            while let Ok(tags) = receiver.recv() {
                let w = match wtr.take() {
                    Some(w) => w,
                    None => {
                        info!("saving tags to {}", path.display());
                        BufWriter::new(create_new(&path)?)
                    }
                };
                ser::tsv_zst(wtr.insert(w), &tags).context("file io error")?;
            }
            if let Some(mut w) = wtr {
                w.flush()?;
            }
            debug!("tag saver done");
            Ok(())
        });
        Ok(SaveHandle { sender, join_handle })
    }

    pub fn save(&self, tags: &[Tag]) -> Result<()> {
        self.sender
            .send(tags.to_vec())
            .map_err(|_| anyhow!("tag saver stopped"))
    }

    /// Wait for queued frames to hit the disk
    pub fn finish(self) -> Result<()> {
        drop(self.sender);
        self.join_handle
            .join()
            .map_err(|_| anyhow!("tag saver panicked"))?
    }
}

/// Write the run record as `<name>_<date>.json`, adding milliseconds to the
/// name if a record from the same second exists
pub fn write_record(record: &Run) -> Result<PathBuf> {
    let json_record = serde_json::to_string_pretty(record)?;

    let ts = Local::now();
    let stem = format!("{}_", record.name);
    let path = output_path(&format!("{}{}", stem, ts.format("%F_%H-%M-%S")), "json");
    let path2 = output_path(&format!("{}{}", stem, ts.format("%F_%H-%M-%S%.3f")), "json");
    let (f, path) = match create_new(&path) {
        Ok(f) => (f, path),
        Err(_) => (
            create_new(&path2).context("saving more than one record per millisecond")?,
            path2,
        ),
    };
    let mut wtr = BufWriter::new(f);
    wtr.write_all(json_record.as_bytes())?;
    wtr.flush()?;
    Ok(path)
}
