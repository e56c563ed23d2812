//! One acquisition run: calibrate, poll, group, record

use anyhow::Result;
use chrono::Local;
use coinctools::cfg::{Coincidence, Run, Single, Window};
use coinctools::group::{Counters, EventGrouper};
use coinctools::pat::{self, PatternCounts};
use coinctools::window::WindowEstimator;
use coinctools::{bit, TagBuffer};
use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};

use crate::acquire::{AcquireHandle, Plan, Polled};
use crate::error::DaqError;
use crate::save::{EventSink, SaveHandle};
use crate::source::{Device, TimestampSource};

/// Exposure of the rate calibration poll
pub const CALIBRATION_EXPOSURE: Duration = Duration::from_millis(1);
/// Share of the buffer a poll may fill at the calibrated rate
pub const FILL_FRACTION: f64 = 0.9;
/// Rounds between progress messages
pub const PROGRESS_INTERVAL: u32 = 100;

/// Longest collection time that fills at most `FILL_FRACTION` of the buffer
/// at `rate_mhz`
pub fn max_collect_time(capacity: usize, rate_mhz: f64) -> Duration {
    let micros = capacity as f64 * FILL_FRACTION / rate_mhz;
    Duration::from_micros(micros as u64)
}

/// Window to group with: the fixed one, or one estimated from `buffer`
pub fn choose_window(run: &Run, buffer: &TagBuffer) -> Result<i64> {
    match run.window {
        Window::Fixed(w) if w > 0 => Ok(w),
        _ => {
            let w = WindowEstimator::new(run.reference_channel).estimate(buffer.valid());
            if w <= 0 {
                return Err(DaqError::NoWindow.into());
            }
            Ok(w)
        }
    }
}

/// Grouping side of a run. Feed it polled buffers in order with
/// [`RunContext::ingest`], then turn it into a run record with
/// [`RunContext::finish`].
pub struct RunContext<S: EventSink> {
    run: Run,
    sink: S,
    tags: Option<SaveHandle>,
    grouper: Option<EventGrouper>,
    patterns: PatternCounts,
    singles: Vec<(u8, u64)>,
    underruns: u32,
    discarded: u32,
    started: Option<Instant>,
}

impl<S: EventSink> RunContext<S> {
    pub fn new(run: Run, sink: S) -> Self {
        let singles = run.singles_channels().into_iter().map(|ch| (ch, 0)).collect();
        RunContext {
            run: Run {
                timestamp: Some(Local::now()),
                ..run
            },
            sink,
            tags: None,
            grouper: None,
            patterns: PatternCounts::default(),
            singles,
            underruns: 0,
            discarded: 0,
            started: None,
        }
    }

    /// Also keep the raw tags of every grouped buffer
    pub fn with_tag_saver(mut self, tags: SaveHandle) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn counters(&self) -> Option<&Counters> {
        self.grouper.as_ref().map(|g| g.counters())
    }

    pub fn window(&self) -> Option<i64> {
        self.grouper.as_ref().map(|g| g.window())
    }

    pub fn underruns(&self) -> u32 {
        self.underruns
    }

    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    /// Measure the total tag rate with a short poll and settle the collection
    /// time: the requested one, unless it would overfill the buffer.
    pub fn calibrate(&mut self, source: &mut dyn TimestampSource) -> Result<Duration> {
        let span = span!(Level::INFO, "calibrate");
        let _enter = span.enter();

        let capacity = self.run.buffer_capacity;
        let buffer = source.poll(CALIBRATION_EXPOSURE, capacity)?;
        let rate = pat::rate_mhz(
            buffer.valid_count() as u64,
            CALIBRATION_EXPOSURE.as_micros() as f64,
        );
        info!("total rate: {:.3} MHz", rate);
        if rate <= 0.0 {
            return Err(DaqError::NoSignal.into());
        }

        let max = max_collect_time(capacity, rate);
        let requested = self.run.collect_time;
        let collect_time = if !requested.is_zero() && requested < max {
            requested
        } else {
            max
        };
        info!("collection time: {:?}", collect_time);
        self.run.total_rate = Some(rate);
        self.run.collect_time_used = Some(collect_time);
        Ok(collect_time)
    }

    /// Group one polled buffer
    pub fn ingest(&mut self, polled: &Polled) -> Result<()> {
        let round = polled.round;
        let buffer = &polled.buffer;
        if buffer.is_empty() {
            self.underruns += 1;
            warn!(
                "no tags in round {}, make sure the collection time is long enough",
                round
            );
            return Ok(());
        }
        if round < self.run.warmup_buffers {
            self.discarded += 1;
            debug!("discarding warm-up buffer {}", round);
            return Ok(());
        }

        let mut grouper = match self.grouper.take() {
            Some(g) => g,
            None => {
                let w = choose_window(&self.run, buffer)?;
                info!("event coincidence window: {}", w);
                self.started = Some(Instant::now());
                EventGrouper::new(w)
            }
        };

        if let Some(tags) = &self.tags {
            tags.save(buffer.valid())?;
        }
        for (ch, n) in self.singles.iter_mut() {
            *n += pat::singles(buffer.valid(), *ch);
        }

        let sink = &mut self.sink;
        let patterns = &mut self.patterns;
        let mut result = Ok(());
        grouper.process_with(buffer.valid(), |e| {
            if e.accepted && result.is_ok() {
                patterns.add(e);
                result = sink.write_event(e);
            }
        });
        let grouper = self.grouper.insert(grouper);
        result?;

        if round % PROGRESS_INTERVAL == 0 {
            let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
            let c = grouper.counters();
            info!(
                "round {}: {:.1}s, {} events written ({:.4} MHz), {} opened",
                round,
                elapsed.as_secs_f64(),
                c.events_written,
                pat::rate_mhz(c.events_written, elapsed.as_micros() as f64),
                c.events_opened,
            );
        }
        Ok(())
    }

    /// Events written so far
    pub fn events_written(&self) -> u64 {
        self.counters().map(|c| c.events_written).unwrap_or(0)
    }

    /// True once the run's event limit is reached
    pub fn limit_reached(&self) -> bool {
        match self.run.event_limit {
            Some(limit) => self.events_written() >= limit,
            None => false,
        }
    }

    /// Close out the run and build its record
    pub fn finish(mut self) -> Result<(Run, S)> {
        if let Some(grouper) = self.grouper.as_mut() {
            if self.run.flush_on_shutdown {
                if let Some(e) = grouper.finish().filter(|e| e.accepted) {
                    self.patterns.add(&e);
                    self.sink.write_event(&e)?;
                }
            }
        }
        self.sink.finish()?;
        if let Some(tags) = self.tags.take() {
            tags.finish()?;
        }

        let mut record = self.run;
        record.window_used = self.grouper.as_ref().map(|g| g.window());
        record.counts = self.grouper.as_ref().map(|g| *g.counters());
        record.singles = self
            .singles
            .iter()
            .map(|&(ch, n)| Single::ChannelCounts((ch, n)))
            .collect();
        record.coincidences = self
            .patterns
            .nonzero()
            .map(|(channels, counts)| {
                let index = bit::mask_to_coincidence_index(bit::chans_to_mask(&channels))
                    .map(|i| i as i8)
                    .unwrap_or(-1);
                Coincidence { channels, index, counts }
            })
            .collect();
        Ok((record, self.sink))
    }
}

/// Run an acquisition to completion: calibrate on `device`, then poll it on
/// the acquisition thread while grouping here.
pub fn run<S: EventSink>(mut ctx: RunContext<S>, mut device: Device) -> Result<(Run, S)> {
    let collect_time = ctx.calibrate(&mut *device)?;

    let cfg = ctx.run();
    let plan = Plan {
        rounds: cfg.warmup_buffers + cfg.collect_rounds,
        collect_time,
        capacity: cfg.buffer_capacity,
        queue_depth: cfg.queue_depth,
    };
    let acquire = AcquireHandle::spawn(device, plan);

    let outcome = drain(&mut ctx, &acquire);
    let stats = acquire.join();
    debug!(
        "{} polls, {} tags, {} full buffers",
        stats.polls, stats.tags, stats.full_buffers
    );
    let received = outcome?;
    if received < plan.rounds && !ctx.limit_reached() {
        return Err(DaqError::AcquisitionStopped(received).into());
    }
    if stats.full_buffers > 0 {
        warn!("{} buffers filled up, some tags were dropped", stats.full_buffers);
    }
    if ctx.underruns() > 0 {
        warn!("{} empty buffers skipped", ctx.underruns());
    }
    ctx.finish()
}

/// Group queued buffers until the thread is done or the event limit is hit.
/// Returns the number of buffers taken.
fn drain<S: EventSink>(ctx: &mut RunContext<S>, acquire: &AcquireHandle) -> Result<u32> {
    let mut received = 0;
    while let Ok(polled) = acquire.receiver.recv() {
        ctx.ingest(&polled?)?;
        received += 1;
        if ctx.limit_reached() {
            info!("event limit reached after {} rounds", received);
            break;
        }
    }
    Ok(received)
}
