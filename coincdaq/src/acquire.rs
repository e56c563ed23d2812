//! Acquisition thread: polls the source and queues buffers for grouping
//!
//! The source lives on its own thread and is closed there, when the thread
//! ends. The queue is bounded, so a slow consumer stalls acquisition rather
//! than letting buffers pile up.

use anyhow::Result;
use coinctools::TagBuffer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, span, warn, Level};

use crate::source::Device;

/// One polled buffer
#[derive(Debug)]
pub struct Polled {
    /// Poll number, counting the warm-up buffers
    pub round: u32,
    pub buffer: TagBuffer,
}

/// How to poll
#[derive(Clone, Copy, Debug)]
pub struct Plan {
    /// Polls in total, warm-up buffers included
    pub rounds: u32,
    pub collect_time: Duration,
    pub capacity: usize,
    pub queue_depth: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcquireStats {
    pub polls: u32,
    pub tags: u64,
    pub full_buffers: u32,
}

pub struct AcquireHandle {
    pub receiver: flume::Receiver<Result<Polled>>,
    stats: Arc<Mutex<AcquireStats>>,
    stop: Arc<AtomicBool>,
    join_handle: JoinHandle<()>,
}

impl AcquireHandle {
    pub fn spawn(mut device: Device, plan: Plan) -> Self {
        let (sender, receiver) = flume::bounded(plan.queue_depth.max(1));
        let stats = Arc::new(Mutex::new(AcquireStats::default()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_stats = stats.clone();
        let thread_stop = stop.clone();
        let join_handle = thread::spawn(move || {
            let span = span!(Level::INFO, "acquire");
            let _enter = span.enter();
            for round in 0..plan.rounds {
                if thread_stop.load(Ordering::Acquire) {
                    debug!("stop requested before round {}", round);
                    break;
                }
                let polled = device
                    .poll(plan.collect_time, plan.capacity)
                    .map(|buffer| {
                        let mut stats = thread_stats.lock();
                        stats.polls += 1;
                        stats.tags += buffer.valid_count() as u64;
                        if buffer.is_full() {
                            stats.full_buffers += 1;
                        }
                        Polled { round, buffer }
                    });
                let failed = polled.is_err();
                if sender.send(polled).is_err() || failed {
                    break;
                }
            }
            debug!("acquisition done");
            // device closes here
        });

        AcquireHandle {
            receiver,
            stats,
            stop,
            join_handle,
        }
    }

    /// Ask the thread to stop before its next poll
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop, discard whatever is still queued, and wait for the source to close
    pub fn join(self) -> AcquireStats {
        self.stop();
        let stats = self.stats;
        drop(self.receiver);
        if let Err(panic) = self.join_handle.join() {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| String::from("unknown cause"));
            warn!("acquisition thread panicked: {}", msg);
        }
        let s = *stats.lock();
        s
    }
}
