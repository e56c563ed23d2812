use anyhow::{bail, Context, Result};
use argh::FromArgs;
use coinctools::cfg::{self, Mode, Window};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, FromArgs, Clone)]
/// group four channel time tags into coincidence events
pub struct CliArgs {
    /// print version information
    #[argh(switch, short = 'v')]
    pub version: bool,
    /// tag source: signal, selftest, flatgen or normgen
    #[argh(positional, from_str_fn(parse_mode))]
    pub mode: Option<Mode>,
    /// run file path (JSON)
    #[argh(option)]
    pub config: Option<String>,
    /// replay tags saved by an earlier run (.tsv or .tsv.zst)
    #[argh(option)]
    pub replay: Option<PathBuf>,
    /// coincidence window in ps, 0 or less to estimate it
    #[argh(option, short = 'w')]
    pub window: Option<i64>,
    /// collection time per poll in us, 0 for the calibrated maximum
    #[argh(option)]
    pub collect_time: Option<u64>,
    /// number of polls to group, after the warm-up buffers
    #[argh(option, short = 'n')]
    pub rounds: Option<u32>,
    /// base name of the output files
    #[argh(option, short = 'o')]
    pub out: Option<String>,
    /// pair rate of the software generators in MHz
    #[argh(option)]
    pub rate: Option<f64>,
    /// seed for the software generators
    #[argh(option)]
    pub seed: Option<u64>,
    /// stop after this many events
    #[argh(option)]
    pub limit: Option<u64>,
    /// write out the event still open when the run ends
    #[argh(switch)]
    pub flush: bool,
    /// keep the raw tags as <out>.tsv.zst
    #[argh(switch)]
    pub save_tags: bool,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    match s {
        "signal" => Ok(Mode::Signal),
        "selftest" => Ok(Mode::Selftest),
        "flatgen" => Ok(Mode::Flatgen),
        "normgen" => Ok(Mode::Normgen),
        _ => Err(format!(
            "unknown mode {:?}: expected signal, selftest, flatgen or normgen",
            s
        )),
    }
}

impl CliArgs {
    /// The run to perform: the run file, or the defaults, with the command
    /// line applied on top
    pub fn run(&self) -> Result<cfg::Run> {
        let mut run: cfg::Run = match &self.config {
            Some(c) => {
                let f = File::open(c).with_context(|| format!("opening run file {}", c))?;
                serde_json::from_reader(BufReader::new(f))
                    .with_context(|| format!("parsing run file {}", c))?
            }
            None => cfg::Run::default(),
        };
        self.apply(&mut run)?;
        Ok(run)
    }

    /// Override run settings with the ones given on the command line
    pub fn apply(&self, run: &mut cfg::Run) -> Result<()> {
        match (&self.mode, &self.replay) {
            (Some(_), Some(_)) => bail!("give either a mode or --replay, not both"),
            (Some(m), None) => run.mode = m.clone(),
            (None, Some(p)) => run.mode = Mode::Replay(p.clone()),
            (None, None) => {}
        }
        if let Some(w) = self.window {
            run.window = if w > 0 { Window::Fixed(w) } else { Window::Auto };
        }
        if let Some(us) = self.collect_time {
            run.collect_time = Duration::from_micros(us);
        }
        if let Some(n) = self.rounds {
            run.collect_rounds = n;
        }
        if let Some(name) = &self.out {
            run.name = name.clone();
        }
        if let Some(rate) = self.rate {
            run.sim.rate = rate;
        }
        if self.seed.is_some() {
            run.seed = self.seed;
        }
        if self.limit.is_some() {
            run.event_limit = self.limit;
        }
        run.flush_on_shutdown |= self.flush;
        run.save_tags |= self.save_tags;
        Ok(())
    }
}

pub mod acquire;
pub mod error;
pub mod run;
pub mod save;
pub mod source;
