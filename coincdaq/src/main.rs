use anyhow::Result;
use coincdaq::run::{self, RunContext};
use coincdaq::save::{self, SaveHandle, TextSink};
use coincdaq::{source, CliArgs};
use tracing::{error, info};

const GIT_VERSION: &str = git_version::git_version!(args = ["--always", "--dirty"], fallback = "unknown");

fn main() -> Result<()> {
    // Parse command line arguments
    let args: CliArgs = argh::from_env();

    if args.version {
        println!(
            concat!(
                env!("CARGO_BIN_NAME"),
                " ",
                "{}",
            ),
            GIT_VERSION,
        );
        return Ok(())
    }

    tracing_subscriber::fmt::init();

    let config = args.run()?;

    // Open the source first: without one there is nothing to write
    let device = source::open(&config)?;

    let sink = TextSink::create(&save::output_path(&config.name, "txt"))?;
    let mut ctx = RunContext::new(config.clone(), sink);
    if config.save_tags {
        let tags = SaveHandle::new(&save::output_path(&config.name, "tsv.zst"))?;
        ctx = ctx.with_tag_saver(tags);
    }

    let (record, sink) = match run::run(ctx, device) {
        Ok(r) => r,
        Err(e) => {
            error!("run failed: {:#}", e);
            return Err(e);
        }
    };

    // Now record the run record to disk
    let rcd_path = save::write_record(&record)?;
    if let Some(c) = &record.counts {
        info!(
            "{} events written to {}, {} opened",
            c.events_written,
            sink.path().display(),
            c.events_opened,
        );
    }
    info!("run record saved to {}", rcd_path.display());

    Ok(())
}
