use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::filter::EnvFilter;

use mlfq_sim::{Coordinator, SimConfig, SimTime, ThreadTransport};

/// Simulate a multi-level feedback-queue scheduler driving worker jobs.
#[derive(Debug, Parser)]
#[command(name = "mlfq_sim")]
struct Cli {
    /// Total number of jobs to spawn.
    #[arg(short = 'c', long, default_value_t = 100)]
    max_jobs: u64,

    /// File the scheduler log is written to.
    #[arg(short = 'l', long, default_value = "log.txt")]
    log: PathBuf,

    /// Wall-clock budget for the run, in seconds. 0 means no budget.
    #[arg(short = 't', long, default_value_t = 3)]
    runtime: u64,

    /// Jobs that may exist at the same time.
    #[arg(long, default_value_t = 18)]
    slots: usize,

    /// Level 0 quantum in fine time units. Each later level doubles it.
    #[arg(long, default_value_t = 10_000_000)]
    quantum: u64,

    /// PRNG seed for the coordinator and workers.
    #[arg(long, env = "MLFQ_SIM_SEED")]
    seed: Option<u64>,

    /// Keep scheduling after the spawn quota is used up, until every
    /// worker has exited, instead of stopping at the next spawn check.
    #[arg(long)]
    drain: bool,

    /// Log filter in EnvFilter syntax, e.g. "info" or "mlfq_sim=debug".
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> SimConfig {
        SimConfig {
            max_jobs: self.max_jobs,
            slots: self.slots,
            base_quantum: SimTime::from_fine(self.quantum),
            halt_on_spawn_quota: !self.drain,
            runtime_budget: (self.runtime > 0).then(|| Duration::from_secs(self.runtime)),
            seed: self.seed,
            ..SimConfig::default()
        }
    }
}

fn init_log(cli: &Cli) -> Result<()> {
    let file = File::create(&cli.log)
        .with_context(|| format!("failed to create log file {}", cli.log.display()))?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init logger: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_log(&cli)?;

    let config = cli.config();
    let transport = ThreadTransport::new(config.seed);
    let mut coordinator = Coordinator::new(config, transport).context("invalid configuration")?;

    let shutdown = coordinator.stop_handle();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::Relaxed);
    })
    .context("Error setting Ctrl-C handler")?;

    let report = coordinator.run();
    println!("{report}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_runtime_means_no_budget() {
        let cli = Cli::parse_from(["mlfq_sim", "-t", "0"]);
        assert_eq!(cli.config().runtime_budget, None);

        let cli = Cli::parse_from(["mlfq_sim", "-t", "5"]);
        assert_eq!(cli.config().runtime_budget, Some(Duration::from_secs(5)));
    }
}
