//! Line capitalizing pipeline.
//!
//! Reads a file line by line on one worker, hands each line through a pipe to
//! another worker that uppercases it, and prints the result to standard
//! output. Additional stages can be chained, each one forwarding into the next
//! stage's pipe.
//!
//! # Usage
//!
//! ```text
//! pipey <FILE> [--stages <N>] [--wait <poll|notify>] [--jitter]
//! ```
//!
//! # Examples
//!
//! Capitalize a CSV file with the original one second random lag:
//! ```text
//! pipey test_data.csv --jitter
//! ```
//!
//! Relay through three pipes, parking consumers instead of polling:
//! ```text
//! RUST_LOG=pipey_pipe=debug pipey test_data.csv --stages 3 --wait notify
//! ```

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use pipey_pipe::{
    ClosedChannelError, Consumer, Jitter, NoJitter, Pipe, Producer, RandomJitter, Stdout,
    WaitStrategy,
    jitter::JitterError,
    pipeline::{self, PipelineError, PipelineReport},
    source,
    transform::capitalize,
    worker::{self, Worker, WorkerError},
};

/// Command-line arguments for the pipeline.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File to read lines from.
    #[arg(index = 1)]
    file: PathBuf,

    /// Number of capitalizing stages, each on its own worker and pipe.
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    stages: u16,

    /// How consumers wait on an empty pipe.
    #[arg(short, long, value_enum, default_value_t = Wait::Poll)]
    wait: Wait,

    /// Longest a notified consumer parks before re-checking its pipe.
    #[arg(long, default_value_t = 100)]
    notify_timeout_ms: u64,

    /// Randomly delay pipe operations to exercise different interleavings.
    #[arg(long)]
    jitter: bool,

    /// Chance of a delay after each pipe operation (0-1).
    #[arg(long, default_value_t = 0.5)]
    jitter_probability: f64,

    /// Length of each delay.
    #[arg(long, default_value_t = 1000)]
    jitter_delay_ms: u64,

    /// Seed for reproducible jitter.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Wait {
    Poll,
    Notify,
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Jitter(#[from] JitterError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Forward(#[from] ClosedChannelError<String>),
}

impl Error {
    /// Whether standard output was closed by its reader, e.g. `pipey file | head -1`.
    fn is_broken_pipe(&self) -> bool {
        let Self::Pipeline(PipelineError::Consumer(e)) = self else {
            return false;
        };

        e.downcast_ref::<std::io::Error>()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}

impl Args {
    fn jitter(&self) -> Result<Arc<dyn Jitter>, JitterError> {
        if !self.jitter {
            return Ok(Arc::new(NoJitter));
        }

        let delay = Duration::from_millis(self.jitter_delay_ms);
        let jitter = match self.seed {
            Some(seed) => RandomJitter::from_seed(self.jitter_probability, delay, seed)?,
            None => RandomJitter::new(self.jitter_probability, delay)?,
        };

        Ok(Arc::new(jitter))
    }

    const fn wait_strategy(&self) -> WaitStrategy {
        match self.wait {
            Wait::Poll => WaitStrategy::Poll,
            Wait::Notify => WaitStrategy::Notify {
                timeout: Duration::from_millis(self.notify_timeout_ms),
            },
        }
    }
}

type RelayOutput = Result<usize, ClosedChannelError<String>>;

fn spawn_relay(
    stage: u16,
    upstream: Pipe<String>,
    downstream: Pipe<String>,
    jitter: &Arc<dyn Jitter>,
    wait: WaitStrategy,
) -> Result<Worker<RelayOutput>, WorkerError> {
    let mut relay = Consumer::new(
        upstream,
        capitalize,
        Producer::new(downstream).with_jitter(jitter.clone()),
    )
    .with_jitter(jitter.clone())
    .with_wait(wait);

    worker::spawn(&format!("pipey-stage-{stage}"), move || relay.listen())
}

fn run(args: &Args) -> Result<PipelineReport<Stdout>, Error> {
    let jitter = args.jitter()?;
    let wait = args.wait_strategy();
    let lines = source::open(&args.file)?;

    let first = Pipe::new();
    let mut upstream = first.clone();
    let mut relays = vec![];

    for stage in 1..args.stages {
        let downstream = Pipe::new();
        match spawn_relay(stage, upstream, downstream.clone(), &jitter, wait) {
            Ok(relay) => relays.push(relay),
            Err(e) => {
                // Stages already listening drain and stop once the first pipe closes.
                first.close();
                return Err(e.into());
            }
        }
        upstream = downstream;
    }

    log::info!(
        "Starting {} stage(s) listening to the pipe, sending lines from {}",
        args.stages,
        args.file.display()
    );

    let producer = Producer::new(first).with_jitter(jitter.clone());
    let printer = Consumer::new(upstream, capitalize, Stdout)
        .with_jitter(jitter)
        .with_wait(wait);

    let report = pipeline::run(producer, lines, printer);

    finish(report, relays)
}

/// Joins the relay stages once the pipeline has finished.
///
/// A pipeline failure takes precedence over relay failures, which are logged.
fn finish(
    report: Result<PipelineReport<Stdout>, PipelineError>,
    relays: Vec<Worker<RelayOutput>>,
) -> Result<PipelineReport<Stdout>, Error> {
    let mut relay_error = None;

    for relay in relays {
        let name = relay.name().to_owned();
        let result = relay
            .join()
            .map_err(Error::from)
            .and_then(|forwarded| forwarded.map_err(Error::from));

        match result {
            Ok(forwarded) => log::debug!("finish: {name} forwarded {forwarded} lines"),
            Err(e) => {
                log::warn!("finish: {name} failed: {e}");
                relay_error.get_or_insert(e);
            }
        }
    }

    let report = report?;

    relay_error.map_or(Ok(report), Err)
}

/// Runs the pipeline over the input file.
///
/// # Errors
///
/// * If the input file cannot be opened or read
/// * If the jitter settings are invalid
/// * If a worker cannot be spawned or panics
fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let args = Args::parse();
    log::debug!("args={args:?}");

    let report = match run(&args) {
        Ok(report) => report,
        Err(e) if e.is_broken_pipe() => {
            log::debug!("main: stdout was closed, stopping");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    log::info!(
        "Pipe is empty and closed, sent={} printed={}",
        report.sent,
        report.forwarded
    );

    Ok(())
}
