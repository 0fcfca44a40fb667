//! Running a producer and a consumer on their own workers.
//!
//! [`run`] spawns the consumer first so that it is already listening while the
//! producer sends, then joins both. Because the producer closes its pipe when
//! it is dropped, the consumer terminates even if the producer's worker fails.

use crate::{consumer::Consumer, producer::Producer, sink::Sink, worker};

pub const PRODUCER_WORKER: &str = "pipey-producer";
pub const CONSUMER_WORKER: &str = "pipey-consumer";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Producer failed: {0}")]
    Producer(#[source] BoxError),
    #[error("Consumer failed: {0}")]
    Consumer(#[source] BoxError),
    #[error(transparent)]
    Worker(#[from] worker::WorkerError),
}

/// Outcome of a completed pipeline.
#[derive(Debug)]
pub struct PipelineReport<S> {
    /// Items the producer enqueued.
    pub sent: usize,
    /// Items the consumer forwarded to its sink.
    pub forwarded: usize,
    /// The consumer's sink, handed back after draining.
    pub sink: S,
}

/// Joins a worker whose result is no longer needed, logging a panic instead of
/// discarding it.
fn join_abandoned<R>(worker: worker::Worker<R>) -> Option<worker::WorkerError> {
    let error = worker.join().err()?;
    log::warn!("join_abandoned: {error}");
    Some(error)
}

/// Sends `source` through `producer` on one worker while `consumer` drains
/// the pipe on another, then joins both.
///
/// # Errors
///
/// * `PipelineError::Producer` if the source fails or the pipe was already closed
/// * `PipelineError::Consumer` if the consumer's sink fails
/// * `PipelineError::Worker` if a worker cannot be spawned or panics
pub fn run<T, I, E, F, U, S>(
    mut producer: Producer<T>,
    source: I,
    mut consumer: Consumer<T, F, S>,
) -> Result<PipelineReport<S>, PipelineError>
where
    T: std::fmt::Debug + Send + Sync + 'static,
    I: IntoIterator<Item = Result<T, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
    F: FnMut(T) -> U + Send + 'static,
    S: Sink<U> + Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let consumer = worker::spawn(CONSUMER_WORKER, move || {
        let forwarded = consumer.listen()?;
        Ok::<_, S::Error>((forwarded, consumer.into_sink()))
    })?;

    let producer = match worker::spawn(PRODUCER_WORKER, move || producer.try_send_all(source)) {
        Ok(producer) => producer,
        Err(e) => {
            // The failed spawn dropped the producer, which closed the pipe.
            join_abandoned(consumer);
            return Err(e.into());
        }
    };

    let sent = producer.join();
    let drained = consumer.join();

    let sent = sent?.map_err(|e| PipelineError::Producer(e.into()))?;
    let (forwarded, sink) = drained?.map_err(|e| PipelineError::Consumer(e.into()))?;

    log::debug!("run: pipeline finished sent={sent} forwarded={forwarded}");

    Ok(PipelineReport {
        sent,
        forwarded,
        sink,
    })
}
