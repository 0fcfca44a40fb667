//! The sending role of a pipe.
//!
//! A [`Producer`] exclusively owns the send side of one [`Pipe`]. It closes the
//! pipe exactly once: when its source is exhausted, when [`Producer::close`] is
//! called, or when the producer is dropped, whichever comes first. Dropping is
//! covered on every exit path, including a panic unwinding through the worker
//! that owns the producer, so a consumer is never left waiting on an abandoned
//! pipe.

use std::{fmt, sync::Arc};

use crate::{
    jitter::{Jitter, NoJitter},
    pipe::{ClosedChannelError, Pipe},
    sink::Sink,
};

/// Error returned when sending a fallible source.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError<T, E> {
    #[error(transparent)]
    Closed(ClosedChannelError<T>),
    #[error(transparent)]
    Source(E),
}

/// Owner of a pipe's send side.
pub struct Producer<T> {
    pipe: Pipe<T>,
    jitter: Arc<dyn Jitter>,
    sent: usize,
    closed: bool,
}

impl<T> Producer<T> {
    #[must_use]
    pub fn new(pipe: Pipe<T>) -> Self {
        Self {
            pipe,
            jitter: Arc::new(NoJitter),
            sent: 0,
            closed: false,
        }
    }

    /// Applies `jitter` after every enqueue.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Number of items successfully enqueued so far.
    #[must_use]
    pub const fn sent(&self) -> usize {
        self.sent
    }

    /// Whether this producer has closed its pipe.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Enqueues a single item.
    ///
    /// # Errors
    ///
    /// * If the pipe has already been closed
    pub fn send(&mut self, item: T) -> Result<(), ClosedChannelError<T>> {
        self.pipe.enqueue(item)?;
        self.sent += 1;
        self.jitter.lag();
        Ok(())
    }

    /// Enqueues every item in source order, then closes the pipe.
    ///
    /// Returns the number of items sent by this call.
    ///
    /// # Errors
    ///
    /// * If the pipe has already been closed
    pub fn send_all<I: IntoIterator<Item = T>>(
        &mut self,
        items: I,
    ) -> Result<usize, ClosedChannelError<T>> {
        let start = self.sent;

        for item in items {
            self.send(item)?;
        }

        let count = self.sent - start;
        log::debug!("send_all: source exhausted after {count} items, closing pipe");
        self.close();

        Ok(count)
    }

    /// Enqueues every item of a fallible source in order, then closes the pipe.
    ///
    /// The pipe is also closed when the source fails, so the consumer still
    /// drains whatever was sent before the failure.
    ///
    /// # Errors
    ///
    /// * `ProducerError::Source` if the source yields an error
    /// * `ProducerError::Closed` if the pipe has already been closed
    pub fn try_send_all<I, E>(&mut self, items: I) -> Result<usize, ProducerError<T, E>>
    where
        I: IntoIterator<Item = Result<T, E>>,
    {
        let start = self.sent;

        for item in items {
            match item {
                Ok(item) => self.send(item).map_err(ProducerError::Closed)?,
                Err(e) => {
                    log::debug!(
                        "try_send_all: source failed after {} items, closing pipe",
                        self.sent - start
                    );
                    self.close();
                    return Err(ProducerError::Source(e));
                }
            }
        }

        let count = self.sent - start;
        log::debug!("try_send_all: source exhausted after {count} items, closing pipe");
        self.close();

        Ok(count)
    }

    /// Closes the pipe. Only the first call has any effect.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pipe.close();
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        if !self.closed {
            log::debug!("Producer: dropped before closing, closing pipe sent={}", self.sent);
            self.close();
        }
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("pipe", &self.pipe)
            .field("sent", &self.sent)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<T> Sink<T> for Producer<T> {
    type Error = ClosedChannelError<T>;

    fn send(&mut self, item: T) -> Result<(), Self::Error> {
        Self::send(self, item)
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        self.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pipe::EmptyError;

    fn drain<T>(pipe: &Pipe<T>) -> Vec<T> {
        std::iter::from_fn(|| pipe.try_dequeue().ok()).collect()
    }

    #[derive(Default)]
    struct CountingJitter(AtomicUsize);

    impl Jitter for CountingJitter {
        fn lag(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test_log::test]
    fn send_all_sends_in_order_then_closes() {
        let pipe = Pipe::new();
        let mut producer = Producer::new(pipe.clone());

        assert_eq!(producer.send_all(["a", "b", "c"]).unwrap(), 3);

        assert!(producer.is_closed());
        assert!(pipe.is_closed());
        assert_eq!(drain(&pipe), vec!["a", "b", "c"]);
    }

    #[test_log::test]
    fn send_all_with_no_items_closes_immediately() {
        let pipe = Pipe::<String>::new();
        let mut producer = Producer::new(pipe.clone());

        assert_eq!(producer.send_all([]).unwrap(), 0);
        assert!(pipe.is_drained());
    }

    #[test_log::test]
    fn drop_closes_the_pipe() {
        let pipe = Pipe::new();
        {
            let mut producer = Producer::new(pipe.clone());
            producer.send("x\n").unwrap();
            assert!(!pipe.is_closed());
        }

        assert!(pipe.is_closed());
        assert_eq!(drain(&pipe), vec!["x\n"]);
    }

    #[test_log::test]
    fn panic_in_owning_worker_still_closes_the_pipe() {
        let pipe = Pipe::new();
        let mut producer = Producer::new(pipe.clone());

        let result = thread::spawn(move || {
            producer.send(1).unwrap();
            panic!("producer worker failed");
        })
        .join();

        assert!(result.is_err());
        assert!(pipe.is_closed());
        assert_eq!(pipe.try_dequeue(), Ok(1));
        assert_eq!(pipe.try_dequeue(), Err(EmptyError));
    }

    #[test_log::test]
    fn send_after_close_fails() {
        let pipe = Pipe::new();
        let mut producer = Producer::new(pipe.clone());
        producer.close();
        producer.close();

        let err = producer.send(5).unwrap_err();
        assert_eq!(err.into_inner(), 5);
        assert_eq!(producer.sent(), 0);
        assert!(pipe.is_empty());
    }

    #[test_log::test]
    fn try_send_all_closes_on_source_error() {
        let pipe = Pipe::new();
        let mut producer = Producer::new(pipe.clone());

        let source = vec![Ok("a"), Err("read failed"), Ok("never sent")];
        let err = producer.try_send_all(source).unwrap_err();

        assert!(matches!(err, ProducerError::Source("read failed")));
        assert!(pipe.is_closed());
        assert_eq!(drain(&pipe), vec!["a"]);
    }

    #[test_log::test]
    fn try_send_all_reports_count() {
        let pipe = Pipe::new();
        let mut producer = Producer::new(pipe.clone());

        let source = (0..5).map(Ok::<_, std::io::Error>);
        assert_eq!(producer.try_send_all(source).unwrap(), 5);
        assert_eq!(drain(&pipe), vec![0, 1, 2, 3, 4]);
    }

    #[test_log::test]
    fn jitter_is_applied_after_each_send() {
        let jitter = Arc::new(CountingJitter::default());
        let pipe = Pipe::new();
        let mut producer = Producer::new(pipe.clone()).with_jitter(jitter.clone());

        producer.send_all([1, 2, 3]).unwrap();

        assert_eq!(jitter.0.load(Ordering::SeqCst), 3);
        assert_eq!(drain(&pipe), vec![1, 2, 3]);
    }

    #[test_log::test]
    fn sink_finish_closes_the_pipe() {
        let pipe = Pipe::new();
        let mut producer = Producer::new(pipe.clone());

        Sink::send(&mut producer, "y").unwrap();
        Sink::finish(&mut producer).unwrap();

        assert!(producer.is_closed());
        assert_eq!(drain(&pipe), vec!["y"]);
    }
}
