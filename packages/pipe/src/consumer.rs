//! The receiving role of a pipe.
//!
//! A [`Consumer`] drains its pipe until it observes the pipe as both empty and
//! closed. Every item is passed through the transform and forwarded to the
//! sink. An empty but open pipe is never an error; the consumer keeps waiting.

use std::{fmt, sync::Arc, time::Duration};

use crate::{
    jitter::{Jitter, NoJitter},
    pipe::{DequeueTimeoutError, EmptyError, Pipe},
    sink::Sink,
};

/// How a consumer waits while its pipe is empty but still open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Retry the non-blocking dequeue, yielding to the scheduler between attempts.
    #[default]
    Poll,
    /// Park on the pipe until an item arrives, the pipe closes, or `timeout` elapses.
    Notify { timeout: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Running,
    /// The pipe was observed empty and closed. Terminal.
    Drained,
}

/// Owner of a pipe's receive side.
pub struct Consumer<T, F, S> {
    pipe: Pipe<T>,
    transform: F,
    sink: S,
    jitter: Arc<dyn Jitter>,
    wait: WaitStrategy,
    state: ConsumerState,
    received: usize,
}

impl<T, F, S> Consumer<T, F, S> {
    #[must_use]
    pub fn new(pipe: Pipe<T>, transform: F, sink: S) -> Self {
        Self {
            pipe,
            transform,
            sink,
            jitter: Arc::new(NoJitter),
            wait: WaitStrategy::Poll,
            state: ConsumerState::Running,
            received: 0,
        }
    }

    /// Applies `jitter` between retries on an empty pipe.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub const fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    #[must_use]
    pub const fn state(&self) -> ConsumerState {
        self.state
    }

    /// Number of items taken off the pipe so far.
    #[must_use]
    pub const fn received(&self) -> usize {
        self.received
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn next_item(&self) -> Option<T> {
        loop {
            match self.wait {
                WaitStrategy::Poll => match self.pipe.try_dequeue() {
                    Ok(item) => return Some(item),
                    Err(EmptyError) => {
                        if self.pipe.is_closed() {
                            // An item may have landed between the two reads. Once
                            // closed, nothing else can, so one more attempt is final.
                            return self.pipe.try_dequeue().ok();
                        }
                        self.jitter.lag();
                        std::thread::yield_now();
                    }
                },
                WaitStrategy::Notify { timeout } => match self.pipe.dequeue_timeout(timeout) {
                    Ok(item) => return Some(item),
                    Err(DequeueTimeoutError::Drained) => return None,
                    Err(DequeueTimeoutError::Timeout) => {
                        log::trace!("next_item: no item after {timeout:?}, still open");
                        self.jitter.lag();
                    }
                },
            }
        }
    }
}

impl<T, U, F, S> Consumer<T, F, S>
where
    F: FnMut(T) -> U,
    S: Sink<U>,
{
    /// Drains the pipe, forwarding each transformed item to the sink.
    ///
    /// Returns once the pipe is observed empty and closed, after calling
    /// [`Sink::finish`]. Returns the number of items forwarded by this call;
    /// calling it again after the consumer has drained returns `Ok(0)`.
    ///
    /// # Errors
    ///
    /// * If the sink rejects an item or fails to finish
    pub fn listen(&mut self) -> Result<usize, S::Error> {
        if self.state == ConsumerState::Drained {
            return Ok(0);
        }

        log::debug!("listen: started wait={:?}", self.wait);

        let mut forwarded = 0;

        while let Some(item) = self.next_item() {
            self.received += 1;
            let item = (self.transform)(item);
            self.sink.send(item)?;
            forwarded += 1;
        }

        log::debug!("Consumer: pipe is empty and closed, stopping forwarded={forwarded}");
        self.state = ConsumerState::Drained;
        self.sink.finish()?;

        Ok(forwarded)
    }
}

impl<T, F, S: fmt::Debug> fmt::Debug for Consumer<T, F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("pipe", &self.pipe)
            .field("sink", &self.sink)
            .field("wait", &self.wait)
            .field("state", &self.state)
            .field("received", &self.received)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{jitter::RandomJitter, producer::Producer, transform::capitalize};

    #[test_log::test]
    fn drains_items_sent_before_close() {
        let pipe = Pipe::new();
        pipe.enqueue("ab\n").unwrap();
        pipe.enqueue("cd\n").unwrap();
        pipe.close();

        let mut consumer = Consumer::new(pipe, capitalize, Vec::new());
        assert_eq!(consumer.listen().unwrap(), 2);

        assert_eq!(consumer.state(), ConsumerState::Drained);
        assert_eq!(consumer.into_sink(), vec!["AB\n", "CD\n"]);
    }

    #[test_log::test]
    fn empty_closed_pipe_stops_on_first_poll() {
        let pipe = Pipe::<String>::new();
        pipe.close();

        let mut consumer = Consumer::new(pipe, capitalize, Vec::new());
        assert_eq!(consumer.listen().unwrap(), 0);

        assert_eq!(consumer.state(), ConsumerState::Drained);
        assert_eq!(consumer.received(), 0);
        assert!(consumer.sink().is_empty());
    }

    #[test_log::test]
    fn listen_after_drained_is_a_no_op() {
        let pipe = Pipe::new();
        pipe.close();

        let mut consumer = Consumer::new(pipe, |x: u32| x, Vec::new());
        consumer.listen().unwrap();

        assert_eq!(consumer.listen().unwrap(), 0);
        assert_eq!(consumer.state(), ConsumerState::Drained);
    }

    #[test_log::test]
    fn starts_running() {
        let consumer = Consumer::new(Pipe::<u8>::new(), |x: u8| x, Vec::<u8>::new());
        assert_eq!(consumer.state(), ConsumerState::Running);
    }

    #[test_log::test]
    fn waits_for_a_producer_on_another_thread() {
        for wait in [
            WaitStrategy::Poll,
            WaitStrategy::Notify {
                timeout: Duration::from_millis(5),
            },
        ] {
            let pipe = Pipe::new();
            let mut producer = Producer::new(pipe.clone());

            let handle = thread::spawn(move || {
                for i in 0..100 {
                    producer.send(i).unwrap();
                    if i % 10 == 0 {
                        thread::sleep(Duration::from_millis(1));
                    }
                }
            });

            let mut consumer = Consumer::new(pipe, |x: i32| x * 2, Vec::new()).with_wait(wait);
            assert_eq!(consumer.listen().unwrap(), 100);
            handle.join().unwrap();

            assert_eq!(
                consumer.into_sink(),
                (0..100).map(|x| x * 2).collect::<Vec<_>>()
            );
        }
    }

    #[test_log::test]
    fn jitter_does_not_change_delivery() {
        let jitter: Arc<dyn Jitter> =
            Arc::new(RandomJitter::from_seed(0.5, Duration::from_micros(200), 7).unwrap());
        let pipe = Pipe::new();
        let mut producer = Producer::new(pipe.clone()).with_jitter(jitter.clone());

        let handle = thread::spawn(move || producer.send_all((0..50).map(|x| x.to_string())));

        let mut consumer = Consumer::new(pipe, capitalize, Vec::new()).with_jitter(jitter);
        consumer.listen().unwrap();
        assert_eq!(handle.join().unwrap().unwrap(), 50);

        assert_eq!(
            consumer.into_sink(),
            (0..50).map(|x| x.to_string()).collect::<Vec<_>>()
        );
    }

    #[test_log::test]
    fn forwards_into_a_downstream_producer_and_closes_it() {
        let upstream = Pipe::new();
        let downstream = Pipe::new();
        upstream.enqueue("x\n").unwrap();
        upstream.close();

        let mut consumer =
            Consumer::new(upstream, capitalize, Producer::new(downstream.clone()));
        consumer.listen().unwrap();

        assert!(downstream.is_closed());
        assert_eq!(downstream.try_dequeue(), Ok("X\n".to_string()));
        assert!(downstream.is_drained());
    }

    #[test_log::test]
    fn downstream_closed_error_propagates() {
        let upstream = Pipe::new();
        let downstream = Pipe::new();
        downstream.close();
        upstream.enqueue(1).unwrap();
        upstream.close();

        let mut consumer = Consumer::new(upstream, |x: i32| x, Producer::new(downstream));
        let err = consumer.listen().unwrap_err();

        assert_eq!(err.into_inner(), 1);
        assert_eq!(consumer.state(), ConsumerState::Running);
    }
}
