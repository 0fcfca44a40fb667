//! FIFO handoff queue with a one-way close flag.
//!
//! A [`Pipe`] is a cheap, cloneable handle to state shared between two
//! workers. The item queue and the closed flag live behind a single mutex, so
//! every enqueue and the close are totally ordered: a worker that observes the
//! pipe as closed also observes every item enqueued before the close.

use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

/// Error number reported for writes to a closed pipe.
pub const EPIPE: i32 = 32;

/// Error returned when enqueuing into a pipe that has already been closed.
///
/// The rejected item is handed back to the caller.
#[derive(Debug, thiserror::Error)]
#[error("[Errno {}] Broken pipe", EPIPE)]
pub struct ClosedChannelError<T>(pub T);

impl<T> ClosedChannelError<T> {
    /// Returns the item that could not be enqueued.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }

    /// The I/O error kind equivalent to this failure.
    #[must_use]
    pub const fn kind(&self) -> std::io::ErrorKind {
        std::io::ErrorKind::BrokenPipe
    }

    /// The error number equivalent to this failure.
    #[must_use]
    pub const fn errno(&self) -> i32 {
        EPIPE
    }
}

impl<T> From<ClosedChannelError<T>> for std::io::Error {
    fn from(_: ClosedChannelError<T>) -> Self {
        Self::from(std::io::ErrorKind::BrokenPipe)
    }
}

/// Error returned when trying to dequeue from a pipe with no available item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Empty")]
pub struct EmptyError;

/// Error returned when dequeuing with a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DequeueTimeoutError {
    /// The timeout expired while the pipe was still open and empty.
    #[error("Timeout")]
    Timeout,
    /// The pipe is empty and closed; no item will ever arrive.
    #[error("Drained")]
    Drained,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

/// Shared FIFO queue connecting one producer to one consumer.
pub struct Pipe<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Pipe<T> {
    /// Creates an open, empty pipe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    closed: false,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    // No user code runs while the lock is held, so a poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an item to the tail of the pipe.
    ///
    /// # Errors
    ///
    /// * If the pipe has been closed, handing the item back
    pub fn enqueue(&self, item: T) -> Result<(), ClosedChannelError<T>> {
        let mut state = self.lock();

        if state.closed {
            drop(state);
            log::debug!("enqueue: pipe is closed, rejecting item");
            return Err(ClosedChannelError(item));
        }

        state.items.push_back(item);
        let len = state.items.len();
        drop(state);

        self.shared.ready.notify_all();
        log::trace!("enqueue: len={len}");

        Ok(())
    }

    /// Removes and returns the head item without waiting.
    ///
    /// # Errors
    ///
    /// * If no item is currently available
    pub fn try_dequeue(&self) -> Result<T, EmptyError> {
        self.lock().items.pop_front().ok_or(EmptyError)
    }

    /// Removes and returns the head item, waiting up to `timeout` for one to
    /// arrive.
    ///
    /// Returns as soon as an item is available or the pipe is closed, whichever
    /// comes first; remaining items are always returned before `Drained`.
    ///
    /// # Errors
    ///
    /// * `DequeueTimeoutError::Timeout` if the timeout expires with the pipe still open
    /// * `DequeueTimeoutError::Drained` if the pipe is empty and closed
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<T, DequeueTimeoutError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                return Ok(item);
            }
            if state.closed {
                return Err(DequeueTimeoutError::Drained);
            }

            state = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(DequeueTimeoutError::Timeout);
                    }
                    self.shared
                        .ready
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .shared
                    .ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Closes the pipe. Items already enqueued stay available.
    ///
    /// Returns `true` if this call closed the pipe and `false` if it was
    /// already closed.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let newly_closed = !state.closed;
        state.closed = true;
        let remaining = state.items.len();
        drop(state);

        if newly_closed {
            log::debug!("close: pipe closed remaining={remaining}");
            self.shared.ready.notify_all();
        }

        newly_closed
    }

    /// Whether the pipe has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of items currently waiting in the pipe.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Whether the pipe is both empty and closed, read atomically.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        let state = self.lock();
        state.closed && state.items.is_empty()
    }
}

impl<T> Default for Pipe<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Pipe<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for Pipe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Pipe")
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .finish()
    }
}
