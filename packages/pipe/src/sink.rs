//! Downstream targets for consumed items.

use std::{
    convert::Infallible,
    fmt::Display,
    io::{self, Write},
};

/// A target that accepts transformed items one at a time.
pub trait Sink<T> {
    /// The error returned when an item cannot be accepted.
    type Error;

    /// Forwards a single item.
    ///
    /// # Errors
    ///
    /// * If the sink cannot accept the item
    fn send(&mut self, item: T) -> Result<(), Self::Error>;

    /// Called once after the last item, when the upstream pipe has drained.
    ///
    /// # Errors
    ///
    /// * If the sink fails to finalize
    fn finish(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Writes each item verbatim to any [`Write`] target.
#[derive(Debug, Default)]
pub struct Writer<W> {
    inner: W,
}

impl<W: Write> Writer<W> {
    #[must_use]
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<T: Display, W: Write> Sink<T> for Writer<W> {
    type Error = io::Error;

    fn send(&mut self, item: T) -> io::Result<()> {
        write!(self.inner, "{item}")
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes each item verbatim to standard output.
///
/// Write failures are returned rather than panicking, so a reader that goes
/// away early (`pipey file | head -1`) surfaces as an
/// [`io::ErrorKind::BrokenPipe`] error from the consumer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stdout;

impl<T: Display> Sink<T> for Stdout {
    type Error = io::Error;

    fn send(&mut self, item: T) -> io::Result<()> {
        Writer::new(io::stdout().lock()).send(item)
    }

    fn finish(&mut self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

impl<T> Sink<T> for Vec<T> {
    type Error = Infallible;

    fn send(&mut self, item: T) -> Result<(), Infallible> {
        self.push(item);
        Ok(())
    }
}
