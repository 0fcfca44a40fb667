//! Optional artificial delays between pipe operations.
//!
//! Producers and consumers call [`Jitter::lag`] between successive operations.
//! The default is [`NoJitter`]; [`RandomJitter`] randomly sleeps to shake out
//! different interleavings of the two workers. Jitter never affects what is
//! delivered, only when.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use rand::{Rng as _, SeedableRng as _, rngs::StdRng};

/// A delay strategy applied between pipe operations.
pub trait Jitter: Send + Sync {
    /// Possibly blocks the calling worker for a while.
    fn lag(&self);
}

/// Never delays.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoJitter;

impl Jitter for NoJitter {
    #[inline]
    fn lag(&self) {}
}

#[derive(Debug, thiserror::Error)]
pub enum JitterError {
    #[error("Invalid jitter probability {0}, expected a value between 0 and 1")]
    InvalidProbability(f64),
}

/// Sleeps for a fixed delay with a fixed probability.
#[derive(Debug)]
pub struct RandomJitter {
    probability: f64,
    delay: Duration,
    rng: Mutex<StdRng>,
}

impl RandomJitter {
    /// Creates a jitter seeded from the operating system.
    ///
    /// # Errors
    ///
    /// * If `probability` is not within `0.0..=1.0`
    pub fn new(probability: f64, delay: Duration) -> Result<Self, JitterError> {
        Self::build(probability, delay, StdRng::from_os_rng())
    }

    /// Creates a jitter with a deterministic sequence of decisions.
    ///
    /// # Errors
    ///
    /// * If `probability` is not within `0.0..=1.0`
    pub fn from_seed(probability: f64, delay: Duration, seed: u64) -> Result<Self, JitterError> {
        Self::build(probability, delay, StdRng::seed_from_u64(seed))
    }

    /// Sleeps for `delay` half of the time.
    #[must_use]
    pub fn coin_flip(delay: Duration) -> Self {
        Self {
            probability: 0.5,
            delay,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    fn build(probability: f64, delay: Duration, rng: StdRng) -> Result<Self, JitterError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(JitterError::InvalidProbability(probability));
        }

        Ok(Self {
            probability,
            delay,
            rng: Mutex::new(rng),
        })
    }

    #[must_use]
    pub const fn probability(&self) -> f64 {
        self.probability
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Draws the next decision without sleeping.
    pub fn should_lag(&self) -> bool {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_bool(self.probability)
    }
}

impl Jitter for RandomJitter {
    fn lag(&self) {
        if self.should_lag() {
            log::trace!("lag: sleeping for {:?}", self.delay);
            std::thread::sleep(self.delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn rejects_probability_outside_unit_range() {
        for probability in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                RandomJitter::new(probability, Duration::ZERO),
                Err(JitterError::InvalidProbability(_))
            ));
        }
    }

    #[test_log::test]
    fn zero_probability_never_lags() {
        let jitter = RandomJitter::from_seed(0.0, Duration::from_secs(60), 1).unwrap();
        assert!((0..100).all(|_| !jitter.should_lag()));
    }

    #[test_log::test]
    fn full_probability_always_lags() {
        let jitter = RandomJitter::from_seed(1.0, Duration::ZERO, 1).unwrap();
        assert!((0..100).all(|_| jitter.should_lag()));
    }

    #[test_log::test]
    fn same_seed_gives_same_decisions() {
        let a = RandomJitter::from_seed(0.5, Duration::ZERO, 42).unwrap();
        let b = RandomJitter::from_seed(0.5, Duration::ZERO, 42).unwrap();

        let a = (0..64).map(|_| a.should_lag()).collect::<Vec<_>>();
        let b = (0..64).map(|_| b.should_lag()).collect::<Vec<_>>();

        assert_eq!(a, b);
    }

    #[test_log::test]
    fn coin_flip_uses_half_probability() {
        let jitter = RandomJitter::coin_flip(Duration::from_secs(1));
        assert!((jitter.probability() - 0.5).abs() < f64::EPSILON);
        assert_eq!(jitter.delay(), Duration::from_secs(1));
    }

    #[test_log::test]
    fn no_jitter_returns_immediately() {
        let start = std::time::Instant::now();
        for _ in 0..1000 {
            NoJitter.lag();
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
