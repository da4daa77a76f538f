use std::convert::TryFrom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A monotonic clock measuring time as a [`Duration`] since the engine's
/// epoch.
///
/// The system-backed variant reads the wall clock; the manual variant is
/// driven explicitly with [`advance`](Clock::advance), which tests use to
/// control waiting times deterministically. Both are safe to share across
/// threads behind an `Arc`.
pub struct Clock(Inner);

enum Inner {
    System(Instant),
    /// Time held as microseconds since the epoch.
    Manual(AtomicU64),
}

impl Clock {
    /// A clock whose epoch is the moment of construction.
    #[must_use]
    pub fn system() -> Self {
        Clock(Inner::System(Instant::now()))
    }

    /// A clock that starts at zero and only moves via [`advance`](Clock::advance).
    #[must_use]
    pub fn manual() -> Self {
        Clock(Inner::Manual(AtomicU64::new(0)))
    }

    /// Time elapsed since the epoch.
    #[must_use]
    pub fn time(&self) -> Duration {
        match &self.0 {
            Inner::System(epoch) => epoch.elapsed(),
            Inner::Manual(micros) => Duration::from_micros(micros.load(Ordering::SeqCst)),
        }
    }

    /// Moves a manual clock forward by the given duration.
    ///
    /// # Panics
    ///
    /// Panics when called on a system-backed clock.
    pub fn advance(&self, by: Duration) {
        match &self.0 {
            Inner::System(_) => panic!("cannot advance a system-backed clock"),
            Inner::Manual(micros) => {
                let step = u64::try_from(by.as_micros()).unwrap_or(u64::MAX);
                micros.fetch_add(step, Ordering::SeqCst);
            }
        }
    }
}
