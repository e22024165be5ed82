//! Injectable clock.
//!
//! All date-based behavior (proration, expiry, invoice due dates) reads the
//! current time through this trait so it can be pinned in tests.

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Fixed clock for testing.
#[cfg(any(test, feature = "test-billing"))]
pub mod test {
    use super::*;
    use chrono::Duration;
    use std::sync::RwLock;

    /// Clock that returns a pinned instant until told otherwise.
    #[derive(Debug)]
    pub struct FixedClock {
        now: RwLock<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a clock pinned to the given instant.
        #[must_use]
        pub fn at(now: DateTime<Utc>) -> Self {
            Self {
                now: RwLock::new(now),
            }
        }

        /// Re-pin the clock to a new instant.
        pub fn set(&self, now: DateTime<Utc>) {
            *self.now.write().unwrap() = now;
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            let mut now = self.now.write().unwrap();
            *now += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.read().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_fixed_clock() {
        let start = Utc.with_ymd_and_hms(2024, 4, 15, 12, 0, 0).unwrap();
        let clock = test::FixedClock::at(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::days(3));
        assert_eq!(clock.now(), start + Duration::days(3));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
