//! Request deadlines
//!
//! The ledger is synchronous and has no transactions, so a write that has
//! started cannot be abandoned. Services check the deadline immediately
//! before each write instead: a request that overran stops short of the
//! ledger and fails as a whole.

use std::time::{Duration, Instant};

use crate::{AttendanceError, AttendanceResult};

/// Instant after which a request starts no further ledger writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline
    pub fn none() -> Self {
        Self(None)
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now().checked_add(budget))
    }

    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// Fails with `DeadlineExceeded` once the deadline has passed
    pub fn check(&self) -> AttendanceResult<()> {
        if self.is_expired() {
            return Err(AttendanceError::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_expires() {
        assert!(!Deadline::none().is_expired());
        assert!(Deadline::default().check().is_ok());
    }

    #[test]
    fn past_instant_is_expired() {
        let deadline = Deadline::at(Instant::now());
        std::thread::sleep(Duration::from_millis(2));
        assert!(deadline.is_expired());
        assert!(matches!(
            deadline.check(),
            Err(AttendanceError::DeadlineExceeded)
        ));
    }

    #[test]
    fn generous_budget_is_open() {
        assert!(Deadline::after(Duration::from_secs(60)).check().is_ok());
    }
}
