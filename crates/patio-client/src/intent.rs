//! Speculative values for actions applied before the server confirms them.
//!
//! When the user toggles playback we flip the local flag immediately and send
//! the command.  Until the next authoritative update arrives the value is
//! `Speculative`; the UI may render it differently (e.g. dimmed, or with a
//! `?` once it is overdue).
//!
//! ```text
//!  Confirmed(T)        — last value the server reported
//!  Speculative { .. }  — set locally, not yet reported back
//! ```
//!
//! Unlike a request/response tracker, the authoritative value always wins:
//! any confirmed value replaces the speculation, whether it agrees or not.

use std::time::{Duration, Instant};

/// Age after which a speculation is shown as overdue.
pub const INTENT_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone)]
pub enum IntentState<T: Clone + PartialEq> {
    Confirmed(T),
    Speculative {
        intended: T,
        confirmed: T,
        since: Instant,
    },
}

impl<T: Clone + PartialEq + Default> Default for IntentState<T> {
    fn default() -> Self {
        Self::Confirmed(T::default())
    }
}

impl<T: Clone + PartialEq> IntentState<T> {
    pub fn new(value: T) -> Self {
        Self::Confirmed(value)
    }

    /// The value to display.
    pub fn value(&self) -> &T {
        match self {
            Self::Confirmed(v) => v,
            Self::Speculative { intended, .. } => intended,
        }
    }

    /// The last value the server reported.
    pub fn confirmed(&self) -> &T {
        match self {
            Self::Confirmed(v) => v,
            Self::Speculative { confirmed, .. } => confirmed,
        }
    }

    pub fn is_speculative(&self) -> bool {
        matches!(self, Self::Speculative { .. })
    }

    /// Speculative for longer than [`INTENT_TIMEOUT`].
    pub fn is_overdue(&self) -> bool {
        match self {
            Self::Speculative { since, .. } => since.elapsed() >= INTENT_TIMEOUT,
            Self::Confirmed(_) => false,
        }
    }

    /// Apply a local, unconfirmed change.
    pub fn speculate(&mut self, intended: T) {
        let confirmed = self.confirmed().clone();
        if intended == confirmed {
            *self = Self::Confirmed(intended);
        } else {
            *self = Self::Speculative {
                intended,
                confirmed,
                since: Instant::now(),
            };
        }
    }

    /// Apply an authoritative value.  Returns `true` if the displayed value
    /// changed.
    pub fn confirm(&mut self, value: T) -> bool {
        let changed = *self.value() != value;
        *self = Self::Confirmed(value);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speculation_shows_intended_value() {
        let mut s = IntentState::new(false);
        s.speculate(true);
        assert!(s.is_speculative());
        assert!(*s.value());
        assert!(!*s.confirmed());
        assert!(!s.is_overdue());
    }

    #[test]
    fn test_speculating_the_confirmed_value_stays_confirmed() {
        let mut s = IntentState::new(true);
        s.speculate(true);
        assert!(!s.is_speculative());
    }

    #[test]
    fn test_authoritative_value_always_wins() {
        let mut s = IntentState::new(false);
        s.speculate(true);
        // Server says it is still paused: the speculation is discarded.
        assert!(s.confirm(false));
        assert!(!s.is_speculative());
        assert!(!*s.value());

        s.speculate(true);
        assert!(!s.confirm(true));
        assert!(!s.is_speculative());
    }

    #[test]
    fn test_overdue_after_timeout() {
        let s = IntentState::Speculative {
            intended: true,
            confirmed: false,
            since: Instant::now() - INTENT_TIMEOUT,
        };
        assert!(s.is_overdue());
    }
}
