//! Sweep scheduling.
//!
//! A table is either [`SweepSchedule::Idle`] (nothing pending) or
//! [`SweepSchedule::Armed`] with exactly one timer task waiting on a
//! [`CancellationToken`]. Arming always cancels the previous token first.
//!
//! [`plan_sweep`] is the time arithmetic of a sweep pass, kept free of locks
//! and timers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use lapse_core::Entry;

/// Scheduler state of one table.
#[derive(Debug, Default)]
pub enum SweepSchedule {
    /// No sweep pending.
    #[default]
    Idle,
    /// One sweep pending, firing at `deadline`.
    Armed {
        /// Delay the timer was armed with
        interval: Duration,
        /// Instant the timer fires, `None` when it lies beyond what `Instant` can represent
        deadline: Option<Instant>,
        /// Cancels the pending timer task
        token: CancellationToken,
    },
}

impl SweepSchedule {
    /// Returns true if a sweep is pending.
    pub fn is_armed(&self) -> bool {
        matches!(self, SweepSchedule::Armed { .. })
    }

    /// Returns the interval the pending timer was armed with, `Duration::ZERO` when idle.
    pub fn interval(&self) -> Duration {
        match self {
            SweepSchedule::Idle => Duration::ZERO,
            SweepSchedule::Armed { interval, .. } => *interval,
        }
    }

    /// Returns the deadline of the pending timer.
    ///
    /// `None` when idle, or when the timer was armed too far out for an
    /// `Instant` to hold.
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            SweepSchedule::Idle => None,
            SweepSchedule::Armed { deadline, .. } => *deadline,
        }
    }

    /// Returns the time left on the pending timer at `now`, `None` when idle.
    ///
    /// An unrepresentable deadline reads as `Duration::MAX`.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        match self {
            SweepSchedule::Idle => None,
            SweepSchedule::Armed { deadline, .. } => Some(
                deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(now)),
            ),
        }
    }

    /// Decides whether adding an entry with `lifespan` at `now` must trigger
    /// a sweep pass.
    ///
    /// Immortal entries never do. Otherwise a sweep is needed when nothing is
    /// pending or the new entry expires before the pending timer fires.
    pub fn should_rearm(&self, lifespan: Duration, now: Instant) -> bool {
        if lifespan.is_zero() {
            return false;
        }
        match self.remaining_at(now) {
            None => true,
            Some(remaining) => lifespan < remaining,
        }
    }

    /// Cancels the pending timer, if any, and returns to `Idle`.
    pub fn cancel(&mut self) {
        if let SweepSchedule::Armed { token, .. } = std::mem::take(self) {
            token.cancel();
        }
    }

    /// Arms a timer for `interval` from `now`, replacing any pending one.
    ///
    /// Returns the token the new timer task must wait on.
    pub fn arm(&mut self, interval: Duration, now: Instant) -> CancellationToken {
        self.cancel();
        let token = CancellationToken::new();
        *self = SweepSchedule::Armed {
            interval,
            deadline: now.checked_add(interval),
            token: token.clone(),
        };
        token
    }

    /// Arms a timer for `interval` unless a sooner one is already pending.
    ///
    /// Returns the new token when a timer was armed.
    pub fn arm_if_sooner(&mut self, interval: Duration, now: Instant) -> Option<CancellationToken> {
        match self.remaining_at(now) {
            Some(remaining) if remaining <= interval => None,
            _ => Some(self.arm(interval, now)),
        }
    }
}

/// Result of evaluating a snapshot of entries.
#[derive(Debug)]
pub struct SweepPlan<K, V> {
    /// Entries whose lifespan has fully elapsed
    pub expired: Vec<Arc<Entry<K, V>>>,
    /// Smallest remaining lifespan among live expiring entries
    pub next_interval: Option<Duration>,
}

impl<K, V> Default for SweepPlan<K, V> {
    fn default() -> Self {
        Self {
            expired: Vec::new(),
            next_interval: None,
        }
    }
}

/// Splits a snapshot into expired entries and the delay until the next
/// known deadline.
///
/// Immortal entries are skipped entirely. Expired entries do not contribute
/// to `next_interval`.
pub fn plan_sweep<K, V, I>(snapshot: I, now: Instant) -> SweepPlan<K, V>
where
    I: IntoIterator<Item = Arc<Entry<K, V>>>,
{
    let mut plan = SweepPlan::default();

    for entry in snapshot {
        if entry.is_immortal() {
            continue;
        }
        match entry.remaining_at(now) {
            None => plan.expired.push(entry),
            Some(remaining) => {
                plan.next_interval = Some(match plan.next_interval {
                    Some(current) => current.min(remaining),
                    None => remaining,
                });
            }
        }
    }

    plan
}
