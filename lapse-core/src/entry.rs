//! Cached entry with lifespan and access bookkeeping.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Mutable access metadata, updated together by [`Entry::touch`].
#[derive(Clone, Copy, Debug)]
struct Access {
    at: Instant,
    count: u64,
}

/// A single cached value.
///
/// `key`, `value`, `lifespan` and `created_at` are fixed at construction.
/// Replacing a value means deleting the entry and adding a new one.
///
/// A zero `lifespan` marks the entry as immortal: it is never swept.
pub struct Entry<K, V> {
    key: K,
    value: V,
    lifespan: Duration,
    created_at: Instant,
    access: Mutex<Access>,
}

impl<K, V> Entry<K, V> {
    /// Creates a new entry stamped with the current time.
    pub fn new(key: K, lifespan: Duration, value: V) -> Self {
        Self::with_created_at(key, lifespan, value, Instant::now())
    }

    /// Creates an entry with an explicit creation instant.
    pub fn with_created_at(key: K, lifespan: Duration, value: V, created_at: Instant) -> Self {
        Self {
            key,
            value,
            lifespan,
            created_at,
            access: Mutex::new(Access {
                at: created_at,
                count: 0,
            }),
        }
    }

    /// Returns the key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the lifespan (`Duration::ZERO` means never expires).
    pub fn lifespan(&self) -> Duration {
        self.lifespan
    }

    /// Returns the creation instant.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns the instant of the last successful read.
    pub fn accessed_at(&self) -> Instant {
        self.access.lock().at
    }

    /// Returns how many successful reads this entry has served.
    pub fn access_count(&self) -> u64 {
        self.access.lock().count
    }

    /// Records a successful read.
    ///
    /// `accessed_at` never moves backwards, even when two readers race.
    pub fn touch(&self) {
        let now = Instant::now();
        let mut access = self.access.lock();
        if now > access.at {
            access.at = now;
        }
        access.count += 1;
    }

    /// Returns true if this entry never expires.
    pub fn is_immortal(&self) -> bool {
        self.lifespan.is_zero()
    }

    /// Returns the instant after which this entry is eligible for removal.
    ///
    /// `None` for immortal entries and for lifespans reaching past what an
    /// `Instant` can represent.
    pub fn expires_at(&self) -> Option<Instant> {
        if self.is_immortal() {
            None
        } else {
            self.created_at.checked_add(self.lifespan)
        }
    }

    /// Returns true if the lifespan has fully elapsed at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        !self.is_immortal() && now.saturating_duration_since(self.created_at) >= self.lifespan
    }

    /// Returns the time left before expiry, or `None` if immortal or already expired.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        if self.is_immortal() {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.created_at);
        self.lifespan.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Entry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = *self.access.lock();
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("lifespan", &self.lifespan)
            .field("created_at", &self.created_at)
            .field("accessed_at", &access.at)
            .field("access_count", &access.count)
            .finish()
    }
}
