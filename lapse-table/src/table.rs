//! Named cache table with adaptive expiration sweeping.

use std::borrow::Borrow;
use std::collections::hash_map::{self, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockWriteGuard};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use lapse_core::{CacheError, Entry, ReadPolicy, Result, TableConfig, TraceSink};

use crate::schedule::{plan_sweep, SweepPlan, SweepSchedule};

/// Entry map and scheduler, guarded together by one lock.
struct TableState<K, V> {
    entries: HashMap<K, Arc<Entry<K, V>>>,
    schedule: SweepSchedule,
}

struct TableInner<K, V> {
    name: String,
    config: TableConfig,
    runtime: Handle,
    state: RwLock<TableState<K, V>>,
    sink: RwLock<Option<Arc<dyn TraceSink>>>,
}

impl<K, V> Drop for TableInner<K, V> {
    fn drop(&mut self) {
        self.state.get_mut().schedule.cancel();
    }
}

/// Outcome of one sweep pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries removed by this pass
    pub removed: usize,
    /// Delay the pass armed the next sweep with, if it armed one
    pub next_interval: Option<Duration>,
}

/// Point-in-time table statistics.
#[derive(Clone, Debug, Serialize)]
pub struct TableStats {
    /// Table name
    pub name: String,
    /// Number of entries currently held
    pub entries: usize,
    /// Entries with a zero lifespan
    pub immortal: usize,
    /// Entries with a nonzero lifespan
    pub expiring: usize,
    /// Whether a sweep is pending
    pub armed: bool,
    /// Time left until the pending sweep fires
    pub next_sweep_in: Option<Duration>,
}

/// A named, independent key/value namespace with per-entry lifespans.
///
/// Cloning is cheap: every clone refers to the same table.
///
/// # Expiration
///
/// Entries with a nonzero lifespan are removed by a background sweep. The
/// sweep never polls on a fixed tick: each pass removes what has expired and
/// sleeps exactly until the soonest remaining deadline. A table with no
/// expiring entries has no timer at all.
///
/// Under [`ReadPolicy::SweepDefined`] an entry whose lifespan elapsed is still
/// served until the sweep reaches it. [`ReadPolicy::CheckOnRead`] hides such
/// entries from `value` and `exists` right away.
///
/// # Runtime
///
/// The sweep timer runs on the Tokio runtime captured at construction.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use lapse_table::CacheTable;
///
/// #[tokio::main]
/// async fn main() -> lapse_core::Result<()> {
///     let table: CacheTable<String, String> = CacheTable::new("sessions")?;
///     table.add("aa".to_string(), Duration::from_secs(5), "aaaaaa".to_string())?;
///     let entry = table.value("aa")?;
///     assert_eq!(entry.value(), "aaaaaa");
///     Ok(())
/// }
/// ```
pub struct CacheTable<K, V> {
    inner: Arc<TableInner<K, V>>,
}

impl<K, V> Clone for CacheTable<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> CacheTable<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a table with default configuration on the current Tokio runtime.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::with_config(name, TableConfig::default())
    }

    /// Creates a table with custom configuration on the current Tokio runtime.
    pub fn with_config(name: impl Into<String>, config: TableConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| CacheError::RuntimeUnavailable)?;
        Ok(Self::with_runtime(name, config, runtime))
    }

    /// Creates a table whose sweep timer runs on `runtime`.
    pub fn with_runtime(name: impl Into<String>, config: TableConfig, runtime: Handle) -> Self {
        let name = name.into();
        debug!(table = %name, policy = %config.read_policy, "Creating cache table");

        Self {
            inner: Arc::new(TableInner {
                state: RwLock::new(TableState {
                    entries: HashMap::with_capacity(config.initial_capacity),
                    schedule: SweepSchedule::Idle,
                }),
                name,
                config,
                runtime,
                sink: RwLock::new(None),
            }),
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the table configuration.
    pub fn config(&self) -> &TableConfig {
        &self.inner.config
    }

    /// Adds a new entry.
    ///
    /// Fails with [`CacheError::KeyAlreadyExists`] if `key` is present; an
    /// existing entry is never overwritten. A zero `lifespan` means the entry
    /// never expires.
    #[instrument(skip(self, value), fields(table = %self.inner.name))]
    pub fn add(&self, key: K, lifespan: Duration, value: V) -> Result<Arc<Entry<K, V>>> {
        let now = Instant::now();

        let inserted = {
            let mut state = self.inner.state.write();
            let inserted = match state.entries.entry(key) {
                hash_map::Entry::Occupied(occupied) => Err(occupied.key().clone()),
                hash_map::Entry::Vacant(vacant) => {
                    let entry = Arc::new(Entry::with_created_at(
                        vacant.key().clone(),
                        lifespan,
                        value,
                        now,
                    ));
                    vacant.insert(Arc::clone(&entry));
                    Ok(entry)
                }
            };
            inserted.map(|entry| (entry, state.schedule.should_rearm(lifespan, now)))
        };

        let (entry, rearm) = match inserted {
            Ok(inserted) => inserted,
            Err(key) => {
                self.trace(format_args!("{:?} already exists, add rejected", key));
                return Err(CacheError::KeyAlreadyExists);
            }
        };

        self.trace(format_args!(
            "add item key: {:?} lifespan: {:?} to table: {}",
            entry.key(),
            lifespan,
            self.inner.name
        ));

        if rearm {
            self.sweep();
        }

        Ok(entry)
    }

    /// Returns the entry for `key` and records the access.
    ///
    /// Fails with [`CacheError::KeyNotFound`] if `key` is absent, or, under
    /// [`ReadPolicy::CheckOnRead`], if its lifespan has elapsed.
    pub fn value<Q>(&self, key: &Q) -> Result<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self
            .inner
            .state
            .read()
            .entries
            .get(key)
            .cloned()
            .ok_or(CacheError::KeyNotFound)?;

        if self.hides_elapsed() && entry.is_expired_at(Instant::now()) {
            trace!(table = %self.inner.name, key = ?entry.key(), "Elapsed entry hidden from read");
            return Err(CacheError::KeyNotFound);
        }

        entry.touch();
        Ok(entry)
    }

    /// Returns true if `key` is present. Does not count as an access.
    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.inner.state.read();
        match state.entries.get(key) {
            Some(entry) => !(self.hides_elapsed() && entry.is_expired_at(Instant::now())),
            None => false,
        }
    }

    /// Removes the entry for `key`.
    ///
    /// Fails with [`CacheError::KeyNotFound`] if `key` is absent, including on
    /// a repeated delete.
    pub fn delete<Q>(&self, key: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.inner.state.write().entries.remove(key);
        match removed {
            Some(entry) => {
                self.trace(format_args!("delete item: {:?}", entry.key()));
                Ok(())
            }
            None => Err(CacheError::KeyNotFound),
        }
    }

    /// Removes every entry and cancels the pending sweep.
    #[instrument(skip(self), fields(table = %self.inner.name))]
    pub fn flush(&self) {
        let mut state = self.inner.state.write();
        let dropped = state.entries.len();
        state.entries = HashMap::with_capacity(self.inner.config.initial_capacity);
        state.schedule.cancel();
        drop(state);

        debug!(dropped, "Flushed table");
        self.trace(format_args!("flush table: {} ({} entries)", self.inner.name, dropped));
    }

    /// Visits every entry in unspecified order.
    ///
    /// The visitor runs on a snapshot taken under the read lock, so it may
    /// call back into the table without deadlocking. Changes it makes are not
    /// reflected in the ongoing traversal.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &Entry<K, V>),
    {
        let snapshot: Vec<Arc<Entry<K, V>>> =
            self.inner.state.read().entries.values().cloned().collect();
        for entry in &snapshot {
            visit(entry.key(), entry);
        }
    }

    /// Replaces the diagnostic sink. `None` turns tracing lines off.
    pub fn set_logger(&self, sink: Option<Arc<dyn TraceSink>>) {
        *self.inner.sink.write() = sink;
    }

    /// Returns the number of entries, including elapsed ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.state.read().entries.len()
    }

    /// Returns true if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.state.read().entries.is_empty()
    }

    /// Returns the delay the pending sweep was armed with, `Duration::ZERO` when idle.
    pub fn next_sweep_interval(&self) -> Duration {
        self.inner.state.read().schedule.interval()
    }

    /// Returns true if a sweep is pending.
    pub fn is_armed(&self) -> bool {
        self.inner.state.read().schedule.is_armed()
    }

    /// Returns current statistics.
    pub fn stats(&self) -> TableStats {
        let now = Instant::now();
        let state = self.inner.state.read();
        let immortal = state.entries.values().filter(|e| e.is_immortal()).count();
        TableStats {
            name: self.inner.name.clone(),
            entries: state.entries.len(),
            immortal,
            expiring: state.entries.len() - immortal,
            armed: state.schedule.is_armed(),
            next_sweep_in: state.schedule.remaining_at(now),
        }
    }

    /// Runs one sweep pass now.
    ///
    /// Cancels the pending timer, removes every expired entry and arms a new
    /// timer for the smallest remaining lifespan. Tables with no expiring
    /// entries left go idle.
    #[instrument(skip(self), fields(table = %self.inner.name))]
    pub fn sweep(&self) -> SweepReport {
        let (interval, snapshot) = {
            let mut state = self.inner.state.write();
            let interval = state.schedule.interval();
            state.schedule.cancel();

            let state = RwLockWriteGuard::downgrade(state);
            let snapshot = state
                .entries
                .values()
                .filter(|e| !e.is_immortal())
                .cloned()
                .collect::<Vec<_>>();
            (interval, snapshot)
        };

        if !interval.is_zero() {
            self.trace(format_args!("cleanup interval: {:?}", interval));
        }

        let now = Instant::now();
        let plan = plan_sweep(snapshot, now);
        self.apply(plan, now)
    }

    /// Removes planned entries and arms the next timer under one write lock.
    ///
    /// Trace lines are collected under the lock and emitted after it is released.
    fn apply(&self, plan: SweepPlan<K, V>, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let mut lines = Vec::new();

        let token = {
            let mut state = self.inner.state.write();

            for expired in &plan.expired {
                let same_entry = state
                    .entries
                    .get(expired.key())
                    .map(|current| Arc::ptr_eq(current, expired));
                match same_entry {
                    Some(true) => {
                        state.entries.remove(expired.key());
                        report.removed += 1;
                        lines.push(format!("delete item: {:?}", expired.key()));
                    }
                    Some(false) => {
                        debug!(key = ?expired.key(), "Expired entry was replaced before removal");
                        lines.push(format!(
                            "delete item error: {:?} replaced during sweep",
                            expired.key()
                        ));
                    }
                    None => {
                        warn!(key = ?expired.key(), "Expired entry already removed");
                        lines.push(format!(
                            "delete item error: {:?} {}",
                            expired.key(),
                            CacheError::KeyNotFound
                        ));
                    }
                }
            }

            let token = plan
                .next_interval
                .and_then(|interval| state.schedule.arm_if_sooner(interval, now));
            if token.is_some() {
                report.next_interval = plan.next_interval;
            }
            token
        };

        for line in &lines {
            self.trace(format_args!("{line}"));
        }

        if let (Some(token), Some(interval)) = (token, report.next_interval) {
            self.spawn_timer(interval, token);
        }

        if report.removed > 0 {
            debug!(removed = report.removed, next = ?report.next_interval, "Sweep complete");
        }
        report
    }

    /// Spawns the task that re-runs the sweep once `interval` elapses.
    fn spawn_timer(&self, interval: Duration, token: CancellationToken) {
        let table: Weak<TableInner<K, V>> = Arc::downgrade(&self.inner);
        self.inner.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(interval) => {
                    if let Some(inner) = table.upgrade() {
                        CacheTable { inner }.sweep();
                    }
                }
            }
        });
    }

    fn hides_elapsed(&self) -> bool {
        self.inner.config.read_policy == ReadPolicy::CheckOnRead
    }

    /// Emits one line to the sink. Callers must not hold the state lock.
    fn trace(&self, args: fmt::Arguments<'_>) {
        let sink = self.inner.sink.read().clone();
        if let Some(sink) = sink {
            sink.trace(&args.to_string());
        }
    }
}

impl<K, V> fmt::Debug for CacheTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("CacheTable")
            .field("name", &self.inner.name)
            .field("entries", &state.entries.len())
            .field("schedule", &state.schedule)
            .finish()
    }
}
