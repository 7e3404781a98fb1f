//! Process-scoped table registry.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tracing::{debug, instrument};

use lapse_core::{CacheError, Result, TableConfig};
use lapse_table::CacheTable;

struct RegistryInner<K, V> {
    tables: DashMap<String, CacheTable<K, V>>,
    config: TableConfig,
    runtime: Handle,
}

/// Mapping from table name to [`CacheTable`], created on first reference.
///
/// Every table created through one registry shares the registry's
/// configuration and runtime. Cloning is cheap and clones share tables.
///
/// # Thread Safety
///
/// `table` is atomic: concurrent first references to the same name all
/// receive the same table.
pub struct CacheRegistry<K, V> {
    inner: Arc<RegistryInner<K, V>>,
}

impl<K, V> Clone for CacheRegistry<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> CacheRegistry<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates an empty registry on the current Tokio runtime.
    pub fn new() -> Result<Self> {
        Self::with_config(TableConfig::default())
    }

    /// Creates an empty registry whose tables use `config`.
    pub fn with_config(config: TableConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| CacheError::RuntimeUnavailable)?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Creates an empty registry whose tables run their sweeps on `runtime`.
    pub fn with_runtime(config: TableConfig, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                tables: DashMap::new(),
                config,
                runtime,
            }),
        }
    }

    /// Returns the table called `name`, creating it if needed.
    #[instrument(skip(self))]
    pub fn table(&self, name: &str) -> CacheTable<K, V> {
        if let Some(table) = self.inner.tables.get(name) {
            return table.value().clone();
        }

        self.inner
            .tables
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(name, "Creating table on first reference");
                CacheTable::with_runtime(name, self.inner.config.clone(), self.inner.runtime.clone())
            })
            .value()
            .clone()
    }

    /// Returns the table called `name` without creating it.
    pub fn get(&self, name: &str) -> Option<CacheTable<K, V>> {
        self.inner.tables.get(name).map(|t| t.value().clone())
    }

    /// Returns true if a table called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.tables.contains_key(name)
    }

    /// Returns the number of tables.
    pub fn len(&self) -> usize {
        self.inner.tables.len()
    }

    /// Returns true if no table has been created yet.
    pub fn is_empty(&self) -> bool {
        self.inner.tables.is_empty()
    }

    /// Returns the names of all tables, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .tables
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Returns the configuration applied to new tables.
    pub fn config(&self) -> &TableConfig {
        &self.inner.config
    }
}

impl<K, V> fmt::Debug for CacheRegistry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("tables", &self.inner.tables.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use lapse_core::ReadPolicy;
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn test_lookup_or_create_is_idempotent() {
        let registry: CacheRegistry<String, String> = CacheRegistry::new().unwrap();
        assert!(registry.is_empty());

        let first = registry.table("testCache");
        first
            .add("k".to_string(), Duration::ZERO, "v".to_string())
            .unwrap();

        let again = registry.table("testCache");
        assert_eq!(again.value("k").unwrap().value(), "v");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_tables_are_independent() {
        let registry: CacheRegistry<String, u32> = CacheRegistry::new().unwrap();
        registry
            .table("a")
            .add("k".to_string(), Duration::ZERO, 1)
            .unwrap();
        registry
            .table("b")
            .add("k".to_string(), Duration::ZERO, 2)
            .unwrap();

        assert_eq!(*registry.table("a").value("k").unwrap().value(), 1);
        assert_eq!(*registry.table("b").value("k").unwrap().value(), 2);

        registry.table("a").flush();
        assert!(registry.table("a").is_empty());
        assert_eq!(registry.table("b").len(), 1);
    }

    #[tokio::test]
    async fn test_get_does_not_create() {
        let registry: CacheRegistry<String, String> = CacheRegistry::new().unwrap();
        assert!(registry.get("missing").is_none());
        assert!(!registry.contains("missing"));

        registry.table("present");
        assert!(registry.get("present").is_some());
        assert_eq!(registry.names(), vec!["present".to_string()]);
    }

    #[tokio::test]
    async fn test_clones_share_tables() {
        let registry: CacheRegistry<String, String> = CacheRegistry::new().unwrap();
        let clone = registry.clone();
        clone.table("shared");
        assert!(registry.contains("shared"));
    }

    #[tokio::test]
    async fn test_config_applies_to_new_tables() {
        let config = TableConfig::new().with_read_policy(ReadPolicy::CheckOnRead);
        let registry: CacheRegistry<String, String> = CacheRegistry::with_config(config).unwrap();
        assert_eq!(registry.table("t").config().read_policy, ReadPolicy::CheckOnRead);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_reference() {
        let registry: CacheRegistry<u32, u32> = CacheRegistry::new().unwrap();
        let mut tasks = JoinSet::new();

        for i in 0..32u32 {
            let registry = registry.clone();
            tasks.spawn(async move {
                registry.table("race").add(i, Duration::ZERO, i).unwrap();
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.table("race").len(), 32);
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result: Result<CacheRegistry<String, String>> = CacheRegistry::new();
        assert_eq!(result.unwrap_err(), CacheError::RuntimeUnavailable);
    }

    #[test]
    fn test_with_explicit_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let registry: CacheRegistry<String, String> =
            CacheRegistry::with_runtime(TableConfig::default(), rt.handle().clone());
        let table = registry.table("explicit");
        table
            .add("k".to_string(), Duration::from_millis(20), "v".to_string())
            .unwrap();
        assert!(table.is_armed());

        rt.block_on(async { tokio::time::sleep(Duration::from_millis(60)).await });
        assert!(!table.exists("k"));
    }
}
