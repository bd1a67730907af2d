//! Explicit transaction scopes
//!
//! [`WriteBatch`] holds one reference on an environment's write manager and
//! [`Snapshot`] one reference on a store's read manager. While a guard is
//! alive every matching operation joins the same physical transaction.

use cairn_core::error::Result;

use crate::env::LmdbEnvironment;
use crate::store::LmdbStore;

/// Write batch over every store of one environment
///
/// Call [`commit`](Self::commit) to persist. Dropping the batch without
/// committing rolls back everything written through it.
#[must_use = "a write batch rolls back when dropped without commit"]
pub struct WriteBatch {
    env: LmdbEnvironment,
    open: bool,
}

impl WriteBatch {
    pub(crate) fn begin(env: &LmdbEnvironment) -> Result<Self> {
        env.begin_write()?;
        tracing::debug!("Write batch begun on {}", env.path().display());
        Ok(Self {
            env: env.clone(),
            open: true,
        })
    }

    /// Release the batch with a commit
    ///
    /// The physical commit happens here unless an enclosing batch still
    /// holds a reference.
    pub fn commit(mut self) -> Result<()> {
        self.open = false;
        let result = self.env.release_write(true);
        tracing::debug!(ok = result.is_ok(), "Write batch committed");
        result
    }

    /// Release the batch and mark the transaction for rollback
    pub fn abort(mut self) -> Result<()> {
        self.open = false;
        tracing::debug!("Write batch aborted");
        self.env.release_write(false)
    }

    pub fn environment(&self) -> &LmdbEnvironment {
        &self.env
    }
}

impl Drop for WriteBatch {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        tracing::warn!(
            "Write batch on {} dropped without commit; rolling back",
            self.env.path().display()
        );
        if let Err(e) = self.env.release_write(false) {
            tracing::debug!("Rollback of dropped batch failed: {}", e);
        }
    }
}

/// Consistent read view over one store
pub struct Snapshot<'s> {
    store: &'s LmdbStore,
    open: bool,
}

impl<'s> Snapshot<'s> {
    pub(crate) fn begin(store: &'s LmdbStore) -> Result<Self> {
        store.pin_reader()?;
        Ok(Self { store, open: true })
    }

    pub fn store(&self) -> &'s LmdbStore {
        self.store
    }

    /// End the snapshot now instead of at drop
    pub fn finish(mut self) -> Result<()> {
        self.open = false;
        self.store.unpin_reader()
    }
}

impl Drop for Snapshot<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.store.unpin_reader() {
                tracing::debug!("Releasing snapshot failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::EnvironmentRegistry;
    use cairn_core::{CairnError, EnvironmentConfig, RecordStore};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_batch_spans_stores() {
        let temp_dir = TempDir::new().unwrap();
        let registry = EnvironmentRegistry::new();
        let env = registry
            .open(EnvironmentConfig::new(temp_dir.path(), 4).with_max_size(16 * 1024 * 1024))
            .unwrap();
        let orders = env.store("orders").unwrap();
        let stock = env.store("stock").unwrap();

        let batch = env.batch().unwrap();
        orders.put(b"o1", &json!({ "sku": "a" }), None).unwrap();
        stock.put(b"a", &json!(9), None).unwrap();
        // Not visible to readers until the batch commits.
        assert_eq!(orders.count().unwrap(), 0);
        batch.commit().unwrap();

        assert_eq!(orders.count().unwrap(), 1);
        assert_eq!(stock.get(b"a").unwrap().value, json!(9));
        assert_eq!(env.write_stats().unwrap().committed, 1);
    }

    #[test]
    fn test_dropped_batch_rolls_back() {
        let temp_dir = TempDir::new().unwrap();
        let registry = EnvironmentRegistry::new();
        let env = registry
            .open(EnvironmentConfig::new(temp_dir.path(), 4).with_max_size(16 * 1024 * 1024))
            .unwrap();
        let store = env.store("items").unwrap();

        {
            let _batch = store.batch().unwrap();
            store.put(b"k", &json!(1), None).unwrap();
        }
        assert!(!store.contains(b"k").unwrap());

        let batch = store.batch().unwrap();
        store.put(b"k", &json!(1), None).unwrap();
        batch.abort().unwrap();
        assert!(!store.contains(b"k").unwrap());
    }

    #[test]
    fn test_snapshot_pins_view() {
        let temp_dir = TempDir::new().unwrap();
        let registry = EnvironmentRegistry::new();
        let env = registry
            .open(EnvironmentConfig::new(temp_dir.path(), 4).with_max_size(16 * 1024 * 1024))
            .unwrap();
        let store = env.store("items").unwrap();
        store.put(b"a", &json!(1), None).unwrap();

        let snapshot = store.snapshot().unwrap();
        store.put(b"b", &json!(2), None).unwrap();
        assert_eq!(snapshot.store().count().unwrap(), 1);
        snapshot.finish().unwrap();

        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_snapshot_pins_closed_environment() {
        let temp_dir = TempDir::new().unwrap();
        let registry = EnvironmentRegistry::new();
        let config =
            EnvironmentConfig::new(temp_dir.path(), 4).with_max_size(16 * 1024 * 1024);
        let env = registry.open(config.clone()).unwrap();
        let store = env.store("items").unwrap();

        let snapshot = store.snapshot().unwrap();
        env.close().unwrap();
        assert!(matches!(
            registry.open(config.clone()),
            Err(CairnError::InvalidState(_))
        ));

        drop(snapshot);
        let reopened = registry.open(config).unwrap();
        assert!(!reopened.is_closed());
        assert!(!reopened.ptr_eq(&env));
    }
}
