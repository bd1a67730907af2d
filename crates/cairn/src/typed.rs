//! Serde-typed view over a named store
//!
//! # Example
//!
//! ```no_run
//! use cairn::prelude::*;
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     name: String,
//!     age: u32,
//! }
//!
//! # fn main() -> Result<()> {
//! let registry = EnvironmentRegistry::new();
//! let env = registry.open(EnvironmentConfig::new("./data", 8))?;
//! let users: TypedStore<User> = TypedStore::open(&env, "users")?;
//!
//! users.put(b"u1", &User { name: "ada".into(), age: 36 })?;
//! let user = users.get(b"u1")?;
//! assert_eq!(user.age, 36);
//! # Ok(())
//! # }
//! ```

use crate::{LmdbEnvironment, LmdbStore, Record, RecordStore, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;

/// Named store whose values are all of type `T`
pub struct TypedStore<T> {
    store: LmdbStore,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: LmdbStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Open store `name` in `env` as a typed store
    pub fn open(env: &LmdbEnvironment, name: &str) -> Result<Self> {
        Ok(Self::new(env.store(name)?))
    }

    /// Untyped handle underneath
    pub fn store(&self) -> &LmdbStore {
        &self.store
    }

    pub fn into_inner(self) -> LmdbStore {
        self.store
    }

    pub fn put(&self, key: &[u8], value: &T) -> Result<Vec<u8>> {
        let record = Record::from_serialize(value, None)?;
        self.store.put_record(key, &record)
    }

    pub fn put_with_attachment(&self, key: &[u8], value: &T, attachment: &[u8]) -> Result<Vec<u8>> {
        let record = Record::from_serialize(value, Some(attachment))?;
        self.store.put_record(key, &record)
    }

    pub fn get(&self, key: &[u8]) -> Result<T> {
        self.store.get(key)?.value_as()
    }

    pub fn get_with_attachment(&self, key: &[u8]) -> Result<(T, Option<Vec<u8>>)> {
        let record = self.store.get(key)?;
        Ok((record.value_as()?, record.attachment))
    }

    /// Delete `key` and return its previous value
    pub fn remove(&self, key: &[u8]) -> Result<T> {
        self.store.remove(key)?.value_as()
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.store.contains(key)
    }

    pub fn count(&self) -> Result<usize> {
        self.store.count()
    }

    /// Decoded `(key, value)` pairs in positions `start..end`
    pub fn values(&self, start: Option<usize>, end: Option<usize>) -> Result<Vec<(Vec<u8>, T)>> {
        self.store
            .iterate(start, end)?
            .map(|entry| {
                let value = entry.fetch()?.value_as()?;
                Ok((entry.key, value))
            })
            .collect()
    }

    pub fn close(&self) {
        self.store.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CairnError, EnvironmentConfig, EnvironmentRegistry};
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        sku: String,
        qty: u32,
    }

    fn item(sku: &str, qty: u32) -> Item {
        Item {
            sku: sku.to_string(),
            qty,
        }
    }

    fn create_typed_store() -> (TempDir, EnvironmentRegistry, TypedStore<Item>) {
        let temp_dir = TempDir::new().unwrap();
        let registry = EnvironmentRegistry::new();
        let env = registry
            .open(EnvironmentConfig::new(temp_dir.path(), 2).with_max_size(16 * 1024 * 1024))
            .unwrap();
        let store = TypedStore::open(&env, "items").unwrap();
        (temp_dir, registry, store)
    }

    #[test]
    fn test_typed_roundtrip() {
        let (_temp_dir, _registry, items) = create_typed_store();

        items.put(b"a", &item("a", 1)).unwrap();
        items
            .put_with_attachment(b"b", &item("b", 2), b"thumbnail")
            .unwrap();

        assert_eq!(items.get(b"a").unwrap(), item("a", 1));
        let (value, attachment) = items.get_with_attachment(b"b").unwrap();
        assert_eq!(value, item("b", 2));
        assert_eq!(attachment, Some(b"thumbnail".to_vec()));

        let values = items.values(None, None).unwrap();
        assert_eq!(
            values,
            vec![(b"a".to_vec(), item("a", 1)), (b"b".to_vec(), item("b", 2))]
        );

        assert_eq!(items.remove(b"a").unwrap(), item("a", 1));
        assert!(!items.contains(b"a").unwrap());
        assert_eq!(items.count().unwrap(), 1);
    }

    #[test]
    fn test_shape_mismatch_is_corrupt_record() {
        let (_temp_dir, _registry, items) = create_typed_store();
        items
            .store()
            .put(b"odd", &serde_json::json!(["not", "an", "item"]), None)
            .unwrap();
        assert!(matches!(
            items.get(b"odd"),
            Err(CairnError::CorruptRecord(_))
        ));
    }
}
