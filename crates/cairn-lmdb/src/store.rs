use cairn_core::{
    error::{CairnError, Result},
    observe,
    record::{self, Record},
    scan::{resolve_slice, Entries, Filter, FilterContext, FilterMatch, Slice},
    traits::RecordStore,
    txn::{TransactionManager, TxnStats},
};
use lmdb::Database;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Range;

use crate::env::LmdbEnvironment;
use crate::keys::{display_key, validate_key};
use crate::scope::{Snapshot, WriteBatch};
use crate::txn::{OwnedRoTxn, OwnedRwTxn, ReadAccess, ReadBackend};

/// LMDB-backed named store
///
/// Writes go through the environment's shared write manager, reads through
/// this store's own read manager. Handles are cheap; opening the same name
/// twice yields two handles on the same sub-database.
pub struct LmdbStore {
    env: LmdbEnvironment,
    name: String,
    db: Database,
    reader: RefCell<TransactionManager<ReadBackend>>,
    closed: Cell<bool>,
}

impl LmdbStore {
    pub(crate) fn new(
        env: LmdbEnvironment,
        name: String,
        db: Database,
        reader: ReadBackend,
    ) -> Self {
        Self {
            env,
            name,
            db,
            reader: RefCell::new(TransactionManager::new(reader)),
            closed: Cell::new(false),
        }
    }

    pub fn environment(&self) -> &LmdbEnvironment {
        &self.env
    }

    /// Keys accepted by `predicate`, without decoding any record
    pub fn filter_keys<F>(&self, mut predicate: F) -> Result<Vec<Vec<u8>>>
    where
        F: FnMut(&[u8], &mut FilterContext) -> bool,
    {
        let matches = self.filter(false, |key, _, ctx| predicate(key, ctx))?;
        Ok(matches.into_iter().map(|m| m.key).collect())
    }

    /// Key and record pairs accepted by `predicate`
    pub fn filter_records<F>(&self, mut predicate: F) -> Result<Vec<(Vec<u8>, Record)>>
    where
        F: FnMut(&[u8], &Record, &mut FilterContext) -> bool,
    {
        let matches = self.filter(true, |key, record, ctx| match record {
            Some(record) => predicate(key, record, ctx),
            None => false,
        })?;
        Ok(matches
            .into_iter()
            .filter_map(|m| m.record.map(|record| (m.key, record)))
            .collect())
    }

    /// Begin a write batch on the owning environment
    pub fn batch(&self) -> Result<WriteBatch> {
        self.ensure_open()?;
        self.env.batch()
    }

    /// Pin this store's read transaction until the snapshot ends
    pub fn snapshot(&self) -> Result<Snapshot<'_>> {
        self.ensure_open()?;
        Snapshot::begin(self)
    }

    /// Physical read transaction counters
    pub fn read_stats(&self) -> TxnStats {
        match self.reader.try_borrow() {
            Ok(reader) => reader.stats(),
            Err(_) => {
                tracing::debug!(store = %self.name, "Read stats unavailable during a scan");
                TxnStats::default()
            }
        }
    }

    pub(crate) fn pin_reader(&self) -> Result<()> {
        self.reader_mut()?.begin().map(|_| ())
    }

    pub(crate) fn unpin_reader(&self) -> Result<()> {
        self.reader_mut()?.commit()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(CairnError::UseAfterClose(format!(
                "store '{}' is closed",
                self.name
            )));
        }
        if self.env.is_closed() {
            return Err(CairnError::UseAfterClose(format!(
                "environment at {} is closed",
                self.env.path().display()
            )));
        }
        Ok(())
    }

    fn reader_mut(&self) -> Result<std::cell::RefMut<'_, TransactionManager<ReadBackend>>> {
        self.reader.try_borrow_mut().map_err(|_| {
            CairnError::InvalidState(format!(
                "store '{}' is already inside a scan; re-entrant reads are not allowed",
                self.name
            ))
        })
    }

    fn read<R>(&self, f: impl FnOnce(&OwnedRoTxn, Database) -> Result<R>) -> Result<R> {
        self.ensure_open()?;
        let db = self.db;
        self.reader_mut()?.run(|txn| f(txn, db))
    }

    fn write<R>(&self, f: impl FnOnce(&mut OwnedRwTxn, Database) -> Result<R>) -> Result<R> {
        self.ensure_open()?;
        let db = self.db;
        self.env.write(|txn| f(txn, db))
    }

    /// Collect the `start..end` slice in one cursor walk
    ///
    /// With an explicit `end` the walk stops there and the bound is checked
    /// against how far it got. Only an open-ended slice counts the store.
    fn read_slice<T>(
        &self,
        op: &'static str,
        start: Option<usize>,
        end: Option<usize>,
        make: fn(Range<usize>) -> Slice<T>,
    ) -> Result<Vec<T>> {
        self.read(|txn, db| {
            let bounded = end.filter(|&end| start.unwrap_or(0) <= end);
            let range = match bounded {
                Some(end) => start.unwrap_or(0)..end,
                None => resolve_slice(start, end, txn.count(db)?)?,
            };
            if bounded.is_none() && range.is_empty() {
                return Ok(Vec::new());
            }

            let mut slice = make(range.clone());
            txn.scan(db, &mut |key, raw| Ok(slice.visit(key, raw)))?;
            observe::record_scan(op, slice.visited());
            if slice.visited() < range.end {
                // The walk ran out first, so it saw every entry.
                return Err(CairnError::OutOfRange {
                    start: range.start,
                    end: range.end,
                    count: slice.visited(),
                });
            }
            Ok(slice.into_inner())
        })
    }
}

impl RecordStore for LmdbStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, key: &[u8], value: &Value, attachment: Option<&[u8]>) -> Result<Vec<u8>> {
        validate_key(key)?;
        let bytes = record::encode(value, attachment)?;
        self.write(|txn, db| txn.put(db, key, &bytes))?;
        Ok(key.to_vec())
    }

    fn get(&self, key: &[u8]) -> Result<Record> {
        validate_key(key)?;
        let raw = self
            .read(|txn, db| txn.get_raw(db, key))?
            .ok_or_else(|| CairnError::NotFound(format!("key '{}'", display_key(key))))?;
        record::decode(&raw)
    }

    fn remove(&self, key: &[u8]) -> Result<Record> {
        validate_key(key)?;
        self.write(|txn, db| {
            let raw = txn
                .get_raw(db, key)?
                .ok_or_else(|| CairnError::NotFound(format!("key '{}'", display_key(key))))?;
            let record = record::decode(&raw)?;
            txn.del(db, key)?;
            Ok(record)
        })
    }

    fn count(&self) -> Result<usize> {
        let count = self.read(|txn, db| txn.count(db))?;
        observe::record_scan("count", count);
        Ok(count)
    }

    fn drop_all(&self, confirm: impl FnOnce() -> bool) -> Result<bool> {
        self.ensure_open()?;
        if !confirm() {
            tracing::debug!(store = %self.name, "Drop not confirmed");
            return Ok(false);
        }
        self.write(|txn, db| txn.clear(db))?;
        tracing::warn!(store = %self.name, "Dropped every entry in store");
        observe::record_drop();
        Ok(true)
    }

    fn filter<F>(&self, include_values: bool, predicate: F) -> Result<Vec<FilterMatch>>
    where
        F: FnMut(&[u8], Option<&Record>, &mut FilterContext) -> bool,
    {
        let mut filter = Filter::new(include_values, predicate);
        self.read(|txn, db| txn.scan(db, &mut |key, raw| filter.visit(key, raw)))?;
        observe::record_scan("filter", filter.visited());
        Ok(filter.into_matches())
    }

    fn keys(&self, start: Option<usize>, end: Option<usize>) -> Result<Vec<Vec<u8>>> {
        self.read_slice("keys", start, end, Slice::keys)
    }

    fn iterate(&self, start: Option<usize>, end: Option<usize>) -> Result<Entries> {
        let entries = self.read_slice("iterate", start, end, Slice::entries)?;
        Ok(Entries::new(entries))
    }

    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        match self.reader.try_borrow_mut() {
            Ok(mut reader) => reader.discard(),
            Err(_) => tracing::debug!(
                store = %self.name,
                "Closed during a scan; the read transaction ends with the scan"
            ),
        }
        tracing::debug!(store = %self.name, "Closed store");
    }

    fn is_closed(&self) -> bool {
        self.closed.get() || self.env.is_closed()
    }
}

impl fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LmdbStore")
            .field("name", &self.name)
            .field("path", &self.env.path())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EnvironmentRegistry;
    use cairn_core::EnvironmentConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, EnvironmentRegistry, LmdbStore) {
        let temp_dir = TempDir::new().unwrap();
        let registry = EnvironmentRegistry::new();
        let env = registry
            .open(EnvironmentConfig::new(temp_dir.path(), 4).with_max_size(16 * 1024 * 1024))
            .unwrap();
        let store = env.store("test").unwrap();
        (temp_dir, registry, store)
    }

    fn fill(store: &LmdbStore, n: usize) {
        let batch = store.batch().unwrap();
        for i in 0..n {
            store
                .put(format!("k{:04}", i).as_bytes(), &json!({ "i": i }), None)
                .unwrap();
        }
        batch.commit().unwrap();
    }

    #[test]
    fn test_put_get_remove() {
        let (_temp_dir, _registry, store) = create_test_store();

        let key = store
            .put(b"doc", &json!({ "title": "cairn" }), Some(&b"\x00\x01"[..]))
            .unwrap();
        assert_eq!(key, b"doc".to_vec());

        let record = store.get(b"doc").unwrap();
        assert_eq!(record.value, json!({ "title": "cairn" }));
        assert_eq!(record.attachment.as_deref(), Some(&b"\x00\x01"[..]));

        let removed = store.remove(b"doc").unwrap();
        assert_eq!(removed, record);
        assert!(store.get(b"doc").unwrap_err().is_not_found());
        assert!(store.remove(b"doc").unwrap_err().is_not_found());
    }

    #[test]
    fn test_scans_on_never_written_store() {
        let (_temp_dir, _registry, store) = create_test_store();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.keys(None, None).unwrap().is_empty());
        assert!(store.keys(Some(0), Some(0)).unwrap().is_empty());
        assert_eq!(store.iterate(None, None).unwrap().len(), 0);
        assert!(store.filter(true, |_, _, _| true).unwrap().is_empty());
        assert!(matches!(
            store.keys(None, Some(1)),
            Err(CairnError::OutOfRange {
                start: 0,
                end: 1,
                count: 0
            })
        ));
    }

    #[test]
    fn test_scans_after_store_is_emptied() {
        let (_temp_dir, _registry, store) = create_test_store();
        store.put(b"only", &json!(1), None).unwrap();
        store.remove(b"only").unwrap();
        assert_eq!(store.count().unwrap(), 0);

        fill(&store, 3);
        assert!(store.drop_all(|| true).unwrap());
        assert!(store.keys(None, None).unwrap().is_empty());
        assert_eq!(store.iterate(None, None).unwrap().len(), 0);

        // Pending batch writes are not visible to reads yet.
        let batch = store.batch().unwrap();
        store.put(b"pending", &json!(1), None).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.filter(false, |_, _, _| true).unwrap().is_empty());
        batch.commit().unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_bounded_slice_stops_at_end() {
        let (_temp_dir, _registry, store) = create_test_store();
        fill(&store, 10);
        let stats_before = store.read_stats();

        let head = store.keys(Some(1), Some(3)).unwrap();
        assert_eq!(head, vec![b"k0001".to_vec(), b"k0002".to_vec()]);
        assert!(matches!(
            store.keys(Some(20), Some(20)),
            Err(CairnError::OutOfRange {
                start: 20,
                end: 20,
                count: 10
            })
        ));
        assert!(matches!(
            store.iterate(Some(2), Some(usize::MAX)),
            Err(CairnError::OutOfRange { count: 10, .. })
        ));
        assert_eq!(store.read_stats().begun, stats_before.begun + 3);
    }

    #[test]
    fn test_close_and_stats_during_scan() {
        let (_temp_dir, _registry, store) = create_test_store();
        fill(&store, 3);

        let mut during = None;
        store
            .filter(false, |_, _, ctx| {
                during = Some(store.read_stats());
                store.close();
                ctx.stop = true;
                false
            })
            .unwrap();
        assert_eq!(during, Some(TxnStats::default()));
        assert!(store.is_closed());
        assert!(matches!(store.count(), Err(CairnError::UseAfterClose(_))));
    }

    #[test]
    fn test_put_overwrites() {
        let (_temp_dir, _registry, store) = create_test_store();
        store.put(b"k", &json!(1), Some(&b"a"[..])).unwrap();
        store.put(b"k", &json!(2), None).unwrap();
        let record = store.get(b"k").unwrap();
        assert_eq!(record.value, json!(2));
        assert_eq!(record.attachment, None);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_invalid_keys() {
        let (_temp_dir, _registry, store) = create_test_store();
        assert!(matches!(
            store.put(b"", &json!(1), None),
            Err(CairnError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.get(&[0u8; 600]),
            Err(CairnError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_remove_inside_batch_sees_batch_writes() {
        let (_temp_dir, _registry, store) = create_test_store();
        let batch = store.batch().unwrap();
        store.put(b"k", &json!("pending"), None).unwrap();
        let removed = store.remove(b"k").unwrap();
        assert_eq!(removed.value, json!("pending"));
        batch.commit().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_keys_and_iterate_slices() {
        let (_temp_dir, _registry, store) = create_test_store();
        fill(&store, 10);

        let all = store.keys(None, None).unwrap();
        assert_eq!(all.len(), 10);
        assert!(all.windows(2).all(|w| w[0] < w[1]));

        let middle = store.keys(Some(3), Some(6)).unwrap();
        assert_eq!(middle, all[3..6].to_vec());

        let entries: Vec<_> = store.iterate(Some(8), None).unwrap().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].fetch().unwrap().value, json!({ "i": 9 }));

        assert!(store.keys(Some(4), Some(4)).unwrap().is_empty());
        assert!(matches!(
            store.iterate(Some(0), Some(11)),
            Err(CairnError::OutOfRange {
                start: 0,
                end: 11,
                count: 10
            })
        ));
        assert!(matches!(
            store.keys(Some(5), Some(2)),
            Err(CairnError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_filter_with_early_stop() {
        let (_temp_dir, _registry, store) = create_test_store();
        fill(&store, 50);

        let matches = store
            .filter(false, |_, _, ctx| {
                ctx.stop = ctx.index == 9;
                ctx.index % 2 == 0
            })
            .unwrap();
        assert_eq!(matches.len(), 5);
        assert!(matches.iter().all(|m| m.record.is_none()));

        let records = store
            .filter_records(|_, record, _| record.value["i"].as_u64() == Some(42))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, b"k0042".to_vec());

        let keys = store.filter_keys(|key, _| key.ends_with(b"7")).unwrap();
        assert_eq!(keys.len(), 5);
    }

    #[test]
    fn test_filter_reentry_is_rejected() {
        let (_temp_dir, _registry, store) = create_test_store();
        fill(&store, 3);

        let mut inner = None;
        store
            .filter(false, |_, _, ctx| {
                inner = Some(store.count());
                ctx.stop = true;
                false
            })
            .unwrap();
        assert!(matches!(inner, Some(Err(CairnError::InvalidState(_)))));
    }

    #[test]
    fn test_filter_may_write() {
        let (_temp_dir, _registry, store) = create_test_store();
        fill(&store, 3);
        let archive = store.environment().store("archive").unwrap();

        store
            .filter(true, |key, record, _| {
                archive
                    .put(key, &record.unwrap().value, None)
                    .unwrap();
                true
            })
            .unwrap();
        assert_eq!(archive.count().unwrap(), 3);
    }

    #[test]
    fn test_drop_requires_confirmation() {
        let (_temp_dir, _registry, store) = create_test_store();
        fill(&store, 5);

        assert!(!store.drop_all(|| false).unwrap());
        assert_eq!(store.count().unwrap(), 5);

        assert!(store.drop_all(|| true).unwrap());
        assert_eq!(store.count().unwrap(), 0);
        // The store stays usable after a drop.
        store.put(b"again", &json!(true), None).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_use_after_close() {
        let (_temp_dir, _registry, store) = create_test_store();
        store.put(b"k", &json!(1), None).unwrap();
        store.close();
        assert!(store.is_closed());

        assert!(matches!(store.get(b"k"), Err(CairnError::UseAfterClose(_))));
        assert!(matches!(
            store.put(b"k", &json!(1), None),
            Err(CairnError::UseAfterClose(_))
        ));
        assert!(matches!(store.count(), Err(CairnError::UseAfterClose(_))));
        assert!(matches!(
            store.drop_all(|| true),
            Err(CairnError::UseAfterClose(_))
        ));

        // Another handle on the same name is unaffected.
        let again = store.environment().store("test").unwrap();
        assert_eq!(again.get(b"k").unwrap().value, json!(1));
    }

    #[test]
    fn test_corrupt_record_surfaces() {
        let (_temp_dir, _registry, store) = create_test_store();
        let db = store.db;
        store
            .environment()
            .write(|txn| txn.put(db, b"bad", &[0, 0, 0]))
            .unwrap();
        assert!(matches!(
            store.get(b"bad"),
            Err(CairnError::CorruptRecord(_))
        ));
    }
}
