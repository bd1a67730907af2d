use crate::error::Result;
use crate::record::Record;
use crate::scan::{Entries, FilterContext, FilterMatch};
use serde_json::Value;

/// A named, ordered store of records
///
/// Every call acquires the store's transaction manager(s) around exactly
/// one unit of work. Keys are opaque bytes ordered by the engine.
pub trait RecordStore {
    /// Store name within its environment
    fn name(&self) -> &str;

    /// Write `value` (and optional `attachment`) under `key`, returning the key
    fn put(&self, key: &[u8], value: &Value, attachment: Option<&[u8]>) -> Result<Vec<u8>>;

    /// Write a prepared record under `key`
    fn put_record(&self, key: &[u8], record: &Record) -> Result<Vec<u8>> {
        self.put(key, &record.value, record.attachment.as_deref())
    }

    /// Read the record under `key`; `NotFound` if absent
    fn get(&self, key: &[u8]) -> Result<Record>;

    fn contains(&self, key: &[u8]) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete the record under `key` and return it; `NotFound` if absent
    fn remove(&self, key: &[u8]) -> Result<Record>;

    /// Number of entries, found by walking the whole store
    fn count(&self) -> Result<usize>;

    /// Clear every entry if `confirm` returns true; returns whether it did
    fn drop_all(&self, confirm: impl FnOnce() -> bool) -> Result<bool>
    where
        Self: Sized;

    /// Scan every entry in key order, keeping those the predicate accepts
    ///
    /// With `include_values` each visited entry is decoded and handed to the
    /// predicate, and accepted matches carry their record.
    fn filter<F>(&self, include_values: bool, predicate: F) -> Result<Vec<FilterMatch>>
    where
        F: FnMut(&[u8], Option<&Record>, &mut FilterContext) -> bool,
        Self: Sized;

    /// Keys in positions `start..end` (defaults: whole store)
    fn keys(&self, start: Option<usize>, end: Option<usize>) -> Result<Vec<Vec<u8>>>;

    /// Entries in positions `start..end`, each fetched on demand
    fn iterate(&self, start: Option<usize>, end: Option<usize>) -> Result<Entries>;

    /// Invalidate the handle
    fn close(&self);

    fn is_closed(&self) -> bool;
}
