//! Owned LMDB transactions and the backends that feed transaction managers
//!
//! `lmdb` transactions borrow their environment. A transaction manager has to
//! keep one alive between calls, so each transaction here is stored next to
//! an `Rc` of the environment it borrows from. Holding that `Rc` also keeps
//! the environment mapped for as long as any transaction is open.

use cairn_core::{
    error::{CairnError, Result},
    txn::{TxnBackend, TxnMode},
};
use lmdb::{Cursor, Database, Environment, RoTransaction, RwTransaction, Transaction, WriteFlags};
use ouroboros::self_referencing;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

/// Map an engine error onto the cairn taxonomy
pub(crate) fn engine_err(e: lmdb::Error) -> CairnError {
    CairnError::Engine(e.to_string())
}

fn live<T>(slot: &Option<T>) -> Result<&T> {
    slot.as_ref()
        .ok_or_else(|| CairnError::InvalidState("Transaction already finished".into()))
}

fn live_mut<T>(slot: &mut Option<T>) -> Result<&mut T> {
    slot.as_mut()
        .ok_or_else(|| CairnError::InvalidState("Transaction already finished".into()))
}

fn get_in<T: Transaction>(txn: &T, db: Database, key: &[u8]) -> Result<Option<Vec<u8>>> {
    match txn.get(db, &key) {
        Ok(bytes) => Ok(Some(bytes.to_vec())),
        Err(lmdb::Error::NotFound) => Ok(None),
        Err(e) => Err(engine_err(e)),
    }
}

fn scan_in<T: Transaction>(
    txn: &T,
    db: Database,
    visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<ControlFlow<()>>,
) -> Result<usize> {
    let mut cursor = txn.open_ro_cursor(db).map_err(engine_err)?;
    let mut visited = 0;
    // An unpositioned cursor steps onto the first entry, and an empty
    // database simply yields nothing.
    for (key, value) in cursor.iter() {
        visited += 1;
        if visit(key, value)?.is_break() {
            break;
        }
    }
    Ok(visited)
}

/// Read operations available on both transaction kinds
pub trait ReadAccess {
    /// Raw record bytes under `key`, or `None`
    fn get_raw(&self, db: Database, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Walk the database from its first key, one cursor step at a time,
    /// until `visit` breaks. Returns the number of entries visited.
    fn scan(
        &self,
        db: Database,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<ControlFlow<()>>,
    ) -> Result<usize>;

    /// Number of entries in `db`. This walks every entry, so it costs O(n).
    fn count(&self, db: Database) -> Result<usize> {
        self.scan(db, &mut |_, _| Ok(ControlFlow::Continue(())))
    }
}

#[self_referencing]
pub struct OwnedRwTxn {
    engine: Rc<Environment>,
    #[borrows(engine)]
    #[not_covariant]
    txn: Option<RwTransaction<'this>>,
}

impl OwnedRwTxn {
    pub fn begin(engine: Rc<Environment>) -> Result<Self> {
        OwnedRwTxn::try_new(engine, |engine: &Rc<Environment>| {
            engine.begin_rw_txn().map(Some)
        })
        .map_err(engine_err)
    }

    pub fn put(&mut self, db: Database, key: &[u8], bytes: &[u8]) -> Result<()> {
        self.with_txn_mut(|slot| {
            live_mut(slot)?
                .put(db, &key, &bytes, WriteFlags::empty())
                .map_err(engine_err)
        })
    }

    /// Delete `key`; returns false if it was not there
    pub fn del(&mut self, db: Database, key: &[u8]) -> Result<bool> {
        self.with_txn_mut(|slot| match live_mut(slot)?.del(db, &key, None) {
            Ok(()) => Ok(true),
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(engine_err(e)),
        })
    }

    /// Remove every entry from `db`, keeping the database itself
    pub fn clear(&mut self, db: Database) -> Result<()> {
        self.with_txn_mut(|slot| live_mut(slot)?.clear_db(db).map_err(engine_err))
    }

    pub fn commit(mut self) -> Result<()> {
        self.with_txn_mut(|slot| match slot.take() {
            Some(txn) => txn.commit().map_err(engine_err),
            None => Ok(()),
        })
    }
}

impl ReadAccess for OwnedRwTxn {
    fn get_raw(&self, db: Database, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_txn(|slot| get_in(live(slot)?, db, key))
    }

    fn scan(
        &self,
        db: Database,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<ControlFlow<()>>,
    ) -> Result<usize> {
        self.with_txn(|slot| scan_in(live(slot)?, db, visit))
    }
}

#[self_referencing]
pub struct OwnedRoTxn {
    engine: Rc<Environment>,
    #[borrows(engine)]
    #[not_covariant]
    txn: Option<RoTransaction<'this>>,
}

impl OwnedRoTxn {
    pub fn begin(engine: Rc<Environment>) -> Result<Self> {
        OwnedRoTxn::try_new(engine, |engine: &Rc<Environment>| {
            engine.begin_ro_txn().map(Some)
        })
        .map_err(engine_err)
    }

    pub fn commit(mut self) -> Result<()> {
        self.with_txn_mut(|slot| match slot.take() {
            Some(txn) => txn.commit().map_err(engine_err),
            None => Ok(()),
        })
    }
}

impl ReadAccess for OwnedRoTxn {
    fn get_raw(&self, db: Database, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_txn(|slot| get_in(live(slot)?, db, key))
    }

    fn scan(
        &self,
        db: Database,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<ControlFlow<()>>,
    ) -> Result<usize> {
        self.with_txn(|slot| scan_in(live(slot)?, db, visit))
    }
}

/// Backend for the environment-wide write manager
pub struct WriteBackend {
    engine: Rc<Environment>,
}

impl WriteBackend {
    pub fn new(engine: Rc<Environment>) -> Self {
        Self { engine }
    }
}

impl TxnBackend for WriteBackend {
    type Txn = OwnedRwTxn;

    fn mode(&self) -> TxnMode {
        TxnMode::ReadWrite
    }

    fn begin(&self) -> Result<OwnedRwTxn> {
        OwnedRwTxn::begin(self.engine.clone())
    }

    fn commit(&self, txn: OwnedRwTxn) -> Result<()> {
        txn.commit()
    }

    fn abort(&self, txn: OwnedRwTxn) {
        // Dropping an uncommitted lmdb transaction aborts it.
        drop(txn);
    }
}

/// Backend for a store's read manager
///
/// Holds the environment weakly so a closed environment is not kept mapped
/// by stores that outlive it.
pub struct ReadBackend {
    engine: Weak<Environment>,
}

impl ReadBackend {
    pub fn new(engine: Weak<Environment>) -> Self {
        Self { engine }
    }
}

impl TxnBackend for ReadBackend {
    type Txn = OwnedRoTxn;

    fn mode(&self) -> TxnMode {
        TxnMode::ReadOnly
    }

    fn begin(&self) -> Result<OwnedRoTxn> {
        let engine = self
            .engine
            .upgrade()
            .ok_or_else(|| CairnError::UseAfterClose("environment is closed".into()))?;
        OwnedRoTxn::begin(engine)
    }

    fn commit(&self, txn: OwnedRoTxn) -> Result<()> {
        txn.commit()
    }

    fn abort(&self, txn: OwnedRoTxn) {
        drop(txn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::TransactionManager;
    use lmdb::{DatabaseFlags, EnvironmentFlags};
    use tempfile::TempDir;

    fn create_test_env() -> (TempDir, Rc<Environment>, Database) {
        let temp_dir = TempDir::new().unwrap();
        let mut builder = Environment::new();
        builder.set_max_dbs(1);
        builder.set_flags(EnvironmentFlags::NO_TLS);
        let env = builder.open(temp_dir.path()).unwrap();
        let db = env.create_db(Some("test"), DatabaseFlags::empty()).unwrap();
        (temp_dir, Rc::new(env), db)
    }

    #[test]
    fn test_write_then_read() {
        let (_temp_dir, env, db) = create_test_env();

        let mut txn = OwnedRwTxn::begin(env.clone()).unwrap();
        txn.put(db, b"b", b"2").unwrap();
        txn.put(db, b"a", b"1").unwrap();
        assert_eq!(txn.get_raw(db, b"a").unwrap(), Some(b"1".to_vec()));
        txn.commit().unwrap();

        let ro = OwnedRoTxn::begin(env).unwrap();
        assert_eq!(ro.get_raw(db, b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(ro.get_raw(db, b"missing").unwrap(), None);
        assert_eq!(ro.count(db).unwrap(), 2);
    }

    #[test]
    fn test_scan_is_ordered_and_stoppable() {
        let (_temp_dir, env, db) = create_test_env();
        let mut txn = OwnedRwTxn::begin(env.clone()).unwrap();
        for key in ["c", "a", "d", "b"] {
            txn.put(db, key.as_bytes(), b"x").unwrap();
        }
        txn.commit().unwrap();

        let ro = OwnedRoTxn::begin(env).unwrap();
        let mut seen = Vec::new();
        let visited = ro
            .scan(db, &mut |k, _| {
                seen.push(k.to_vec());
                Ok(if seen.len() == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            })
            .unwrap();
        assert_eq!(visited, 3);
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_scan_on_empty_database() {
        let (_temp_dir, env, db) = create_test_env();
        let ro = OwnedRoTxn::begin(env.clone()).unwrap();
        assert_eq!(ro.count(db).unwrap(), 0);
        let visited = ro
            .scan(db, &mut |_, _| Ok(ControlFlow::Continue(())))
            .unwrap();
        assert_eq!(visited, 0);
        ro.commit().unwrap();

        let mut rw = OwnedRwTxn::begin(env).unwrap();
        assert_eq!(rw.count(db).unwrap(), 0);
        rw.put(db, b"k", b"v").unwrap();
        assert!(rw.del(db, b"k").unwrap());
        assert_eq!(rw.count(db).unwrap(), 0);
    }

    #[test]
    fn test_uncommitted_write_is_rolled_back_on_drop() {
        let (_temp_dir, env, db) = create_test_env();
        {
            let mut txn = OwnedRwTxn::begin(env.clone()).unwrap();
            txn.put(db, b"k", b"v").unwrap();
        }
        let ro = OwnedRoTxn::begin(env).unwrap();
        assert_eq!(ro.get_raw(db, b"k").unwrap(), None);
    }

    #[test]
    fn test_del_and_clear() {
        let (_temp_dir, env, db) = create_test_env();
        let mut txn = OwnedRwTxn::begin(env).unwrap();
        txn.put(db, b"k1", b"v").unwrap();
        txn.put(db, b"k2", b"v").unwrap();
        assert!(txn.del(db, b"k1").unwrap());
        assert!(!txn.del(db, b"k1").unwrap());
        txn.clear(db).unwrap();
        assert_eq!(txn.count(db).unwrap(), 0);
    }

    #[test]
    fn test_read_and_write_open_together() {
        let (_temp_dir, env, db) = create_test_env();
        let mut writer = TransactionManager::new(WriteBackend::new(env.clone()));
        let mut reader = TransactionManager::new(ReadBackend::new(Rc::downgrade(&env)));

        writer.begin().unwrap().put(db, b"k", b"v").unwrap();
        // Readers only see committed state.
        let before = reader.run(|txn| txn.get_raw(db, b"k")).unwrap();
        assert_eq!(before, None);

        writer.commit().unwrap();
        let after = reader.run(|txn| txn.get_raw(db, b"k")).unwrap();
        assert_eq!(after, Some(b"v".to_vec()));
        assert_eq!(writer.stats().committed, 1);
    }

    #[test]
    fn test_read_backend_after_engine_dropped() {
        let (_temp_dir, env, _db) = create_test_env();
        let backend = ReadBackend::new(Rc::downgrade(&env));
        drop(env);
        assert!(matches!(
            backend.begin(),
            Err(CairnError::UseAfterClose(_))
        ));
    }
}
