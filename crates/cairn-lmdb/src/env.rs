use cairn_core::{
    config::{EnvironmentConfig, SyncMode},
    error::{CairnError, Result},
    traits::RecordStore,
    txn::{TransactionManager, TxnStats},
};
use lmdb::{Cursor, Database, DatabaseFlags, Environment, EnvironmentFlags, Transaction};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use crate::scope::WriteBatch;
use crate::store::LmdbStore;
use crate::txn::{engine_err, OwnedRwTxn, ReadBackend, WriteBackend};

/// One open LMDB environment
///
/// Cheap to clone; clones share the same handle. Obtain one through
/// [`EnvironmentRegistry::open`](crate::EnvironmentRegistry::open) so that
/// each directory is opened at most once.
#[derive(Clone)]
pub struct LmdbEnvironment {
    inner: Rc<EnvInner>,
}

struct EnvInner {
    path: PathBuf,
    config: EnvironmentConfig,
    closed: Cell<bool>,
    engine: Weak<Environment>,
    state: RefCell<Option<OpenEnv>>,
}

struct OpenEnv {
    engine: Rc<Environment>,
    writer: TransactionManager<WriteBackend>,
    stores: HashMap<String, Database>,
}

impl LmdbEnvironment {
    /// Open the engine at an already canonical, existing directory
    pub(crate) fn open(path: PathBuf, config: EnvironmentConfig) -> Result<Self> {
        let mut builder = Environment::new();
        builder.set_max_dbs(config.max_sub_stores);
        builder.set_map_size(config.max_size_bytes);
        builder.set_max_readers(config.max_readers);

        // Read and write transactions share the calling thread.
        let mut flags = EnvironmentFlags::NO_TLS;
        match config.sync_mode {
            SyncMode::Full => {}
            SyncMode::NoMetaSync => {
                flags.insert(EnvironmentFlags::NO_META_SYNC);
            }
            SyncMode::NoSync => {
                flags.insert(EnvironmentFlags::NO_SYNC);
            }
        }
        builder.set_flags(flags);

        let engine = Rc::new(builder.open(&path).map_err(engine_err)?);

        tracing::info!(
            max_sub_stores = config.max_sub_stores,
            max_size_bytes = config.max_size_bytes,
            "Opened environment at {}",
            path.display()
        );

        Ok(Self {
            inner: Rc::new(EnvInner {
                engine: Rc::downgrade(&engine),
                state: RefCell::new(Some(OpenEnv {
                    writer: TransactionManager::new(WriteBackend::new(engine.clone())),
                    engine,
                    stores: HashMap::new(),
                })),
                closed: Cell::new(false),
                config: EnvironmentConfig {
                    path: path.clone(),
                    ..config
                },
                path,
            }),
        })
    }

    /// Canonical directory of this environment
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Whether two handles refer to the same open environment
    pub fn ptr_eq(&self, other: &LmdbEnvironment) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Open (creating if needed) the named store `name`
    ///
    /// Fails with `InvalidState` while a write batch is open, since LMDB
    /// opens databases through its own write transaction.
    pub fn store(&self, name: &str) -> Result<LmdbStore> {
        if name.is_empty() {
            return Err(CairnError::InvalidArgument(
                "store name must not be empty".into(),
            ));
        }

        let (db, engine) = self.with_open(|open| {
            if let Some(db) = open.stores.get(name) {
                return Ok((*db, Rc::downgrade(&open.engine)));
            }
            if open.writer.is_active() {
                return Err(CairnError::InvalidState(format!(
                    "cannot open store '{}' while a write batch is open",
                    name
                )));
            }
            let db = open
                .engine
                .create_db(Some(name), DatabaseFlags::empty())
                .map_err(engine_err)?;
            open.stores.insert(name.to_string(), db);
            tracing::debug!(store = name, "Opened store");
            Ok((db, Rc::downgrade(&open.engine)))
        })?;

        Ok(LmdbStore::new(
            self.clone(),
            name.to_string(),
            db,
            ReadBackend::new(engine),
        ))
    }

    /// Names of every store persisted in this environment, sorted
    pub fn store_names(&self) -> Result<Vec<String>> {
        self.with_open(|open| {
            let main = open.engine.open_db(None).map_err(engine_err)?;
            let txn = open.engine.begin_ro_txn().map_err(engine_err)?;
            let mut names = {
                let mut cursor = txn.open_ro_cursor(main).map_err(engine_err)?;
                cursor
                    .iter()
                    .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
                    .collect::<Vec<_>>()
            };
            txn.commit().map_err(engine_err)?;
            names.sort();
            Ok(names)
        })
    }

    /// Begin a write batch shared by every store of this environment
    pub fn batch(&self) -> Result<WriteBatch> {
        WriteBatch::begin(self)
    }

    /// Run `f` against store `name` inside one write batch
    ///
    /// The batch commits when `f` returns `Ok` and rolls back when it
    /// returns `Err`. The store handle is closed afterwards either way.
    pub fn with_store<R>(
        &self,
        name: &str,
        f: impl FnOnce(&LmdbStore) -> Result<R>,
    ) -> Result<R> {
        let store = self.store(name)?;
        let batch = self.batch()?;
        let outcome = f(&store);
        let finished = if outcome.is_ok() {
            batch.commit()
        } else {
            batch.abort()
        };
        store.close();
        let value = outcome?;
        finished?;
        Ok(value)
    }

    /// Flush buffers to disk; `force` syncs even under `NoSync`
    pub fn sync(&self, force: bool) -> Result<()> {
        self.with_open(|open| open.engine.sync(force).map_err(engine_err))
    }

    /// Physical write transaction counters
    pub fn write_stats(&self) -> Result<TxnStats> {
        self.with_open(|open| Ok(open.writer.stats()))
    }

    /// Close the environment
    ///
    /// Any open write batch is discarded without committing. Stores and
    /// batches derived from this environment fail with `UseAfterClose`
    /// afterwards. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut state = self.inner.state.try_borrow_mut().map_err(|_| self.busy())?;
        let Some(mut open) = state.take() else {
            return Ok(());
        };
        self.inner.closed.set(true);

        if open.writer.is_active() {
            tracing::warn!(
                refcount = open.writer.refcount(),
                "Closing environment at {} with an open write batch; pending writes are discarded",
                self.inner.path.display()
            );
            open.writer.discard();
        }
        drop(open);

        tracing::info!("Closed environment at {}", self.inner.path.display());
        Ok(())
    }

    /// True while something outside this handle still holds the engine,
    /// such as a snapshot taken before close
    pub(crate) fn engine_pinned(&self) -> bool {
        self.is_closed() && self.inner.engine.strong_count() > 0
    }

    /// Run one unit of work under the shared write transaction
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut OwnedRwTxn) -> Result<R>) -> Result<R> {
        self.with_open(|open| open.writer.run(f))
    }

    pub(crate) fn begin_write(&self) -> Result<()> {
        self.with_open(|open| open.writer.begin().map(|_| ()))
    }

    pub(crate) fn release_write(&self, commit: bool) -> Result<()> {
        self.with_open(|open| {
            if commit {
                open.writer.commit()
            } else {
                open.writer.abort()
            }
        })
    }

    fn with_open<R>(&self, f: impl FnOnce(&mut OpenEnv) -> Result<R>) -> Result<R> {
        let mut state = self.inner.state.try_borrow_mut().map_err(|_| self.busy())?;
        let open = state.as_mut().ok_or_else(|| {
            CairnError::UseAfterClose(format!(
                "environment at {} is closed",
                self.inner.path.display()
            ))
        })?;
        f(open)
    }

    fn busy(&self) -> CairnError {
        CairnError::InvalidState(format!(
            "environment at {} is busy",
            self.inner.path.display()
        ))
    }
}

impl fmt::Debug for LmdbEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LmdbEnvironment")
            .field("path", &self.inner.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}
