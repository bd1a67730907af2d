//! Reference-counted transaction management
//!
//! A [`TransactionManager`] owns at most one physical transaction at a time.
//! Every `begin()` increments a reference count and every `commit()` (or
//! `abort()`) decrements it. Only the release that brings the count back to
//! zero touches the engine:
//!
//! ```text
//! begin()   refcount 0 -> 1   engine: begin txn
//! begin()   refcount 1 -> 2   (shares txn)
//! commit()  refcount 2 -> 1   (nothing)
//! commit()  refcount 1 -> 0   engine: commit txn
//! ```
//!
//! Operations issued while an outer scope holds a reference therefore land
//! in the same transaction; operations issued after the count has dropped
//! to zero get a fresh one.

use crate::error::{CairnError, Result};
use crate::observe;
use std::fmt;
use std::time::Instant;

/// Access mode of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnMode {
    ReadOnly,
    ReadWrite,
}

impl TxnMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnMode::ReadOnly => "read",
            TxnMode::ReadWrite => "write",
        }
    }
}

impl fmt::Display for TxnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine side of a transaction manager
///
/// Implemented by storage backends; the manager never talks to the engine
/// except through these three calls.
pub trait TxnBackend {
    type Txn;

    fn mode(&self) -> TxnMode;

    /// Start a new physical transaction
    fn begin(&self) -> Result<Self::Txn>;

    /// Commit a physical transaction, consuming it
    fn commit(&self, txn: Self::Txn) -> Result<()>;

    /// Abandon a physical transaction, consuming it
    fn abort(&self, txn: Self::Txn);
}

/// Counters for physical transactions handled by one manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxnStats {
    pub begun: u64,
    pub committed: u64,
    pub aborted: u64,
}

pub struct TransactionManager<B: TxnBackend> {
    backend: B,
    current: Option<B::Txn>,
    refcount: usize,
    rollback_only: bool,
    stats: TxnStats,
}

impl<B: TxnBackend> TransactionManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            current: None,
            refcount: 0,
            rollback_only: false,
            stats: TxnStats::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn mode(&self) -> TxnMode {
        self.backend.mode()
    }

    /// Take a reference on the current transaction, starting one if needed
    pub fn begin(&mut self) -> Result<&mut B::Txn> {
        if self.refcount == 0 {
            let txn = self.backend.begin()?;
            self.current = Some(txn);
            self.rollback_only = false;
            self.stats.begun += 1;
            tracing::trace!(mode = %self.mode(), "began transaction");
        }
        self.refcount += 1;

        let (mode, refcount) = (self.mode(), self.refcount);
        self.current.as_mut().ok_or_else(|| {
            CairnError::InvalidState(format!(
                "{} transaction missing with refcount {}",
                mode, refcount
            ))
        })
    }

    /// Release a reference; the last release commits
    pub fn commit(&mut self) -> Result<()> {
        self.release(false)
    }

    /// Release a reference and mark the transaction rollback-only;
    /// the last release aborts
    pub fn abort(&mut self) -> Result<()> {
        self.release(true)
    }

    fn release(&mut self, rollback: bool) -> Result<()> {
        if self.refcount == 0 {
            return Err(CairnError::InvalidState(format!(
                "{} transaction released more times than it was begun",
                self.mode()
            )));
        }

        self.refcount -= 1;
        self.rollback_only |= rollback;
        if self.refcount > 0 {
            return Ok(());
        }

        let Some(txn) = self.current.take() else {
            return Err(CairnError::InvalidState(format!(
                "no {} transaction to finish",
                self.mode()
            )));
        };

        if std::mem::take(&mut self.rollback_only) {
            self.backend.abort(txn);
            self.stats.aborted += 1;
            observe::record_abort(self.mode().as_str());
            tracing::debug!(mode = %self.mode(), "aborted transaction");
            return Ok(());
        }

        let start = Instant::now();
        let result = self.backend.commit(txn);
        observe::record_commit(self.mode().as_str(), start.elapsed(), result.is_ok());
        match &result {
            Ok(()) => {
                self.stats.committed += 1;
                tracing::trace!(mode = %self.mode(), "committed transaction");
            }
            Err(e) => {
                self.stats.aborted += 1;
                tracing::debug!(mode = %self.mode(), error = %e, "commit failed");
            }
        }
        result
    }

    /// Run `f` inside a referenced transaction, always releasing the reference
    ///
    /// If `f` fails its error is returned and any commit error is only logged.
    pub fn run<R>(&mut self, f: impl FnOnce(&mut B::Txn) -> Result<R>) -> Result<R> {
        let outcome = f(self.begin()?);
        let released = self.commit();

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), released) => {
                if let Err(commit_err) = released {
                    tracing::debug!(
                        error = %commit_err,
                        "release after failed operation also failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Drop any open transaction and forget all references
    pub fn discard(&mut self) {
        if let Some(txn) = self.current.take() {
            tracing::warn!(
                mode = %self.mode(),
                refcount = self.refcount,
                "discarding open transaction"
            );
            self.backend.abort(txn);
            self.stats.aborted += 1;
        }
        self.refcount = 0;
        self.rollback_only = false;
    }

    pub fn refcount(&self) -> usize {
        self.refcount
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn stats(&self) -> TxnStats {
        self.stats
    }
}

impl<B: TxnBackend> Drop for TransactionManager<B> {
    fn drop(&mut self) {
        if let Some(txn) = self.current.take() {
            self.backend.abort(txn);
        }
    }
}
