//! Transaction scope supplied by the host.
//!
//! A `TxScope` is handed to every operation that writes through the stores.
//! Scopes follow REQUIRED propagation: beginning while a transaction is open
//! joins it, and only the outermost scope commits or rolls back. A joined
//! scope that rolls back marks the whole transaction rollback-only.

use segments_core::{SegmentsError, SegmentsResult, StorageError};

/// Proof that a transaction is open for the duration of a call.
#[derive(Debug, PartialEq, Eq)]
pub struct TxScope {
    id: u64,
    owner: bool,
}

impl TxScope {
    /// Create a scope. Only `TransactionManager` implementations call this.
    pub fn new(id: u64, owner: bool) -> Self {
        Self { id, owner }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// True when this scope started the transaction (rather than joining it).
    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

/// Begin/commit/rollback with REQUIRED propagation.
pub trait TransactionManager: Send + Sync {
    /// Start a transaction, or join the one already open.
    fn begin(&self) -> SegmentsResult<TxScope>;

    /// Commit. A joined scope only leaves the transaction.
    fn commit(&self, tx: TxScope) -> SegmentsResult<()>;

    /// Roll back. A joined scope marks the transaction rollback-only.
    fn rollback(&self, tx: TxScope) -> SegmentsResult<()>;
}

/// Run `f` inside a transaction: commit on `Ok`, roll back on any `Err`.
pub fn in_transaction<M, T, F>(manager: &M, f: F) -> SegmentsResult<T>
where
    M: TransactionManager + ?Sized,
    F: FnOnce(&TxScope) -> SegmentsResult<T>,
{
    let tx = manager.begin()?;
    let tx_id = tx.id();

    match f(&tx) {
        Ok(value) => {
            manager.commit(tx)?;
            Ok(value)
        }
        Err(err) => {
            tracing::debug!(tx_id, error = %err, "Rolling back transaction");
            if let Err(rollback_err) = manager.rollback(tx) {
                tracing::error!(tx_id, error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

pub(crate) fn rollback_only_error(tx_id: u64) -> SegmentsError {
    SegmentsError::Storage(StorageError::TransactionFailed {
        reason: format!("transaction {} was marked rollback-only", tx_id),
    })
}
