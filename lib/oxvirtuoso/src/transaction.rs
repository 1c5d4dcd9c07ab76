//! Connection ownership and best-effort transactions.
//!
//! The only transaction boundary the store offers is the autocommit flag of the connection.
//! Composite writes switch it off, commit on success and roll back on failure.
//! There is no isolation: other connections may observe intermediate states.

use crate::connection::{Connection, PreparedStatement, Statement};
use crate::error::{DatasetError, StoreQueryError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

/// State of the transaction running on a connection.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Default)]
pub enum TransactionState {
    /// No transaction has been started yet.
    #[default]
    Idle,
    /// Autocommit is disabled and writes are pending.
    InProgress,
    /// The last transaction has been committed.
    Committed,
    /// The last transaction has been rolled back.
    RolledBack,
}

/// A connection shared by a dataset, its graphs and its cursors.
pub(crate) struct Session {
    connection: Box<dyn Connection>,
    state: Mutex<TransactionState>,
    closed: AtomicBool,
    unusable: AtomicBool,
}

impl Session {
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            connection,
            state: Mutex::new(TransactionState::Idle),
            closed: AtomicBool::new(false),
            unusable: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    pub fn check_open(&self) -> Result<(), DatasetError> {
        if self.closed.load(Ordering::Acquire) {
            Err(DatasetError::Closed)
        } else if self.unusable.load(Ordering::Acquire) {
            Err(DatasetError::Unusable)
        } else {
            Ok(())
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn statement(&self) -> Result<Statement<'_>, DatasetError> {
        self.check_open()?;
        Ok(Statement::new(self.connection()))
    }

    pub fn prepare_statement<'a>(
        &'a self,
        query: &'a str,
    ) -> Result<PreparedStatement<'a>, DatasetError> {
        self.check_open()?;
        Ok(PreparedStatement::new(self.connection(), query))
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: TransactionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Runs `f` with autocommit disabled, commits if it succeeds and rolls back if it fails.
    ///
    /// Autocommit is restored afterwards, even if `f` panics.
    /// If a transaction is already in progress on the connection `f` joins it.
    pub fn transaction<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce() -> Result<T, DatasetError>,
    ) -> Result<T, DatasetError> {
        self.check_open()?;
        if self.state() == TransactionState::InProgress {
            return f();
        }
        self.connection
            .set_auto_commit(false)
            .map_err(StoreQueryError::new)?;
        self.set_state(TransactionState::InProgress);
        let mut guard = RollbackOnDrop {
            session: self,
            operation,
            armed: true,
        };
        let result = f().and_then(|value| {
            self.connection.commit().map_err(StoreQueryError::new)?;
            Ok(value)
        });
        guard.armed = false;
        match result {
            Ok(value) => {
                self.set_state(TransactionState::Committed);
                info!(operation, "composite write committed");
                self.restore_auto_commit("a commit");
                Ok(value)
            }
            Err(source) => {
                if let Err(rollback) = self.connection.rollback() {
                    error!(
                        operation,
                        error = %rollback,
                        "rollback failed, the connection is now unusable"
                    );
                    self.unusable.store(true, Ordering::Release);
                    return Err(DatasetError::RollbackFailed {
                        operation,
                        source: Box::new(source),
                        rollback: StoreQueryError::new(rollback),
                    });
                }
                self.set_state(TransactionState::RolledBack);
                info!(operation, error = %source, "composite write rolled back");
                self.restore_auto_commit("a rollback");
                Err(DatasetError::CompositeWrite {
                    operation,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Disables autocommit until [`commit`](Self::commit) or [`abort`](Self::abort).
    pub fn begin(&self) -> Result<(), DatasetError> {
        self.check_open()?;
        if self.state() == TransactionState::InProgress {
            return Err(DatasetError::UnsupportedOperation("Nested transactions"));
        }
        self.connection
            .set_auto_commit(false)
            .map_err(StoreQueryError::new)?;
        self.set_state(TransactionState::InProgress);
        Ok(())
    }

    /// Commits the pending transaction.
    ///
    /// Once the store has accepted the commit, a failure to re-enable autocommit is only logged.
    pub fn commit(&self) -> Result<(), DatasetError> {
        self.check_open()?;
        if self.state() != TransactionState::InProgress {
            return Ok(());
        }
        self.connection.commit().map_err(StoreQueryError::new)?;
        self.set_state(TransactionState::Committed);
        self.restore_auto_commit("a commit");
        Ok(())
    }

    pub fn abort(&self) -> Result<(), DatasetError> {
        self.check_open()?;
        if self.state() != TransactionState::InProgress {
            return Ok(());
        }
        if let Err(rollback) = self.connection.rollback() {
            error!(error = %rollback, "rollback failed, the connection is now unusable");
            self.unusable.store(true, Ordering::Release);
            return Err(StoreQueryError::new(rollback).into());
        }
        self.set_state(TransactionState::RolledBack);
        self.restore_auto_commit("a rollback");
        Ok(())
    }

    fn restore_auto_commit(&self, after: &'static str) {
        if let Err(error) = self.connection.set_auto_commit(true) {
            warn!(error = %error, "autocommit could not be restored after {after}");
        }
    }

    /// Closes the connection. Later operations and open cursors fail.
    pub fn close(&self) -> Result<(), DatasetError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.connection.close().map_err(StoreQueryError::new)?;
        Ok(())
    }
}

/// Rolls back the composite write of a [`Session`] if its step unwinds.
struct RollbackOnDrop<'a> {
    session: &'a Session,
    operation: &'static str,
    armed: bool,
}

impl Drop for RollbackOnDrop<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let operation = self.operation;
        if let Err(rollback) = self.session.connection.rollback() {
            error!(
                operation,
                error = %rollback,
                "rollback after a panic failed, the connection is now unusable"
            );
            self.session.unusable.store(true, Ordering::Release);
            return;
        }
        self.session.set_state(TransactionState::RolledBack);
        warn!(operation, "composite write interrupted by a panic, rolled back");
        self.session.restore_auto_commit("a rollback");
    }
}
