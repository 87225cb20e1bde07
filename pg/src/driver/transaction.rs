//! Transaction control: `BEGIN`/`COMMIT`/`ROLLBACK` and savepoints.
//!
//! Grounded on the teacher's `begin`/`commit`/`rollback`/`savepoint`/
//! `rollback_to`/`release_savepoint` methods on `PgDriver`, rendered through
//! the AST (`Command::begin()` etc.) instead of hand-written SQL strings.

use qail_core::ast::Command;

use crate::driver::connection::PgConnection;
use crate::error::{PgError, PgResult};
use crate::protocol::TransactionStatus;

impl PgConnection {
    /// `BEGIN`.
    pub fn begin_tx(&mut self) -> PgResult<()> {
        self.execute(&Command::begin())?;
        Ok(())
    }

    /// `COMMIT`. Raises [`PgError::TransactionAborted`] if the transaction
    /// was already marked failed by a prior error (the server would reject
    /// anything but `ROLLBACK` anyway, so this fails fast with a clearer
    /// error than the database's).
    pub fn commit_tx(&mut self) -> PgResult<()> {
        if self.transaction_status() == TransactionStatus::Failed {
            return Err(PgError::TransactionAborted);
        }
        self.execute(&Command::commit())?;
        Ok(())
    }

    /// `ROLLBACK`. Always allowed, including from a failed transaction.
    pub fn rollback_tx(&mut self) -> PgResult<()> {
        self.execute(&Command::rollback())?;
        Ok(())
    }

    /// `SAVEPOINT name`.
    pub fn savepoint(&mut self, name: &str) -> PgResult<()> {
        self.execute(&Command::savepoint(name))?;
        Ok(())
    }

    /// `RELEASE SAVEPOINT name`.
    pub fn release(&mut self, name: &str) -> PgResult<()> {
        self.execute(&Command::release(name))?;
        Ok(())
    }

    /// `ROLLBACK TO SAVEPOINT name`.
    pub fn rollback_to(&mut self, name: &str) -> PgResult<()> {
        self.execute(&Command::rollback_to(name))?;
        Ok(())
    }

    /// Run `cmds` inside a single transaction, rolling back and propagating
    /// the error on the first failure.
    pub fn execute_batch(&mut self, cmds: &[Command]) -> PgResult<Vec<u64>> {
        self.begin_tx()?;
        let mut results = Vec::with_capacity(cmds.len());
        for cmd in cmds {
            match self.execute(cmd) {
                Ok(n) => results.push(n),
                Err(e) => {
                    let _ = self.rollback_tx();
                    return Err(e);
                }
            }
        }
        self.commit_tx()?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    // `begin_tx`/`commit_tx`/etc. require a live server connection; their
    // SQL shape is covered by `protocol::render`'s `transaction_keywords`
    // test, and `TransactionStatus` tracking is exercised end-to-end via
    // `run_extended`'s `ReadyForQuery` handling in `driver::query`.
}
