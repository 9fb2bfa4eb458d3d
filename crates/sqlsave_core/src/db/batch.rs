//! Batch execution under transactional policies.
//!
//! # Invariants
//! - Zero statements never open a transaction.
//! - A single statement runs directly, without a transaction wrapper.
//! - Gate mode commits even when the anchor statement affected no rows; only
//!   an error rolls back.

use super::{Backend, SqlResult};
use crate::build::Statement;
use log::{debug, error, info};
use std::time::Instant;

/// Transaction policy for batches of two or more statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Run every statement; any failure discards the whole batch.
    #[default]
    All,
    /// Run the rest only if the first statement affected at least one row.
    Gate,
}

impl BatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Gate => "gate",
        }
    }
}

/// Executes one statement outside any explicit transaction.
pub fn exec_statement<B: Backend + ?Sized>(
    backend: &mut B,
    statement: &Statement,
) -> SqlResult<usize> {
    let started_at = Instant::now();
    match backend.execute(statement.query(), statement.params()) {
        Ok(rows) => {
            debug!(
                "event=sql_exec module=db status=ok rows={rows} params={} duration_ms={}",
                statement.params().len(),
                started_at.elapsed().as_millis()
            );
            Ok(rows)
        }
        Err(err) => {
            error!(
                "event=sql_exec module=db status=error params={} duration_ms={} error={}",
                statement.params().len(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

/// Runs `statements` as one unit and returns the total affected-row count.
///
/// # Errors
/// - The first backend failure, after the transaction has been rolled back.
pub fn run_batch<B: Backend + ?Sized>(
    backend: &mut B,
    statements: &[Statement],
    mode: BatchMode,
) -> SqlResult<usize> {
    match statements {
        [] => return Ok(0),
        [single] => return exec_statement(backend, single),
        _ => {}
    }

    let started_at = Instant::now();
    backend.begin()?;

    let outcome = run_in_transaction(backend, statements, mode).and_then(|rows| {
        backend.commit()?;
        Ok(rows)
    });

    match outcome {
        Ok(rows) => {
            info!(
                "event=sql_batch module=db status=ok mode={} statements={} rows={rows} duration_ms={}",
                mode.as_str(),
                statements.len(),
                started_at.elapsed().as_millis()
            );
            Ok(rows)
        }
        Err(err) => {
            if let Err(rollback_err) = backend.rollback() {
                error!(
                    "event=sql_batch module=db status=rollback_failed mode={} error={}",
                    mode.as_str(),
                    rollback_err
                );
            }
            error!(
                "event=sql_batch module=db status=rolled_back mode={} statements={} duration_ms={} error={}",
                mode.as_str(),
                statements.len(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn run_in_transaction<B: Backend + ?Sized>(
    backend: &mut B,
    statements: &[Statement],
    mode: BatchMode,
) -> SqlResult<usize> {
    let mut total = 0;
    for (position, statement) in statements.iter().enumerate() {
        let rows = backend.execute(statement.query(), statement.params())?;
        if position == 0 && rows == 0 && mode == BatchMode::Gate {
            debug!(
                "event=sql_batch module=db status=gate_closed skipped={}",
                statements.len() - 1
            );
            return Ok(0);
        }
        total += rows;
    }
    Ok(total)
}
