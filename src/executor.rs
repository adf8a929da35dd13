//! Statement executors.
//!
//! A template's [`RunMode`] selects one of two executors behind the
//! [`StatementExecutor`] interface:
//!
//! - [`RunOnce`] sends the statement a single time and hands back the
//!   server's result untouched.
//! - [`RunUntilZero`] is the drain loop: the statement is sent repeatedly,
//!   each batch must answer with exactly one row holding one numeric column
//!   (the number of items processed), and the loop stops at the first batch
//!   that reports zero.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::db::{ShardSession, StatementResult};
use crate::error::{PartSqlError, Result};
use crate::progress::{self, ProgressReporter};
use crate::shards::Shard;
use crate::templates::{RenderedStatement, RunMode};

/// Minimum time between two periodic progress lines of one drain loop.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Rows read per drain batch; a second row is already a shape violation.
pub const BATCH_ROW_LIMIT: usize = 2;

/// Terminal result of a successful execution on one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Server result of a single execution
    Once(StatementResult),
    /// Drain loop finished after `batches` executions (the last one reported zero)
    Drained { total: u64, batches: u64 },
}

/// Runs a rendered statement on one shard's session.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(
        &self,
        session: &mut dyn ShardSession,
        shard: &Shard,
        statement: &RenderedStatement,
        reporter: &dyn ProgressReporter,
    ) -> Result<ExecutionOutcome>;
}

impl RunMode {
    /// Executor implementing this run mode.
    pub fn executor(self) -> &'static dyn StatementExecutor {
        match self {
            RunMode::Once => &RunOnce,
            RunMode::UntilZero => &RunUntilZero,
        }
    }
}

/// Execute the statement exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOnce;

#[async_trait]
impl StatementExecutor for RunOnce {
    async fn execute(
        &self,
        session: &mut dyn ShardSession,
        shard: &Shard,
        statement: &RenderedStatement,
        reporter: &dyn ProgressReporter,
    ) -> Result<ExecutionOutcome> {
        reporter.line(&progress::running_line(shard));
        let result = session.execute(statement.as_str()).await?;
        debug!(shard = %shard, rows_affected = ?result.rows_affected, "statement completed");
        Ok(ExecutionOutcome::Once(result))
    }
}

/// Execute the statement repeatedly until a batch reports zero items.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunUntilZero;

#[async_trait]
impl StatementExecutor for RunUntilZero {
    async fn execute(
        &self,
        session: &mut dyn ShardSession,
        shard: &Shard,
        statement: &RenderedStatement,
        reporter: &dyn ProgressReporter,
    ) -> Result<ExecutionOutcome> {
        let mut total: u64 = 0;
        let mut batches: u64 = 0;
        let mut last_emit: Option<Instant> = None;

        loop {
            let result = session
                .execute_capped(statement.as_str(), BATCH_ROW_LIMIT)
                .await?;
            batches += 1;
            let processed = batch_count(shard, &result)?;
            if processed == 0 {
                break;
            }
            total = total.saturating_add(processed);

            let now = Instant::now();
            if last_emit.is_none_or(|at| now.duration_since(at) >= PROGRESS_INTERVAL) {
                reporter.line(&progress::progress_line(shard, total));
                last_emit = Some(now);
            }
        }

        debug!(shard = %shard, total, batches, "drain loop finished");
        reporter.line(&progress::final_line(shard, total));
        Ok(ExecutionOutcome::Drained { total, batches })
    }
}

/// Items processed by one drain batch. NULL counts as zero.
fn batch_count(shard: &Shard, result: &StatementResult) -> Result<u64> {
    let row = match result.rows.as_slice() {
        [row] => row,
        [] => {
            return Err(PartSqlError::protocol(
                shard.alias(),
                "expected 1 row with 1 column, got 0 rows",
            ));
        }
        _ => {
            return Err(PartSqlError::protocol(
                shard.alias(),
                "expected 1 row with 1 column, got more than one row",
            ));
        }
    };
    let value = match row.as_slice() {
        [value] => value,
        columns => {
            return Err(PartSqlError::protocol(
                shard.alias(),
                format!("expected 1 row with 1 column, got {} columns", columns.len()),
            ));
        }
    };

    let Some(text) = value else {
        return Ok(0);
    };
    parse_count(text).map_err(|detail| PartSqlError::protocol(shard.alias(), detail))
}

/// Parse a numeric batch value as printed by the server (`42`, `5.00`,
/// `0.0`, `-0`, `1e+3`). Any zero ends the loop; other values must be
/// whole and non-negative.
fn parse_count(text: &str) -> std::result::Result<u64, String> {
    let text = text.trim();
    if let Ok(count) = text.parse::<i64>() {
        return u64::try_from(count).map_err(|_| format!("negative batch count {count}"));
    }

    let value = match text.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => return Err(format!("batch count is not numeric: {text:?}")),
    };
    if value == 0.0 {
        return Ok(0);
    }
    if value < 0.0 {
        return Err(format!("negative batch count {text}"));
    }
    if value.fract() != 0.0 || value >= u64::MAX as f64 {
        return Err(format!("batch count is not a whole number: {text:?}"));
    }
    Ok(value as u64)
}
