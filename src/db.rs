//! Shard connections.
//!
//! Every job opens its own [`ShardSession`] and holds it for the job's
//! lifetime; sessions are never shared between jobs. Dropping a session
//! closes the underlying connection, so a job releases its connection on
//! every exit path, including errors and panics.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::pin::pin;
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use tracing::{debug, warn};

use crate::config::PartSqlConfig;
use crate::error::{PartSqlError, Result};
use crate::shards::Shard;

/// Native server result of one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementResult {
    /// Row count from the server's command tag, when it reports one.
    pub rows_affected: Option<u64>,
    /// Returned rows in text form; `None` is SQL NULL.
    pub rows: Vec<Vec<Option<String>>>,
}

impl StatementResult {
    pub fn command(rows_affected: u64) -> Self {
        Self {
            rows_affected: Some(rows_affected),
            rows: Vec::new(),
        }
    }
}

/// An open connection to one shard.
#[async_trait]
pub trait ShardSession: Send {
    async fn execute(&mut self, sql: &str) -> Result<StatementResult>;

    /// Like [`execute`](Self::execute), but stops reading after `max_rows` rows.
    async fn execute_capped(&mut self, sql: &str, max_rows: usize) -> Result<StatementResult> {
        let mut result = self.execute(sql).await?;
        result.rows.truncate(max_rows);
        Ok(result)
    }
}

/// Opens sessions to shards.
#[async_trait]
pub trait ShardConnector: Send + Sync {
    async fn connect(&self, shard: &Shard) -> Result<Box<dyn ShardSession>>;
}

/// PostgreSQL connector keyed by database alias.
#[derive(Debug, Clone)]
pub struct PgConnector {
    databases: BTreeMap<String, String>,
    connect_timeout: Duration,
}

impl PgConnector {
    pub fn new(databases: BTreeMap<String, String>, connect_timeout: Duration) -> Self {
        Self {
            databases,
            connect_timeout,
        }
    }

    pub fn from_config(config: &PartSqlConfig) -> Self {
        Self::new(config.databases.clone(), config.connect_timeout())
    }
}

#[async_trait]
impl ShardConnector for PgConnector {
    async fn connect(&self, shard: &Shard) -> Result<Box<dyn ShardSession>> {
        let dsn = self.databases.get(shard.alias()).ok_or_else(|| {
            PartSqlError::connect(shard.alias(), "no connection string configured")
        })?;
        let mut pg_config = Config::from_str(dsn)
            .map_err(|err| PartSqlError::connect(shard.alias(), format!("invalid DSN: {err}")))?;
        pg_config.connect_timeout(self.connect_timeout);

        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|err| PartSqlError::connect(shard.alias(), describe_pg_error(&err)))?;

        let alias = shard.alias().to_string();
        let driver = tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(shard = %alias, "Postgres connection error: {err}");
            }
        });
        debug!(shard = %shard, "connection opened");

        Ok(Box::new(PgSession {
            shard: shard.clone(),
            client,
            driver,
        }))
    }
}

/// Dedicated connection held by a single job.
pub struct PgSession {
    shard: Shard,
    client: Client,
    driver: JoinHandle<()>,
}

#[async_trait]
impl ShardSession for PgSession {
    async fn execute(&mut self, sql: &str) -> Result<StatementResult> {
        // Simple protocol: CREATE INDEX CONCURRENTLY refuses the implicit
        // transaction of an extended-protocol round trip.
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(|err| PartSqlError::execution(self.shard.alias(), describe_pg_error(&err)))?;

        let mut result = StatementResult::default();
        for message in messages {
            match message {
                SimpleQueryMessage::Row(row) => result.rows.push(row_values(&row)),
                SimpleQueryMessage::CommandComplete(count) => {
                    result.rows_affected = Some(count);
                }
                _ => {}
            }
        }
        Ok(result)
    }

    async fn execute_capped(&mut self, sql: &str, max_rows: usize) -> Result<StatementResult> {
        let stream = self
            .client
            .simple_query_raw(sql)
            .await
            .map_err(|err| PartSqlError::execution(self.shard.alias(), describe_pg_error(&err)))?;
        let mut stream = pin!(stream);

        // Rows past the cap are left unread; the driver discards them.
        let mut result = StatementResult::default();
        while let Some(message) = stream.next().await {
            let message = message.map_err(|err| {
                PartSqlError::execution(self.shard.alias(), describe_pg_error(&err))
            })?;
            match message {
                SimpleQueryMessage::Row(row) => {
                    result.rows.push(row_values(&row));
                    if result.rows.len() >= max_rows {
                        break;
                    }
                }
                SimpleQueryMessage::CommandComplete(count) => {
                    result.rows_affected = Some(count);
                }
                _ => {}
            }
        }
        Ok(result)
    }
}

fn row_values(row: &SimpleQueryRow) -> Vec<Option<String>> {
    (0..row.len())
        .map(|idx| row.get(idx).map(str::to_string))
        .collect()
}

impl Drop for PgSession {
    fn drop(&mut self) {
        self.driver.abort();
        debug!(shard = %self.shard, "connection closed");
    }
}

fn describe_pg_error(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => {
            let mut detail = format!(
                "{} {}: {}",
                db.severity(),
                db.code().code(),
                db.message()
            );
            if let Some(extra) = db.detail() {
                detail.push_str(&format!(" (detail: {extra})"));
            }
            if let Some(hint) = db.hint() {
                detail.push_str(&format!(" (hint: {hint})"));
            }
            detail
        }
        None => err.to_string(),
    }
}
