//! partsql library
//!
//! Runs a named maintenance SQL statement on every partition database of a
//! sharded PostgreSQL deployment (or on a single named one), concurrently,
//! collecting per-database failures without letting one abort the others.

pub mod cli;
pub mod config;
pub mod confirm;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod job;
pub mod progress;
pub mod runner;
pub mod shards;
pub mod templates;

// Re-export main types for convenience
pub use config::{PartSqlConfig, TemplateConfig};
pub use confirm::{Confirm, FixedAnswer, StdinConfirm};
pub use db::{PgConnector, ShardConnector, ShardSession, StatementResult};
pub use dispatch::{Dispatcher, ExecutionPlan, RunRequest};
pub use error::{PartSqlError, Result};
pub use executor::{ExecutionOutcome, RunOnce, RunUntilZero, StatementExecutor};
pub use job::{Job, JobReport, JobState, RunReport, RunSummary};
pub use progress::{ConsoleReporter, ProgressReporter, RecordingReporter};
pub use runner::JobRunner;
pub use shards::{ConfigShardResolver, Shard, ShardResolver, StaticShardResolver};
pub use templates::{RenderedStatement, RunMode, Template, TemplateRegistry};
