//! Shard identifiers and target resolution.
//!
//! Which shards exist is decided outside the engine. A [`ShardResolver`]
//! hands back either the full partitioned set or one explicitly named
//! database; the resolved set is fixed for the duration of a run.

use std::fmt;

use crate::config::PartSqlConfig;
use crate::error::{PartSqlError, Result};

/// Alias of one partition database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Shard(String);

impl Shard {
    pub fn new(alias: impl Into<String>) -> Self {
        Self(alias.into())
    }

    pub fn alias(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Shard {
    fn from(alias: &str) -> Self {
        Self::new(alias)
    }
}

/// Source of target shards for a run.
pub trait ShardResolver: Send + Sync {
    /// Every partition database, in the order they should be reported.
    /// An empty result is treated as a resolution failure by the dispatcher.
    fn resolve_all(&self) -> Result<Vec<Shard>>;

    /// A single database named by the operator, bypassing fan-out.
    fn resolve_explicit(&self, alias: &str) -> Result<Shard>;
}

/// Resolves shards from the `databases` / `partitions` sections of the config.
#[derive(Debug, Clone)]
pub struct ConfigShardResolver<'a> {
    config: &'a PartSqlConfig,
}

impl<'a> ConfigShardResolver<'a> {
    pub fn new(config: &'a PartSqlConfig) -> Self {
        Self { config }
    }
}

impl ShardResolver for ConfigShardResolver<'_> {
    fn resolve_all(&self) -> Result<Vec<Shard>> {
        Ok(self
            .config
            .partitions
            .iter()
            .map(|alias| Shard::new(alias.as_str()))
            .collect())
    }

    fn resolve_explicit(&self, alias: &str) -> Result<Shard> {
        if self.config.dsn(alias).is_some() {
            Ok(Shard::new(alias))
        } else {
            Err(PartSqlError::shard_resolution(format!(
                "database '{}' is not configured",
                alias
            )))
        }
    }
}

/// Fixed shard list. Any configured alias may be named explicitly.
#[derive(Debug, Clone, Default)]
pub struct StaticShardResolver {
    shards: Vec<Shard>,
}

impl StaticShardResolver {
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shards: aliases.into_iter().map(Shard::new).collect(),
        }
    }
}

impl ShardResolver for StaticShardResolver {
    fn resolve_all(&self) -> Result<Vec<Shard>> {
        Ok(self.shards.clone())
    }

    fn resolve_explicit(&self, alias: &str) -> Result<Shard> {
        self.shards
            .iter()
            .find(|shard| shard.alias() == alias)
            .cloned()
            .ok_or_else(|| {
                PartSqlError::shard_resolution(format!("database '{}' is not configured", alias))
            })
    }
}
