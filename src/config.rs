//! Configuration file handling.
//!
//! The configuration names every database alias with its connection string,
//! lists which aliases make up the partitioned set, and may register extra
//! SQL templates on top of the built-ins.
//!
//! ```json
//! {
//!   "databases": {
//!     "p1": "host=db1 dbname=commcarehq_p1 user=commcarehq",
//!     "p2": "host=db2 dbname=commcarehq_p2 user=commcarehq"
//!   },
//!   "partitions": ["p1", "p2"],
//!   "connect_timeout_secs": 10,
//!   "templates": {
//!     "purge_deleted": { "sql": "SELECT purge_deleted({chunk_size})", "run_mode": "until_zero" }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::templates::{RunMode, Template, TemplateRegistry};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "partsql.json";

fn default_connect_timeout_secs() -> u64 {
    10
}

/// A template declared in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub sql: String,
    #[serde(default)]
    pub run_mode: RunMode,
}

/// Top-level partsql configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSqlConfig {
    /// Alias → connection string (libpq key/value or URL form)
    pub databases: BTreeMap<String, String>,

    /// Aliases targeted by a fan-out run, in order
    #[serde(default)]
    pub partitions: Vec<String>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub templates: BTreeMap<String, TemplateConfig>,
}

impl PartSqlConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (alias, dsn) in &self.databases {
            if alias.trim().is_empty() {
                anyhow::bail!("Database alias cannot be empty");
            }
            if dsn.trim().is_empty() {
                anyhow::bail!("Database '{}' has an empty connection string", alias);
            }
        }

        let mut seen = HashSet::new();
        for alias in &self.partitions {
            if !self.databases.contains_key(alias) {
                anyhow::bail!("Partition '{}' is not a configured database", alias);
            }
            if !seen.insert(alias.as_str()) {
                anyhow::bail!("Partition '{}' is listed more than once", alias);
            }
        }

        if self.connect_timeout_secs == 0 {
            anyhow::bail!("connect_timeout_secs must be greater than zero");
        }

        for (name, template) in &self.templates {
            if template.sql.trim().is_empty() {
                anyhow::bail!("Template '{}' has an empty SQL body", name);
            }
        }

        // Name collisions are caught while building the registry.
        self.build_registry()?;

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Connection string for `alias`, if configured.
    pub fn dsn(&self, alias: &str) -> Option<&str> {
        self.databases.get(alias).map(String::as_str)
    }

    /// Templates declared in this file.
    pub fn template_definitions(&self) -> Vec<Template> {
        self.templates
            .iter()
            .map(|(name, t)| Template::new(name.clone(), t.sql.clone(), t.run_mode))
            .collect()
    }

    /// Built-in templates plus the ones declared here.
    pub fn build_registry(&self) -> Result<TemplateRegistry> {
        TemplateRegistry::with_templates(self.template_definitions())
            .context("Failed to register configured templates")
    }
}
