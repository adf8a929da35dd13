//! SQL template registry.
//!
//! A template is a named SQL statement plus the run mode used to execute it.
//! Statement bodies may contain the `{chunk_size}` placeholder, which is
//! replaced with the `--chunk-size` value at render time.
//!
//! The registry is assembled once at startup (built-ins plus templates from
//! the configuration file) and is read-only afterwards, so it can be shared
//! across every job without locking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumIter, EnumString};

use crate::error::{PartSqlError, Result};

/// Placeholder substituted with the chunk size.
pub const CHUNK_SIZE_PLACEHOLDER: &str = "{chunk_size}";

/// Default `--chunk-size` value.
pub const DEFAULT_CHUNK_SIZE: i64 = 1000;

/// How a rendered statement is executed on a shard.
///
/// | Variant     | Config / display string |
/// |-------------|-------------------------|
/// | `Once`      | `"once"`                |
/// | `UntilZero` | `"until_zero"`          |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Execute the statement a single time.
    #[default]
    #[strum(serialize = "once")]
    Once,
    /// Execute repeatedly until a batch reports zero processed rows.
    #[strum(serialize = "until_zero")]
    UntilZero,
}

/// A registered SQL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    body: String,
    run_mode: RunMode,
}

impl Template {
    pub fn new(name: impl Into<String>, body: impl Into<String>, run_mode: RunMode) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            run_mode,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// Substitute every `{chunk_size}` placeholder with `chunk_size`.
    ///
    /// Fails with [`PartSqlError::InvalidChunkSize`] when `chunk_size <= 0`.
    pub fn render(&self, chunk_size: i64) -> Result<RenderedStatement> {
        render(self, chunk_size)
    }
}

/// A statement with all placeholders resolved, ready to send to a shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStatement(String);

impl RenderedStatement {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RenderedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render `template` for the given chunk size. Pure; no side effects.
pub fn render(template: &Template, chunk_size: i64) -> Result<RenderedStatement> {
    if chunk_size <= 0 {
        return Err(PartSqlError::InvalidChunkSize(chunk_size));
    }
    Ok(RenderedStatement(
        template
            .body
            .replace(CHUNK_SIZE_PLACEHOLDER, &chunk_size.to_string()),
    ))
}

// Expression index used to look up form attachments by blob key.
const BLOBMETA_KEY_SQL: &str = r#"
CREATE INDEX CONCURRENTLY IF NOT EXISTS form_processor_xformattachmentsql_blobmeta_key
ON public.form_processor_xformattachmentsql (((
    CASE
        WHEN blob_bucket = '' THEN '' -- empty bucket -> blob_id is the key
        ELSE COALESCE(blob_bucket, 'form/' || attachment_id) || '/'
    END || blob_id
)::varchar(255)))
"#;

/// Immutable name → template mapping.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Template>,
}

impl TemplateRegistry {
    /// Registry containing only the built-in templates.
    pub fn builtin() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(
            "blobmeta_key".to_string(),
            Template::new("blobmeta_key", BLOBMETA_KEY_SQL, RunMode::Once),
        );
        Self { templates }
    }

    /// Built-ins extended with `extra`. A name may be registered only once.
    pub fn with_templates<I>(extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = Template>,
    {
        let mut registry = Self::builtin();
        for template in extra {
            if template.name.trim().is_empty() {
                return Err(PartSqlError::config("template name cannot be empty"));
            }
            if registry.templates.contains_key(&template.name) {
                return Err(PartSqlError::config(format!(
                    "template '{}' is already registered",
                    template.name
                )));
            }
            registry.templates.insert(template.name.clone(), template);
        }
        Ok(registry)
    }

    pub fn lookup(&self, name: &str) -> Result<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| PartSqlError::template_not_found(name))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
