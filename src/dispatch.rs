//! Execution dispatcher.
//!
//! Turns a run request into jobs. Everything that can fail without touching
//! a database happens first, in this order: template lookup, rendering,
//! target resolution, confirmation. Only then are jobs created.
//!
//! - An explicit `--dbname`, or a resolved set of exactly one shard, runs as
//!   a single job without asking for confirmation.
//! - Several resolved shards require the operator to confirm, then fan out
//!   through [`JobRunner::run_all`].

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::confirm::{Confirm, confirmation_prompt};
use crate::error::{PartSqlError, Result};
use crate::job::{Job, RunReport};
use crate::runner::JobRunner;
use crate::shards::{Shard, ShardResolver};
use crate::templates::{RenderedStatement, RunMode, TemplateRegistry};

/// Parameters of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub name: String,
    pub dbname: Option<String>,
    pub chunk_size: i64,
}

impl RunRequest {
    pub fn new(name: impl Into<String>, chunk_size: i64) -> Self {
        Self {
            name: name.into(),
            dbname: None,
            chunk_size,
        }
    }

    pub fn on_database(mut self, alias: impl Into<String>) -> Self {
        self.dbname = Some(alias.into());
        self
    }
}

/// A fully resolved run: what to execute, how, and where.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub template: String,
    pub run_mode: RunMode,
    pub statement: Arc<RenderedStatement>,
    pub shards: Vec<Shard>,
    /// Target was named with `--dbname`
    pub explicit: bool,
}

impl ExecutionPlan {
    /// Fan-out to several shards without an explicit target.
    pub fn requires_confirmation(&self) -> bool {
        !self.explicit && self.shards.len() > 1
    }

    /// One pending job per shard, all sharing the rendered statement.
    pub fn jobs(&self) -> Vec<Job> {
        self.shards
            .iter()
            .map(|shard| Job::new(shard.clone(), Arc::clone(&self.statement), self.run_mode))
            .collect()
    }
}

pub struct Dispatcher<'a> {
    registry: &'a TemplateRegistry,
    resolver: &'a dyn ShardResolver,
    confirm: &'a dyn Confirm,
    runner: JobRunner,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        registry: &'a TemplateRegistry,
        resolver: &'a dyn ShardResolver,
        confirm: &'a dyn Confirm,
        runner: JobRunner,
    ) -> Self {
        Self {
            registry,
            resolver,
            confirm,
            runner,
        }
    }

    /// Resolve template, statement and targets without side effects.
    pub fn plan(&self, request: &RunRequest) -> Result<ExecutionPlan> {
        let template = self.registry.lookup(&request.name)?;
        let statement = template.render(request.chunk_size)?;

        let (shards, explicit) = match request.dbname.as_deref() {
            Some(alias) => (vec![self.resolver.resolve_explicit(alias)?], true),
            None => (self.resolver.resolve_all()?, false),
        };
        if shards.is_empty() {
            return Err(PartSqlError::shard_resolution(
                "no partition databases configured",
            ));
        }
        let mut seen = HashSet::with_capacity(shards.len());
        if let Some(dup) = shards.iter().find(|shard| !seen.insert(*shard)) {
            return Err(PartSqlError::shard_resolution(format!(
                "database '{}' resolved more than once",
                dup
            )));
        }

        debug!(
            template = template.name(),
            mode = %template.run_mode(),
            shards = shards.len(),
            "execution planned"
        );
        Ok(ExecutionPlan {
            template: template.name().to_string(),
            run_mode: template.run_mode(),
            statement: Arc::new(statement),
            shards,
            explicit,
        })
    }

    /// Plan, confirm if needed, and execute.
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport> {
        let plan = self.plan(request)?;

        if plan.requires_confirmation() {
            let count = plan.shards.len();
            if !self.confirm.confirm(&confirmation_prompt(count))? {
                warn!(shards = count, "multi-database run declined");
                return Err(PartSqlError::UserDeclined { shards: count });
            }
        }

        let mut jobs = plan.jobs();
        info!(template = %plan.template, shards = jobs.len(), "dispatching");
        if jobs.len() == 1 {
            if let Some(job) = jobs.pop() {
                return Ok(self.runner.run_single(job).await);
            }
        }
        Ok(self.runner.run_all(jobs).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::FixedAnswer;
    use crate::db::{ShardConnector, ShardSession};
    use crate::progress::RecordingReporter;
    use crate::shards::StaticShardResolver;
    use async_trait::async_trait;

    /// Connector that must never be reached.
    struct Unreachable;

    #[async_trait]
    impl ShardConnector for Unreachable {
        async fn connect(&self, shard: &Shard) -> Result<Box<dyn ShardSession>> {
            panic!("connected to {shard} during a pre-dispatch failure")
        }
    }

    fn runner() -> JobRunner {
        JobRunner::new(Arc::new(Unreachable), Arc::new(RecordingReporter::new()))
    }

    #[test]
    fn test_plan_single_resolved_shard_needs_no_confirmation() {
        let registry = TemplateRegistry::builtin();
        let resolver = StaticShardResolver::new(["p1"]);
        let confirm = FixedAnswer::new("n");
        let dispatcher = Dispatcher::new(&registry, &resolver, &confirm, runner());

        let plan = dispatcher.plan(&RunRequest::new("blobmeta_key", 1000)).unwrap();
        assert!(!plan.requires_confirmation());
        assert_eq!(plan.jobs().len(), 1);
    }

    #[test]
    fn test_plan_explicit_target_skips_fan_out() {
        let registry = TemplateRegistry::builtin();
        let resolver = StaticShardResolver::new(["p1", "p2", "p3"]);
        let confirm = FixedAnswer::new("n");
        let dispatcher = Dispatcher::new(&registry, &resolver, &confirm, runner());

        let request = RunRequest::new("blobmeta_key", 1000).on_database("p2");
        let plan = dispatcher.plan(&request).unwrap();
        assert!(plan.explicit);
        assert_eq!(plan.shards, vec![Shard::from("p2")]);
        assert!(!plan.requires_confirmation());
    }

    #[tokio::test]
    async fn test_unknown_template_fails_before_resolution() {
        let registry = TemplateRegistry::builtin();
        let resolver = StaticShardResolver::new(Vec::<String>::new());
        let confirm = FixedAnswer::new("y");
        let dispatcher = Dispatcher::new(&registry, &resolver, &confirm, runner());

        let err = dispatcher
            .run(&RunRequest::new("nope", 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, PartSqlError::TemplateNotFound { .. }));
        assert_eq!(confirm.times_asked(), 0);
    }

    #[tokio::test]
    async fn test_invalid_chunk_size_is_pre_dispatch() {
        let registry = TemplateRegistry::builtin();
        let resolver = StaticShardResolver::new(["p1", "p2"]);
        let confirm = FixedAnswer::new("y");
        let dispatcher = Dispatcher::new(&registry, &resolver, &confirm, runner());

        for chunk_size in [0, -1] {
            let err = dispatcher
                .run(&RunRequest::new("blobmeta_key", chunk_size))
                .await
                .unwrap_err();
            assert!(matches!(err, PartSqlError::InvalidChunkSize(n) if n == chunk_size));
        }
        assert_eq!(confirm.times_asked(), 0);
    }

    #[tokio::test]
    async fn test_empty_shard_set_is_resolution_error() {
        let registry = TemplateRegistry::builtin();
        let resolver = StaticShardResolver::new(Vec::<String>::new());
        let confirm = FixedAnswer::new("y");
        let dispatcher = Dispatcher::new(&registry, &resolver, &confirm, runner());

        let err = dispatcher
            .run(&RunRequest::new("blobmeta_key", 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, PartSqlError::ShardResolution(_)));
        assert_eq!(confirm.times_asked(), 0);
    }

    #[test]
    fn test_duplicate_shards_rejected() {
        let registry = TemplateRegistry::builtin();
        let resolver = StaticShardResolver::new(["p1", "p2", "p1"]);
        let confirm = FixedAnswer::new("y");
        let dispatcher = Dispatcher::new(&registry, &resolver, &confirm, runner());

        let err = dispatcher
            .plan(&RunRequest::new("blobmeta_key", 1000))
            .unwrap_err();
        assert!(matches!(err, PartSqlError::ShardResolution(ref msg) if msg.contains("p1")));
    }

    #[tokio::test]
    async fn test_declined_confirmation_creates_no_jobs() {
        let registry = TemplateRegistry::builtin();
        let resolver = StaticShardResolver::new(["p1", "p2", "p3"]);

        for reply in ["n", "", "yes"] {
            let confirm = FixedAnswer::new(reply);
            let dispatcher = Dispatcher::new(&registry, &resolver, &confirm, runner());
            let err = dispatcher
                .run(&RunRequest::new("blobmeta_key", 1000))
                .await
                .unwrap_err();
            assert!(matches!(err, PartSqlError::UserDeclined { shards: 3 }));
            assert_eq!(confirm.times_asked(), 1);
        }
    }
}
