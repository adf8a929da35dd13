//! Scripted in-memory shards shared by the integration tests.
//!
//! Every connect, statement, and connection release is appended to a shared
//! [`RecordingReporter`], the same one the runner writes progress and
//! failures to, so tests can assert on the global order of events.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use partsql::{
    PartSqlError, RecordingReporter, Result, Shard, ShardConnector, ShardSession, StatementResult,
};

/// What a scripted shard does.
#[derive(Debug, Clone, Default)]
pub struct ShardPlan {
    /// Delay before each statement returns
    pub delay: Duration,
    /// Replies in order; `Err(msg)` becomes an execution error
    pub replies: Vec<std::result::Result<StatementResult, String>>,
    /// Refuse the connection with this message
    pub refuse: Option<String>,
    /// Panic inside the first statement
    pub panic: bool,
}

impl ShardPlan {
    pub fn ok() -> Self {
        Self {
            replies: vec![Ok(StatementResult::command(0))],
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            replies: vec![Err(message.to_string())],
            ..Self::default()
        }
    }

    /// Drain batches reporting `counts`, one row with one column each.
    pub fn batches(counts: &[u64]) -> Self {
        Self {
            replies: counts
                .iter()
                .map(|n| {
                    Ok(StatementResult {
                        rows_affected: Some(1),
                        rows: vec![vec![Some(n.to_string())]],
                    })
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub struct ScriptedConnector {
    plans: HashMap<String, ShardPlan>,
    log: Arc<RecordingReporter>,
    statements: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new(log: Arc<RecordingReporter>) -> Self {
        Self {
            plans: HashMap::new(),
            log,
            statements: Arc::new(AtomicUsize::new(0)),
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn shard(mut self, alias: &str, plan: ShardPlan) -> Self {
        self.plans.insert(alias.to_string(), plan);
        self
    }

    /// Total statements sent across all shards.
    pub fn statements(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }

    /// Sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShardConnector for ScriptedConnector {
    async fn connect(&self, shard: &Shard) -> Result<Box<dyn ShardSession>> {
        let plan = self.plans.get(shard.alias()).cloned().unwrap_or_default();
        self.log.record(format!("connect {}", shard));
        if let Some(message) = plan.refuse {
            return Err(PartSqlError::connect(shard.alias(), message));
        }
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            shard: shard.clone(),
            delay: plan.delay,
            replies: plan.replies.into(),
            panic: plan.panic,
            log: Arc::clone(&self.log),
            statements: Arc::clone(&self.statements),
            open: Arc::clone(&self.open),
        }))
    }
}

struct ScriptedSession {
    shard: Shard,
    delay: Duration,
    replies: VecDeque<std::result::Result<StatementResult, String>>,
    panic: bool,
    log: Arc<RecordingReporter>,
    statements: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
}

#[async_trait]
impl ShardSession for ScriptedSession {
    async fn execute(&mut self, _sql: &str) -> Result<StatementResult> {
        self.statements.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panic {
            panic!("scripted panic on {}", self.shard);
        }
        match self.replies.pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(PartSqlError::execution(self.shard.alias(), message)),
            None => Err(PartSqlError::execution(self.shard.alias(), "script exhausted")),
        }
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        self.log.record(format!("close {}", self.shard));
    }
}

/// Position of the first line equal to `line`.
pub fn position(lines: &[String], line: &str) -> usize {
    lines
        .iter()
        .position(|l| l == line)
        .unwrap_or_else(|| panic!("{line:?} not found in {lines:#?}"))
}
