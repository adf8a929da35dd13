//! Jobs and their lifecycle.
//!
//! One [`Job`] binds a shard to the rendered statement and run mode. Jobs
//! move strictly forward through their states:
//!
//! ```text
//! Pending → Running → Completed
//!                   ↘ Failed
//! ```
//!
//! A [`RunReport`] collects the terminal state of every job of one run.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::error::PartSqlError;
use crate::executor::ExecutionOutcome;
use crate::shards::Shard;
use crate::templates::{RenderedStatement, RunMode};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Created, not yet started
    Pending,
    /// Connection acquired, statement executing
    Running,
    /// Executor returned successfully (terminal)
    Completed,
    /// Connection, execution or protocol error (terminal)
    Failed,
}

impl JobState {
    /// Returns true if this is a terminal state (Completed or Failed)
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    pub const fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Illegal job state change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Job on {shard} cannot move from {from} to {to}")]
pub struct JobTransitionError {
    pub shard: Shard,
    pub from: JobState,
    pub to: JobState,
}

/// Work scheduled on a single shard.
#[derive(Debug, Clone)]
pub struct Job {
    shard: Shard,
    statement: Arc<RenderedStatement>,
    run_mode: RunMode,
    state: JobState,
}

impl Job {
    pub fn new(shard: Shard, statement: Arc<RenderedStatement>, run_mode: RunMode) -> Self {
        Self {
            shard,
            statement,
            run_mode,
            state: JobState::Pending,
        }
    }

    pub fn shard(&self) -> &Shard {
        &self.shard
    }

    pub fn statement(&self) -> &RenderedStatement {
        &self.statement
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to `next`, rejecting backward moves and moves out of a terminal state.
    pub fn transition_to(&mut self, next: JobState) -> Result<(), JobTransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(JobTransitionError {
                shard: self.shard.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Consume the job into its report, landing in the matching terminal state.
    ///
    /// A successful result requires the job to be `Running`; a failure may
    /// also come straight from `Pending` (e.g. the connection was refused).
    pub fn finish(self, result: Result<ExecutionOutcome, PartSqlError>) -> JobReport {
        let next = if result.is_ok() {
            JobState::Completed
        } else {
            JobState::Failed
        };
        debug_assert!(
            self.state.can_transition_to(next),
            "job on {} finished from {}",
            self.shard,
            self.state
        );
        JobReport {
            shard: self.shard,
            state: next,
            result,
        }
    }
}

/// Terminal record of one job.
#[derive(Debug)]
pub struct JobReport {
    pub shard: Shard,
    pub state: JobState,
    pub result: Result<ExecutionOutcome, PartSqlError>,
}

impl JobReport {
    pub fn error(&self) -> Option<&PartSqlError> {
        self.result.as_ref().err()
    }
}

/// Outcome of every job of a run, in job order.
#[derive(Debug, Default)]
pub struct RunReport {
    jobs: Vec<JobReport>,
}

impl RunReport {
    pub fn new(jobs: Vec<JobReport>) -> Self {
        Self { jobs }
    }

    pub fn jobs(&self) -> &[JobReport] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn completed(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs
            .iter()
            .filter(|job| job.state == JobState::Completed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|job| job.state == JobState::Failed)
    }

    /// True when every job completed.
    pub fn is_success(&self) -> bool {
        self.jobs
            .iter()
            .all(|job| job.state == JobState::Completed)
    }

    /// Closing line for a run of `template`. Success only if every job completed.
    pub fn summary(&self, template: &str) -> RunSummary {
        if self.is_success() {
            RunSummary {
                line: format!("✓ {} completed on {} database(s)", template, self.len()),
                success: true,
            }
        } else {
            let failed = self.len() - self.completed().count();
            RunSummary {
                line: format!(
                    "✗ {} failed on {} of {} database(s)",
                    template,
                    failed,
                    self.len()
                ),
                success: false,
            }
        }
    }
}

/// What the operator is told once a run is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub line: String,
    pub success: bool,
}

impl RunSummary {
    /// The operator declined the fan-out; nothing ran.
    pub fn declined() -> Self {
        Self {
            line: "abort".to_string(),
            success: false,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.success { 0 } else { 1 }
    }
}
