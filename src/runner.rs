//! Concurrent job runner.
//!
//! `run_all` starts one task per job, then waits on every task handle before
//! looking at any result. A job failure (connection, statement, protocol,
//! even a panic) is recorded against that job only; sibling jobs keep going
//! and nothing is cancelled. Failures are reported after the join, never
//! while other jobs are still running.
//!
//! `run_single` goes through the same task and join, so a single-shard run
//! reports a panic the same way a fan-out does.
//!
//! Each job opens its own connection when it starts and drops it before
//! its task finishes, whatever the outcome.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::db::ShardConnector;
use crate::error::PartSqlError;
use crate::job::{Job, JobReport, JobState, RunReport};
use crate::progress::ProgressReporter;
use crate::shards::Shard;

/// Executes jobs against shards and reports their outcome.
#[derive(Clone)]
pub struct JobRunner {
    connector: Arc<dyn ShardConnector>,
    reporter: Arc<dyn ProgressReporter>,
}

impl JobRunner {
    pub fn new(connector: Arc<dyn ShardConnector>, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            connector,
            reporter,
        }
    }

    /// Run a single job on its own task and wait for it.
    pub async fn run_single(&self, job: Job) -> RunReport {
        let report = join_job(self.spawn(job)).await;
        self.finish(RunReport::new(vec![report]))
    }

    /// Fan out: one task per job, joined before any result is inspected.
    pub async fn run_all(&self, jobs: Vec<Job>) -> RunReport {
        info!(jobs = jobs.len(), "starting jobs");

        let handles: Vec<_> = jobs.into_iter().map(|job| self.spawn(job)).collect();

        // Join barrier: awaiting in order never cancels the handles not yet awaited.
        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            reports.push(join_job(handle).await);
        }

        self.finish(RunReport::new(reports))
    }

    fn spawn(&self, job: Job) -> (Shard, JoinHandle<JobReport>) {
        let shard = job.shard().clone();
        let connector = Arc::clone(&self.connector);
        let reporter = Arc::clone(&self.reporter);
        (shard, tokio::spawn(execute_job(job, connector, reporter)))
    }

    fn finish(&self, report: RunReport) -> RunReport {
        for job in report.failures() {
            if let Some(err) = job.error() {
                error!(shard = %job.shard, "job failed: {err}");
                self.reporter.failure(&job.shard, err);
            }
        }
        info!(
            completed = report.completed().count(),
            failed = report.failures().count(),
            "all jobs finished"
        );
        report
    }
}

/// Wait for one job task; a task that panicked becomes a failed job.
async fn join_job((shard, handle): (Shard, JoinHandle<JobReport>)) -> JobReport {
    match handle.await {
        Ok(report) => report,
        Err(join_err) => {
            warn!(shard = %shard, "job task did not finish cleanly: {join_err}");
            JobReport {
                result: Err(PartSqlError::TaskPanicked {
                    shard: shard.alias().to_string(),
                }),
                shard,
                state: JobState::Failed,
            }
        }
    }
}

async fn execute_job(
    mut job: Job,
    connector: Arc<dyn ShardConnector>,
    reporter: Arc<dyn ProgressReporter>,
) -> JobReport {
    let shard = job.shard().clone();

    let mut session = match connector.connect(&shard).await {
        Ok(session) => session,
        Err(err) => return job.finish(Err(err)),
    };

    if let Err(err) = job.transition_to(JobState::Running) {
        return job.finish(Err(PartSqlError::execution(shard.alias(), err.to_string())));
    }
    debug!(shard = %shard, mode = %job.run_mode(), "job running");

    let result = job
        .run_mode()
        .executor()
        .execute(session.as_mut(), &shard, job.statement(), reporter.as_ref())
        .await;
    drop(session);

    job.finish(result)
}
