//! # Job Monitoring
//!
//! Drives long-running server-side operations (firmware jobs, tasks) to
//! completion despite stalls and transient failures.
//!
//! # Architecture Note
//! The monitor is an explicit state machine rather than nested polling
//! coroutines with stacked timeouts. Both bounds — the per-pass wall clock
//! and the overall operation deadline — are enforced through one
//! [`Deadline`] token threaded through every awaited call, so exceeding
//! the outer bound cancels any in-flight inner wait instead of leaving it
//! running.
//!
//! Stall detection is whole-pass: a pass in which *no* tracked job's
//! snapshot changed counts as a stall, and any single job's change resets
//! the clock for all of them. Per-job stall granularity is a deliberate
//! non-change; see DESIGN.md.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::collection::Collection;
use crate::error::{Error, TimeoutScope};
use crate::resource::ResourceRoot;

/// One shared cancellation token for an entire monitoring run.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(duration: Duration) -> Self {
        Self {
            at: Instant::now() + duration,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Awaits `future` under this deadline, optionally tightened by an
    /// inner per-step bound. Reports which bound fired.
    pub async fn bound<T, F>(&self, step: Option<Instant>, future: F) -> Result<T, Error>
    where
        F: std::future::Future<Output = Result<T, Error>>,
    {
        let at = step.map_or(self.at, |s| s.min(self.at));
        match tokio::time::timeout_at(at, future).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                scope: if self.expired() {
                    TimeoutScope::Overall
                } else {
                    TimeoutScope::Step
                },
            }),
        }
    }

    /// Sleeps for `duration`, waking early with a timeout when the
    /// deadline would pass first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Error> {
        let wake = Instant::now() + duration;
        if wake >= self.at {
            tokio::time::sleep_until(self.at).await;
            return Err(Error::Timeout {
                scope: TimeoutScope::Overall,
            });
        }
        tokio::time::sleep_until(wake).await;
        Ok(())
    }
}

/// The recovery action invoked after a stalled or over-long pass —
/// typically a power cycle of the managed target.
#[async_trait]
pub trait Recovery: Send + Sync {
    async fn recover(&self) -> Result<(), Error>;
}

/// A recovery that does nothing.
pub struct NoRecovery;

#[async_trait]
impl Recovery for NoRecovery {
    async fn recover(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Timing knobs of a monitoring run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sleep between poll passes.
    pub poll_interval: Duration,
    /// Wall-clock bound of a single pass.
    pub step_timeout: Duration,
    /// Overall operation deadline; terminal when exceeded.
    pub overall_timeout: Duration,
    /// Fixed backoff before retrying after a transient I/O failure.
    pub retry_backoff: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(7),
            step_timeout: Duration::from_secs(600),
            overall_timeout: Duration::from_secs(7200),
            retry_backoff: Duration::from_secs(15),
        }
    }
}

/// States of the monitoring state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Stepping,
    StalledBackoff,
    Recovering,
    TimedOut,
    Succeeded,
    Failed,
}

/// Snapshot of a tracked job. Replaced wholesale on every re-fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub progress: u64,
    pub state: String,
    pub status_ok: bool,
    raw: Value,
}

/// States the service reports for a job that will make no more progress.
const TERMINAL_STATES: &[&str] = &["Completed", "CompletedWithErrors", "Failed", "Cancelled", "Exception"];

impl JobRecord {
    /// Reads a snapshot from a job or task payload. Both the job-style
    /// (`JobState`/`JobStatus`) and task-style (`TaskState`/`TaskStatus`)
    /// field pairs are understood.
    pub fn from_value(value: &Value) -> Self {
        let id = value
            .get("Id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                value
                    .get("@odata.id")
                    .and_then(Value::as_str)
                    .and_then(|id| id.rsplit('/').next())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        let progress = value
            .get("PercentComplete")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let state = value
            .get("JobState")
            .or_else(|| value.get("TaskState"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        let status_ok = value
            .get("JobStatus")
            .or_else(|| value.get("TaskStatus"))
            .and_then(Value::as_str)
            .map(|s| s == "OK")
            .unwrap_or(true);
        Self {
            id,
            progress,
            state,
            status_ok,
            raw: value.clone(),
        }
    }

    pub fn from_root(root: &ResourceRoot) -> Self {
        Self::from_value(root.value())
    }

    fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            progress: 0,
            state: "New".to_string(),
            status_ok: true,
            raw: Value::Null,
        }
    }

    /// Whether the job reached its completion threshold or a terminal
    /// service state.
    pub fn is_terminal(&self) -> bool {
        self.progress >= 100 || TERMINAL_STATES.contains(&self.state.as_str())
    }
}

/// Result of a monitoring run. Partial results in `done` are retained even
/// on a failed or timed-out outcome.
#[derive(Debug)]
pub struct MonitorOutcome {
    pub succeeded: bool,
    pub done: Vec<JobRecord>,
    pub todo: Vec<JobRecord>,
}

struct Tracked {
    id: String,
    last: Option<JobRecord>,
}

/// Polls a job collection until every tracked job completes or a deadline
/// expires.
pub struct JobMonitor<R: Recovery> {
    jobs: Collection<ResourceRoot>,
    recovery: R,
    config: MonitorConfig,
}

impl<R: Recovery> JobMonitor<R> {
    pub fn new(jobs: Collection<ResourceRoot>, recovery: R) -> Self {
        Self::with_config(jobs, recovery, MonitorConfig::default())
    }

    pub fn with_config(jobs: Collection<ResourceRoot>, recovery: R, config: MonitorConfig) -> Self {
        Self {
            jobs,
            recovery,
            config,
        }
    }

    /// Runs the state machine to a terminal state.
    ///
    /// `seed` selects the job to track; without it, one running job is
    /// discovered from the collection. The overall deadline is reported in
    /// the outcome, never thrown. `Err` is reserved for configuration and
    /// programming errors.
    pub async fn run(&mut self, seed: Option<&str>) -> Result<MonitorOutcome, Error> {
        let deadline = Deadline::after(self.config.overall_timeout);
        let mut todo: Vec<Tracked> = Vec::new();
        let mut done: Vec<JobRecord> = Vec::new();
        let mut state = MonitorState::Idle;
        let mut resume = MonitorState::Stepping;

        loop {
            if deadline.expired()
                && !matches!(
                    state,
                    MonitorState::Succeeded | MonitorState::Failed | MonitorState::TimedOut
                )
            {
                state = MonitorState::TimedOut;
            }
            debug!(?state, todo = todo.len(), done = done.len(), "monitor");

            match state {
                MonitorState::Idle => {
                    match deadline.bound(None, self.seed(seed, &mut todo)).await {
                        Ok(()) => state = MonitorState::Stepping,
                        Err(e) if e.is_transient() => {
                            resume = MonitorState::Idle;
                            state = MonitorState::StalledBackoff;
                        }
                        Err(Error::Timeout { .. }) => state = MonitorState::TimedOut,
                        Err(Error::RemoteFault(envelope)) => {
                            warn!(%envelope, "seeding failed");
                            state = MonitorState::Failed;
                        }
                        Err(e) => return Err(e),
                    }
                }
                MonitorState::Stepping => {
                    if todo.is_empty() {
                        state = MonitorState::Succeeded;
                        continue;
                    }
                    let step_over = Instant::now() + self.config.step_timeout;
                    let pass = Self::pass(&mut self.jobs, &mut todo, &mut done);
                    match deadline.bound(Some(step_over), pass).await {
                        Ok(_) if todo.is_empty() => state = MonitorState::Succeeded,
                        Ok(changed) => {
                            if !changed {
                                info!("pass saw no change across tracked jobs");
                                state = MonitorState::Recovering;
                            } else if deadline.sleep(self.config.poll_interval).await.is_err() {
                                state = MonitorState::TimedOut;
                            }
                        }
                        Err(Error::Timeout {
                            scope: TimeoutScope::Step,
                        }) => {
                            warn!("pass exceeded its wall-clock bound");
                            state = MonitorState::Recovering;
                        }
                        Err(Error::Timeout {
                            scope: TimeoutScope::Overall,
                        }) => state = MonitorState::TimedOut,
                        Err(e) if e.is_transient() => {
                            debug!(error = %e, "transient failure, backing off");
                            resume = MonitorState::Stepping;
                            state = MonitorState::StalledBackoff;
                        }
                        Err(Error::RemoteFault(envelope)) => {
                            warn!(%envelope, "tracked job faulted");
                            state = MonitorState::Failed;
                        }
                        Err(e) => return Err(e),
                    }
                }
                MonitorState::StalledBackoff => {
                    state = match deadline.sleep(self.config.retry_backoff).await {
                        Ok(()) => resume,
                        Err(_) => MonitorState::TimedOut,
                    };
                }
                MonitorState::Recovering => {
                    info!("invoking recovery action");
                    match deadline.bound(None, self.recovery.recover()).await {
                        Ok(()) => {
                            state = if deadline.sleep(self.config.poll_interval).await.is_ok() {
                                MonitorState::Stepping
                            } else {
                                MonitorState::TimedOut
                            };
                        }
                        Err(Error::Timeout { .. }) => state = MonitorState::TimedOut,
                        Err(e) if e.is_transient() => {
                            resume = MonitorState::Recovering;
                            state = MonitorState::StalledBackoff;
                        }
                        Err(e) => {
                            warn!(error = %e, "recovery action failed");
                            state = MonitorState::Failed;
                        }
                    }
                }
                MonitorState::Succeeded => {
                    return Ok(Self::outcome(true, done, &todo));
                }
                MonitorState::TimedOut | MonitorState::Failed => {
                    return Ok(Self::outcome(false, done, &todo));
                }
            }
        }
    }

    fn outcome(succeeded: bool, done: Vec<JobRecord>, todo: &[Tracked]) -> MonitorOutcome {
        MonitorOutcome {
            succeeded,
            done,
            todo: todo
                .iter()
                .map(|t| t.last.clone().unwrap_or_else(|| JobRecord::placeholder(&t.id)))
                .collect(),
        }
    }

    /// Seeds `todo` with the caller-supplied job, or with one running job
    /// discovered from the collection. Jobs already terminal at discovery
    /// time are not tracked.
    async fn seed(&mut self, seed: Option<&str>, todo: &mut Vec<Tracked>) -> Result<(), Error> {
        if let Some(id) = seed {
            info!(job = id, "tracking");
            todo.push(Tracked {
                id: id.to_string(),
                last: None,
            });
            return Ok(());
        }
        self.jobs.refresh().await?;
        let stubs: Vec<_> = self.jobs.members().to_vec();
        for stub in stubs {
            let root = match ResourceRoot::fetch(self.jobs.root().client(), &stub.identifier).await
            {
                Ok(root) => root,
                Err(Error::RemoteFault(envelope)) => {
                    debug!(member = %stub.identifier, %envelope, "skipping faulted job");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let record = JobRecord::from_root(&root);
            if !record.is_terminal() {
                info!(job = %record.id, "discovered running job");
                todo.push(Tracked {
                    id: record.id.clone(),
                    last: None,
                });
                return Ok(());
            }
        }
        Ok(())
    }

    /// One poll pass. Returns whether any tracked job's snapshot changed;
    /// first observations count as changes.
    async fn pass(
        jobs: &mut Collection<ResourceRoot>,
        todo: &mut Vec<Tracked>,
        done: &mut Vec<JobRecord>,
    ) -> Result<bool, Error> {
        jobs.refresh().await?;
        let mut changed = false;
        let mut index = 0;
        while index < todo.len() {
            let member = jobs.index(&todo[index].id).await?;
            let record = JobRecord::from_root(&member);
            let previous = todo[index].last.as_ref();
            if previous.map_or(true, |p| p.raw != record.raw) {
                changed = true;
            }
            if record.is_terminal() {
                info!(job = %record.id, progress = record.progress, state = %record.state, "job finished");
                done.push(record);
                todo.remove(index);
            } else {
                debug!(job = %record.id, progress = record.progress, "job running");
                todo[index].last = Some(record);
                index += 1;
            }
        }
        Ok(changed)
    }
}
