//! Concurrent fan-out of source tasks and fan-in of their partials.
//!
//! A [`ResolutionPlan`] holds exactly one mandatory task and any number of
//! auxiliary ones. Every task runs fetch-then-parse on its own tokio task,
//! gated by a shared semaphore, under its own timeout. When a task times out
//! its child cancellation token is cancelled so the in-flight request stops.
//!
//! Auxiliary failures are logged and dropped. A mandatory failure fails the
//! whole resolution with [`ScrapeError::Aggregate`], unless the caller
//! cancelled, which is reported as [`ScrapeError::Cancelled`].
//! A mandatory partial without any external id ends the resolution before
//! follow-up sources are fetched.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use metaforge_common::error::SourceFailure;
use metaforge_common::{Result, ScrapeError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fetcher::{DocumentFetcher, FetchSpec};
use super::merge::{merge, MergePolicy};
use super::model::{MetadataRecord, PartialMetadata};
use super::parsers::{RequestContext, SourceParser};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRole {
    Mandatory,
    Auxiliary,
}

/// One fetch-then-parse unit of work.
#[derive(Clone)]
pub struct SourceTask {
    pub source_id: String,
    pub role: TaskRole,
    pub parser: Arc<dyn SourceParser>,
    pub fetch: FetchSpec,
    /// Overrides [`AggregatorOptions::task_timeout`].
    pub timeout: Option<Duration>,
}

impl SourceTask {
    pub fn new(
        source_id: impl Into<String>,
        role: TaskRole,
        parser: Arc<dyn SourceParser>,
        fetch: FetchSpec,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            role,
            parser,
            fetch,
            timeout: None,
        }
    }

    pub fn mandatory(
        source_id: impl Into<String>,
        parser: Arc<dyn SourceParser>,
        fetch: FetchSpec,
    ) -> Self {
        Self::new(source_id, TaskRole::Mandatory, parser, fetch)
    }

    pub fn auxiliary(
        source_id: impl Into<String>,
        parser: Arc<dyn SourceParser>,
        fetch: FetchSpec,
    ) -> Self {
        Self::new(source_id, TaskRole::Auxiliary, parser, fetch)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for SourceTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceTask")
            .field("source_id", &self.source_id)
            .field("role", &self.role)
            .field("parser", &self.parser.name())
            .field("url", &self.fetch.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// When a follow-up task is worth running after the first phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpCondition {
    /// No first-phase partial produced a release date.
    MissingReleaseDate,
}

impl FollowUpCondition {
    fn applies(&self, partials: &[PartialMetadata]) -> bool {
        match self {
            Self::MissingReleaseDate => partials.iter().all(|p| p.record.release_date.is_none()),
        }
    }
}

/// Everything needed to resolve one request.
#[derive(Debug, Clone)]
pub struct ResolutionPlan {
    pub tasks: Vec<SourceTask>,
    /// Source ids in merge precedence order. Empty means task order.
    pub precedence: Vec<String>,
    pub context: RequestContext,
    pub policy: MergePolicy,
    pub follow_ups: Vec<(FollowUpCondition, SourceTask)>,
}

impl ResolutionPlan {
    pub fn new(context: RequestContext, policy: MergePolicy) -> Self {
        Self {
            tasks: Vec::new(),
            precedence: Vec::new(),
            context,
            policy,
            follow_ups: Vec::new(),
        }
    }

    pub fn task(mut self, task: SourceTask) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn follow_up(mut self, condition: FollowUpCondition, task: SourceTask) -> Self {
        self.follow_ups.push((condition, task));
        self
    }

    /// The single mandatory task, or `UnsupportedRequest` when the plan has
    /// none or several.
    pub fn mandatory(&self) -> Result<&SourceTask> {
        let mut mandatory = self
            .tasks
            .iter()
            .filter(|t| t.role == TaskRole::Mandatory);
        match (mandatory.next(), mandatory.next()) {
            (Some(task), None) => Ok(task),
            (None, _) => Err(ScrapeError::unsupported("plan has no mandatory source")),
            (Some(_), Some(_)) => Err(ScrapeError::unsupported(
                "plan has more than one mandatory source",
            )),
        }
    }

    fn effective_precedence(&self) -> Vec<String> {
        if !self.precedence.is_empty() {
            return self.precedence.clone();
        }
        self.tasks
            .iter()
            .chain(self.follow_ups.iter().map(|(_, t)| t))
            .map(|t| t.source_id.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Maximum number of tasks fetching or parsing at once.
    pub worker_pool_size: usize,
    pub task_timeout: Duration,
    /// Upper bound for a whole resolution, follow-ups included.
    pub request_deadline: Option<Duration>,
    /// Extra attempts for transient fetch failures.
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            task_timeout: Duration::from_secs(30),
            request_deadline: None,
            max_retries: 1,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

struct TaskOutcome {
    source_id: String,
    role: TaskRole,
    result: Result<PartialMetadata>,
}

/// Runs resolution plans against a shared fetcher and worker pool.
pub struct Aggregator {
    fetcher: Arc<dyn DocumentFetcher>,
    permits: Arc<Semaphore>,
    options: AggregatorOptions,
}

impl Aggregator {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, options: AggregatorOptions) -> Self {
        let permits = Arc::new(Semaphore::new(options.worker_pool_size.max(1)));
        Self {
            fetcher,
            permits,
            options,
        }
    }

    pub fn options(&self) -> &AggregatorOptions {
        &self.options
    }

    /// Execute `plan` and merge what it produced.
    pub async fn resolve(
        &self,
        plan: ResolutionPlan,
        cancel: &CancellationToken,
    ) -> Result<MetadataRecord> {
        plan.mandatory()?;
        let request_token = cancel.child_token();

        match self.options.request_deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.execute(plan, &request_token)).await {
                    Ok(result) => result,
                    Err(_) => {
                        request_token.cancel();
                        warn!(after = ?deadline, "Request deadline exceeded");
                        Err(ScrapeError::Timeout {
                            source_id: "request".to_string(),
                            after: deadline,
                        })
                    }
                }
            }
            None => self.execute(plan, &request_token).await,
        }
    }

    async fn execute(
        &self,
        plan: ResolutionPlan,
        cancel: &CancellationToken,
    ) -> Result<MetadataRecord> {
        let precedence = plan.effective_precedence();
        let mandatory_id = plan.mandatory()?.source_id.clone();
        let ResolutionPlan {
            tasks,
            context,
            policy,
            follow_ups,
            ..
        } = plan;
        let context = Arc::new(context);

        let mut partials = Vec::new();
        let mut mandatory_failure = None;
        let mut auxiliary_failures = Vec::new();

        for outcome in self.run_phase(tasks, &context, cancel).await {
            match (outcome.role, outcome.result) {
                (_, Ok(partial)) => partials.push(partial),
                (TaskRole::Mandatory, Err(error)) => {
                    warn!(source = %outcome.source_id, error = %error, "Mandatory source failed");
                    mandatory_failure = Some(SourceFailure {
                        source_id: outcome.source_id,
                        error,
                    });
                }
                (TaskRole::Auxiliary, Err(error)) => {
                    warn!(source = %outcome.source_id, error = %error, "Auxiliary source failed");
                    auxiliary_failures.push(SourceFailure {
                        source_id: outcome.source_id,
                        error,
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            debug!("Resolution cancelled by caller");
            return Err(ScrapeError::Cancelled);
        }
        if let Some(mandatory) = mandatory_failure {
            return Err(ScrapeError::Aggregate {
                mandatory: Box::new(mandatory),
                auxiliary: auxiliary_failures,
            });
        }

        let has_ids = partials
            .iter()
            .find(|p| p.source == mandatory_id)
            .is_some_and(|p| !p.record.ids.is_empty());
        if !has_ids {
            return Err(ScrapeError::missing_id("external", mandatory_id));
        }

        let pending: Vec<SourceTask> = follow_ups
            .into_iter()
            .filter(|(condition, _)| condition.applies(&partials))
            .map(|(_, task)| task)
            .collect();
        if !pending.is_empty() {
            debug!(count = pending.len(), "Running follow-up sources");
            for outcome in self.run_phase(pending, &context, cancel).await {
                match outcome.result {
                    Ok(partial) => partials.push(partial),
                    Err(error) => {
                        warn!(source = %outcome.source_id, error = %error, "Follow-up source failed");
                    }
                }
            }
        }

        let record = merge(&partials, &precedence, &policy);
        info!(
            title = ?record.title,
            sources = partials.len(),
            "Resolved metadata"
        );
        Ok(record)
    }

    /// Run `tasks` concurrently. Outcomes come back in task order.
    async fn run_phase(
        &self,
        tasks: Vec<SourceTask>,
        context: &Arc<RequestContext>,
        cancel: &CancellationToken,
    ) -> Vec<TaskOutcome> {
        let mut set = JoinSet::new();
        let count = tasks.len();

        for (index, task) in tasks.into_iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let permits = Arc::clone(&self.permits);
            let context = Arc::clone(context);
            let options = self.options.clone();
            let token = cancel.child_token();

            set.spawn(async move {
                let run = run_task(fetcher, permits, &task, &context, &token, &options);
                let result = match AssertUnwindSafe(run).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => Err(ScrapeError::parse(&task.source_id, "parser panicked")),
                };
                (
                    index,
                    TaskOutcome {
                        source_id: task.source_id,
                        role: task.role,
                        result,
                    },
                )
            });
        }

        let mut slots: Vec<Option<TaskOutcome>> = (0..count).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => warn!(error = %e, "Source task aborted"),
            }
        }
        slots.into_iter().flatten().collect()
    }
}

async fn run_task(
    fetcher: Arc<dyn DocumentFetcher>,
    permits: Arc<Semaphore>,
    task: &SourceTask,
    context: &RequestContext,
    token: &CancellationToken,
    options: &AggregatorOptions,
) -> Result<PartialMetadata> {
    let _permit = tokio::select! {
        _ = token.cancelled() => return Err(ScrapeError::Cancelled),
        permit = permits.acquire_owned() => permit.map_err(|_| ScrapeError::Cancelled)?,
    };

    let timeout = task.timeout.unwrap_or(options.task_timeout);
    let attempts = async {
        let mut attempt = 0;
        loop {
            let result = async {
                let document = fetcher.fetch(&task.fetch, token).await?;
                task.parser.parse(&document, context)
            }
            .await;

            match result {
                Ok(mut partial) => {
                    partial.source = task.source_id.clone();
                    return Ok(partial);
                }
                Err(e) if e.is_transient() && attempt < options.max_retries => {
                    attempt += 1;
                    debug!(source = %task.source_id, attempt, error = %e, "Retrying source");
                    tokio::select! {
                        _ = token.cancelled() => return Err(ScrapeError::Cancelled),
                        _ = tokio::time::sleep(options.retry_backoff * attempt) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    };

    match tokio::time::timeout(timeout, attempts).await {
        Ok(result) => result,
        Err(_) => {
            token.cancel();
            Err(ScrapeError::Timeout {
                source_id: task.source_id.clone(),
                after: timeout,
            })
        }
    }
}
