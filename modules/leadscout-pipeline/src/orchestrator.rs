use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;

use leadscout_common::{Criteria, Job, JobStatus, Lead, LogEntry, SearchHit, SubmitError};
use leadscout_store::StoreError;

use crate::agents::Agent;
use crate::freshness::{canonical_url, Freshness, Resolution};
use crate::qualifier::Qualifier;
use crate::query_gen::QueryGenerator;
use crate::scrape_chain::ScrapeChain;
use crate::search_cache::SearchCache;
use crate::traits::LeadStore;

/// Everything an agent task needs, bundled once at startup.
pub struct PipelineDeps {
    pub store: Arc<dyn LeadStore>,
    pub query_gen: QueryGenerator,
    pub search: Arc<SearchCache>,
    pub chain: Arc<ScrapeChain>,
    pub qualifier: Arc<Qualifier>,
    pub freshness: Arc<Freshness>,
    /// Concurrent URL workers per agent task.
    pub url_workers: usize,
    /// Below this many search results, one broadened retry is attempted.
    pub min_search_results: usize,
}

type JobTable = Arc<RwLock<HashMap<Uuid, Job>>>;

/// Failures that escalate past a single URL. Everything else is logged and
/// contained inside the agent task.
#[derive(Debug, Error)]
enum AgentError {
    #[error("lead store unavailable: {0}")]
    Persistence(#[from] StoreError),
}

/// Owns the process-wide job table and every job's supervisor task handle.
/// Submission never blocks on pipeline work; status reads clone a snapshot
/// under the table's read lock.
pub struct Orchestrator {
    jobs: JobTable,
    handles: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    deps: Arc<PipelineDeps>,
}

impl Orchestrator {
    pub fn new(deps: PipelineDeps) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            handles: Mutex::new(HashMap::new()),
            deps: Arc::new(deps),
        }
    }

    /// Validate, allocate the job record, and schedule the pipeline.
    /// Returns as soon as the supervisor task is spawned.
    pub async fn submit(
        &self,
        criteria: Criteria,
        agent_ids: &[String],
    ) -> Result<Uuid, SubmitError> {
        if criteria.is_incomplete() {
            return Err(SubmitError::IncompleteCriteria);
        }
        if agent_ids.is_empty() {
            return Err(SubmitError::NoAgents);
        }
        let mut agents = Vec::new();
        for id in agent_ids {
            let agent = Agent::parse(id).ok_or_else(|| SubmitError::UnknownAgent(id.clone()))?;
            if !agents.contains(&agent) {
                agents.push(agent);
            }
        }

        let job_id = Uuid::new_v4();
        self.jobs
            .write()
            .await
            .insert(job_id, Job::new(job_id, Utc::now()));

        let handle = tokio::spawn(run_job(
            self.jobs.clone(),
            self.deps.clone(),
            job_id,
            criteria,
            agents,
        ));
        self.handles.lock().await.insert(job_id, handle);

        info!(%job_id, "Job submitted");
        Ok(job_id)
    }

    /// Consistent point-in-time copy of the job, or None for unknown ids.
    pub async fn snapshot(&self, job_id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    /// Bulk export straight from the store.
    pub async fn export_all_leads(&self) -> Result<Vec<Lead>, StoreError> {
        self.deps.store.list_all_leads().await
    }

    /// Block until the job's supervisor task finishes. Used for shutdown
    /// and deterministic test completion; polling callers never need this.
    pub async fn await_job(&self, job_id: Uuid) {
        let handle = self.handles.lock().await.remove(&job_id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(%job_id, error = %e, "Job supervisor task failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JobHandle - the single mutation path for job state
// ---------------------------------------------------------------------------

/// Cloneable writer for one job's state. Every method is one critical
/// section on the table lock, so concurrent readers only ever observe a
/// job between whole mutations.
#[derive(Clone)]
struct JobHandle {
    jobs: JobTable,
    job_id: Uuid,
}

impl JobHandle {
    async fn mutate(&self, f: impl FnOnce(&mut Job)) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&self.job_id) {
            f(job);
            if job.total_urls > 0 {
                job.progress = job.processed_urls as f32 / job.total_urls as f32 * 100.0;
            }
        }
    }

    async fn log(&self, message: String) {
        info!(job_id = %self.job_id, "{message}");
        self.mutate(|job| {
            job.log.push(LogEntry {
                at: Utc::now(),
                message,
            });
        })
        .await;
    }

    async fn log_error(&self, message: String) {
        warn!(job_id = %self.job_id, "{message}");
        self.mutate(|job| {
            job.log.push(LogEntry {
                at: Utc::now(),
                message: format!("ERROR: {message}"),
            });
        })
        .await;
    }

    async fn add_total(&self, count: u32) {
        self.mutate(|job| job.total_urls += count).await;
    }

    /// A URL that ended without a lead (scrape or qualification gave up).
    async fn mark_processed(&self) {
        self.mutate(|job| job.processed_urls += 1).await;
    }

    /// Lead emission and the processed counter move together, so a reader
    /// never sees one without the other.
    async fn push_lead(&self, lead: Lead) {
        self.mutate(|job| {
            job.leads.push(lead);
            job.processed_urls += 1;
        })
        .await;
    }

    async fn finish(&self, status: JobStatus) {
        self.mutate(|job| {
            job.status = status;
            job.ended_at = Some(Utc::now());
            if status == JobStatus::Completed {
                job.progress = 100.0;
            }
        })
        .await;
    }
}

// ---------------------------------------------------------------------------
// Job supervisor
// ---------------------------------------------------------------------------

async fn run_job(
    jobs: JobTable,
    deps: Arc<PipelineDeps>,
    job_id: Uuid,
    criteria: Criteria,
    agents: Vec<Agent>,
) {
    let handle = JobHandle { jobs, job_id };

    let mut set = JoinSet::new();
    for agent in agents {
        let deps = deps.clone();
        let handle = handle.clone();
        let criteria = criteria.clone();
        set.spawn(async move { run_agent(deps, handle, agent, criteria).await });
    }

    let mut persistence_down = false;
    while let Some(result) = set.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(AgentError::Persistence(e))) => {
                handle
                    .log_error(format!("CRITICAL: lead store unavailable: {e}"))
                    .await;
                persistence_down = true;
            }
            Err(join_err) => {
                // One agent imploding must not take the others down.
                handle
                    .log_error(format!("agent task aborted: {join_err}"))
                    .await;
            }
        }
    }

    let status = if persistence_down {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    };
    handle.finish(status).await;
    info!(%job_id, status = %status, "Job finished");
}

async fn run_agent(
    deps: Arc<PipelineDeps>,
    handle: JobHandle,
    agent: Agent,
    criteria: Criteria,
) -> Result<(), AgentError> {
    handle.log(format!("[{agent}] Generating search query...")).await;
    let query = deps.query_gen.generate(agent, &criteria).await;
    handle.log(format!("[{agent}] Search query: {query}")).await;

    let mut hits = match deps.search.search(&query).await {
        Ok(resolution) => {
            if resolution.from_cache {
                handle.log(format!("[{agent}] Search cache hit.")).await;
            }
            resolution.hits
        }
        Err(e) => {
            handle.log_error(format!("[{agent}] Search failed: {e}")).await;
            Vec::new()
        }
    };

    // One broadened retry when the first pass came back thin.
    if hits.len() < deps.min_search_results {
        handle
            .log(format!(
                "[{agent}] Only {} results, retrying with a broader query...",
                hits.len()
            ))
            .await;
        let broader = deps.query_gen.broaden(&query, agent).await;
        match deps.search.search(&broader).await {
            Ok(resolution) => {
                merge_hits(&mut hits, resolution.hits);
                handle
                    .log(format!(
                        "[{agent}] Broadened query: {broader} -> {} URLs total.",
                        hits.len()
                    ))
                    .await;
            }
            Err(e) => {
                handle
                    .log_error(format!("[{agent}] Broadened search failed: {e}"))
                    .await;
            }
        }
    }

    handle.log(format!("[{agent}] Found {} URLs.", hits.len())).await;
    handle.add_total(hits.len() as u32).await;

    let results: Vec<Result<(), AgentError>> = stream::iter(hits.into_iter().map(|hit| {
        let deps = deps.clone();
        let handle = handle.clone();
        let criteria = criteria.clone();
        async move { process_url(deps, handle, agent, &criteria, hit).await }
    }))
    .buffer_unordered(deps.url_workers.max(1))
    .collect()
    .await;

    for result in results {
        result?;
    }
    Ok(())
}

/// Union of two result lists, first-attempt order preserved, deduplicated
/// by canonical URL.
fn merge_hits(hits: &mut Vec<SearchHit>, extra: Vec<SearchHit>) {
    let mut seen: std::collections::HashSet<String> =
        hits.iter().map(|h| canonical_url(&h.url)).collect();
    for hit in extra {
        if seen.insert(canonical_url(&hit.url)) {
            hits.push(hit);
        }
    }
}

async fn process_url(
    deps: Arc<PipelineDeps>,
    handle: JobHandle,
    agent: Agent,
    criteria: &Criteria,
    hit: SearchHit,
) -> Result<(), AgentError> {
    let url = canonical_url(&hit.url);
    if url.is_empty() {
        handle.mark_processed().await;
        return Ok(());
    }

    // Freshness gate: before any network work, every URL, no exceptions.
    match deps.freshness.resolve(&url).await? {
        Resolution::Fresh(lead) => {
            handle.log(format!("[{agent}] Skipping fresh lead: {url}")).await;
            handle.push_lead(lead).await;
            return Ok(());
        }
        Resolution::Stale => {}
    }

    handle.log(format!("[{agent}] Processing {url}...")).await;

    let extraction = match deps.chain.scrape(&url, &criteria.industry).await {
        Ok(extraction) => extraction,
        Err(failure) => {
            for attempt in &failure.attempts {
                handle
                    .log(format!(
                        "[{agent}] {url}: {} {:?}: {}",
                        attempt.strategy, attempt.outcome, attempt.reason
                    ))
                    .await;
            }
            handle
                .log_error(format!("[{agent}] Failed to scrape content from {url}, skipping."))
                .await;
            handle.mark_processed().await;
            return Ok(());
        }
    };

    for attempt in &extraction.attempts {
        handle
            .log(format!(
                "[{agent}] {url}: {} {:?}: {}",
                attempt.strategy, attempt.outcome, attempt.reason
            ))
            .await;
    }

    let mut lead = match deps.qualifier.qualify(criteria, &url, &extraction).await {
        Ok(lead) => lead,
        Err(e) => {
            handle
                .log_error(format!("[{agent}] Qualification failed for {url}: {e}"))
                .await;
            handle.mark_processed().await;
            return Ok(());
        }
    };

    lead.source = Some(agent.to_string());
    if !hit.search_tag.is_empty() {
        lead.search_tag = Some(hit.search_tag);
    }

    deps.store.upsert_lead(&lead).await?;
    handle.push_lead(lead).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_hits_dedups_by_canonical_url() {
        let mut hits = vec![SearchHit {
            url: "https://a.example".into(),
            snippet: String::new(),
            search_tag: "q".into(),
        }];
        merge_hits(
            &mut hits,
            vec![
                SearchHit {
                    url: "HTTPS://A.EXAMPLE ".into(),
                    snippet: String::new(),
                    search_tag: "broader".into(),
                },
                SearchHit {
                    url: "https://b.example".into(),
                    snippet: String::new(),
                    search_tag: "broader".into(),
                },
            ],
        );
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].url, "https://b.example");
    }
}
