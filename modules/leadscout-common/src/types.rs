use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Search criteria ---

/// What the caller is looking for: a service to sell, into an industry,
/// in a location. All three fields are required at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    pub service: String,
    pub industry: String,
    pub location: String,
}

impl Criteria {
    pub fn new(
        service: impl Into<String>,
        industry: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            industry: industry.into(),
            location: location.into(),
        }
    }

    /// True if any field is empty after trimming.
    pub fn is_incomplete(&self) -> bool {
        self.service.trim().is_empty()
            || self.industry.trim().is_empty()
            || self.location.trim().is_empty()
    }
}

// --- Leads ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Verdict {
    Yes,
    Maybe,
    No,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Yes => write!(f, "Yes"),
            Verdict::Maybe => write!(f, "Maybe"),
            Verdict::No => write!(f, "No"),
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Ok(Verdict::Yes),
            "maybe" => Ok(Verdict::Maybe),
            "no" => Ok(Verdict::No),
            other => Err(format!("unknown verdict: {other}")),
        }
    }
}

/// The scored outcome of qualification. A score only exists alongside a
/// verdict, so the whole group is optional on `Lead` as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qualification {
    pub verdict: Verdict,
    /// 0–10, clamped at the qualification boundary.
    pub score: u8,
    pub reasoning: String,
    pub signals: Vec<String>,
    pub red_flags: Vec<String>,
}

/// A candidate business record, keyed by URL in the store (upsert, never
/// insert-only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub url: String,
    pub company_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub qualification: Option<Qualification>,
    /// Agent platform that discovered this lead.
    pub source: Option<String>,
    /// The search query that surfaced the URL.
    pub search_tag: Option<String>,
    pub content_preview: Option<String>,
    pub last_updated: DateTime<Utc>,
}

// --- Jobs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Mutable job state. Owned by the orchestrator for the job's duration;
/// readers only ever see clones taken under the table lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    /// 0–100. Stays 0 until the first agent reports a URL total.
    pub progress: f32,
    pub log: Vec<LogEntry>,
    pub leads: Vec<Lead>,
    pub total_urls: u32,
    pub processed_urls: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Running,
            progress: 0.0,
            log: Vec::new(),
            leads: Vec::new(),
            total_urls: 0,
            processed_urls: 0,
            started_at,
            ended_at: None,
        }
    }
}

// --- Search ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    /// The query that produced this hit.
    #[serde(default)]
    pub search_tag: String,
}

/// One cached result set per normalized query. Replaced whole on refresh,
/// never patched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCacheEntry {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub retrieved_at: DateTime<Utc>,
}

// --- Scraping ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStrategy {
    PrimaryFetch,
    DirectParse,
    SearchDiscovery,
}

impl std::fmt::Display for ScrapeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapeStrategy::PrimaryFetch => write!(f, "primary_fetch"),
            ScrapeStrategy::DirectParse => write!(f, "direct_parse"),
            ScrapeStrategy::SearchDiscovery => write!(f, "search_discovery"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// Per-strategy record of one scrape attempt. Feeds the job log today and
/// is the hook for strategy-selection telemetry later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeAttempt {
    pub strategy: ScrapeStrategy,
    pub outcome: AttemptOutcome,
    pub reason: String,
}

impl ScrapeAttempt {
    pub fn success(strategy: ScrapeStrategy, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            outcome: AttemptOutcome::Success,
            reason: reason.into(),
        }
    }

    pub fn failure(strategy: ScrapeStrategy, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            outcome: AttemptOutcome::Failure,
            reason: reason.into(),
        }
    }
}

/// Best-effort contact fields plus whatever page content the chain managed
/// to retrieve, with the ordered attempt trail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactExtraction {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub content: String,
    pub attempts: Vec<ScrapeAttempt>,
}

impl ContactExtraction {
    pub fn has_contacts(&self) -> bool {
        !self.emails.is_empty() || !self.phones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_criteria_detected() {
        let ok = Criteria::new("web design", "home services", "Austin");
        assert!(!ok.is_incomplete());

        let blank_location = Criteria::new("web design", "home services", "  ");
        assert!(blank_location.is_incomplete());
    }

    #[test]
    fn verdict_parses_case_insensitively() {
        assert_eq!("yes".parse::<Verdict>().unwrap(), Verdict::Yes);
        assert_eq!("Maybe".parse::<Verdict>().unwrap(), Verdict::Maybe);
        assert_eq!("NO".parse::<Verdict>().unwrap(), Verdict::No);
        assert!("perhaps".parse::<Verdict>().is_err());
    }

    #[test]
    fn job_status_terminality() {
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
