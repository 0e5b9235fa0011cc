use thiserror::Error;

/// Failures from the web search collaborator. Quota exhaustion is its own
/// variant so callers can log it distinctly and keep the job alive.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search quota exceeded")]
    QuotaExceeded,

    #[error("search unavailable: {0}")]
    Unavailable(String),
}

/// Failures from the page fetch collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch timed out for {0}")]
    Timeout(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("fetch failed: {0}")]
    Failed(String),
}

/// Rejections at job submission. These fail the request immediately; no job
/// record is created.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no agents selected")]
    NoAgents,

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("criteria incomplete: service, industry and location are all required")]
    IncompleteCriteria,
}
