pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{FetchError, SearchError, SubmitError};
pub use types::{
    AttemptOutcome, ContactExtraction, Criteria, Job, JobStatus, Lead, LogEntry, Qualification,
    ScrapeAttempt, ScrapeStrategy, SearchCacheEntry, SearchHit, Verdict,
};
