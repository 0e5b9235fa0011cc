use std::sync::Arc;

use chrono::{Duration, Utc};

use leadscout_common::Lead;
use leadscout_store::StoreError;

use crate::traits::LeadStore;

/// Outcome of the per-URL freshness check.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A stored lead recent enough to reuse as-is. No fetch, no
    /// qualification.
    Fresh(Lead),
    /// Nothing stored, or what is stored has aged out of the window.
    Stale,
}

/// Decides, before any network work, whether a discovered URL needs
/// re-processing. This gate is the pipeline's main cost saver and runs for
/// every URL without exception.
pub struct Freshness {
    store: Arc<dyn LeadStore>,
    window: Duration,
}

impl Freshness {
    pub fn new(store: Arc<dyn LeadStore>, window_days: i64) -> Self {
        Self {
            store,
            window: Duration::days(window_days),
        }
    }

    /// Store unavailability propagates: with no readable store there is no
    /// way to record progress, so the caller fails the job.
    pub async fn resolve(&self, url: &str) -> Result<Resolution, StoreError> {
        match self.store.get_lead(url).await? {
            Some(lead) if Utc::now() - lead.last_updated < self.window => {
                Ok(Resolution::Fresh(lead))
            }
            _ => Ok(Resolution::Stale),
        }
    }
}

/// Lead keys are trimmed, lowercased URLs. Mirrors what the store holds.
pub fn canonical_url(url: &str) -> String {
    url.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_url_folds() {
        assert_eq!(canonical_url("  HTTPS://Acme.example/A  "), "https://acme.example/a");
    }
}
