use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use leadscout_common::{SearchCacheEntry, SearchError, SearchHit};

use crate::traits::{LeadStore, WebSearcher};

/// What a resolved search looked like, for the agent's log line.
#[derive(Debug, Clone)]
pub struct SearchResolution {
    pub hits: Vec<SearchHit>,
    pub from_cache: bool,
}

/// Wraps the search collaborator with a time-boxed result cache keyed by
/// normalized query. A hit inside the window never touches the live API;
/// anything else triggers a live search whose result replaces the entry
/// wholesale, empty result sets included.
pub struct SearchCache {
    store: Arc<dyn LeadStore>,
    searcher: Arc<dyn WebSearcher>,
    window: Duration,
    max_results: usize,
}

impl SearchCache {
    pub fn new(
        store: Arc<dyn LeadStore>,
        searcher: Arc<dyn WebSearcher>,
        window_days: i64,
        max_results: usize,
    ) -> Self {
        Self {
            store,
            searcher,
            window: Duration::days(window_days),
            max_results,
        }
    }

    pub async fn search(&self, query: &str) -> Result<SearchResolution, SearchError> {
        self.search_limited(query, self.max_results).await
    }

    /// Same resolution path with a caller-chosen result cap (contact
    /// discovery wants fewer).
    pub async fn search_limited(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<SearchResolution, SearchError> {
        let key = normalize_query(query);

        match self.store.get_cache_entry(&key).await {
            Ok(Some(entry)) if Utc::now() - entry.retrieved_at < self.window => {
                info!(query = key.as_str(), hits = entry.results.len(), "Search cache hit");
                return Ok(SearchResolution {
                    hits: entry.results,
                    from_cache: true,
                });
            }
            Ok(Some(_)) => info!(query = key.as_str(), "Search cache entry stale"),
            Ok(None) => {}
            Err(e) => {
                warn!(query = key.as_str(), error = %e, "Cache read failed, searching live");
            }
        }

        let mut hits = self.searcher.search(query, max_results).await?;
        for hit in &mut hits {
            if hit.search_tag.is_empty() {
                hit.search_tag = query.to_string();
            }
        }

        let entry = SearchCacheEntry {
            query: key.clone(),
            results: hits.clone(),
            retrieved_at: Utc::now(),
        };
        // A failed cache write costs a future API call, not this search.
        if let Err(e) = self.store.put_cache_entry(&entry).await {
            warn!(query = key.as_str(), error = %e, "Failed to store search cache entry");
        }

        info!(query = key.as_str(), hits = hits.len(), "Live search complete");
        Ok(SearchResolution {
            hits,
            from_cache: false,
        })
    }
}

/// Cache key: trimmed, lowercased, internal whitespace runs collapsed.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_and_whitespace() {
        assert_eq!(
            normalize_query("  \"Plumbing\"   Austin\tTX  "),
            "\"plumbing\" austin tx"
        );
        assert_eq!(normalize_query("a b"), normalize_query("A  \n B"));
    }
}
