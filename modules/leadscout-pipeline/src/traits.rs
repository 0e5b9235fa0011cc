// Trait abstractions for the pipeline's collaborators.
//
// Each external dependency sits behind one object-safe trait: the lead
// store, the web search API, the page fetcher, and the LLM. Production
// implementations live in `scraper.rs` (fetch/search), `leadscout-store`
// (persistence), and `ai-client` (LLM). The mocks in `testing.rs` implement
// the same traits, so the whole pipeline runs in tests with no network and
// no database.

use async_trait::async_trait;

use ai_client::{Claude, LlmError};
use leadscout_common::{FetchError, Lead, SearchCacheEntry, SearchError, SearchHit};
use leadscout_store::{PgStore, StoreError};

use crate::qualifier::QualifyResponse;

// ---------------------------------------------------------------------------
// LeadStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn get_lead(&self, url: &str) -> Result<Option<Lead>, StoreError>;

    /// Insert or overwrite the lead keyed by its URL. Last writer wins.
    async fn upsert_lead(&self, lead: &Lead) -> Result<(), StoreError>;

    async fn list_all_leads(&self) -> Result<Vec<Lead>, StoreError>;

    async fn get_cache_entry(
        &self,
        normalized_query: &str,
    ) -> Result<Option<SearchCacheEntry>, StoreError>;

    /// Replace the cached result set for a normalized query wholesale.
    async fn put_cache_entry(&self, entry: &SearchCacheEntry) -> Result<(), StoreError>;
}

#[async_trait]
impl LeadStore for PgStore {
    async fn get_lead(&self, url: &str) -> Result<Option<Lead>, StoreError> {
        PgStore::get_lead(self, url).await
    }

    async fn upsert_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        PgStore::upsert_lead(self, lead).await
    }

    async fn list_all_leads(&self) -> Result<Vec<Lead>, StoreError> {
        PgStore::list_all_leads(self).await
    }

    async fn get_cache_entry(
        &self,
        normalized_query: &str,
    ) -> Result<Option<SearchCacheEntry>, StoreError> {
        PgStore::get_cache_entry(self, normalized_query).await
    }

    async fn put_cache_entry(&self, entry: &SearchCacheEntry) -> Result<(), StoreError> {
        PgStore::put_cache_entry(self, entry).await
    }
}

// ---------------------------------------------------------------------------
// WebSearcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Run a web search query. Quota and availability failures surface as
    /// typed errors; callers log them and carry on with zero URLs.
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchHit>, SearchError>;
}

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

/// What a rendered fetch returns: readable text content plus the raw markup
/// the contact patterns run over.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub content: String,
    pub raw_html: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Full render of a page: main content extracted to text, raw DOM kept.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// Plain GET with no rendering. Used by the direct-parse fallback.
    async fn fetch_raw(&self, url: &str) -> Result<String, FetchError>;

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// LeadLlm
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LeadLlm: Send + Sync {
    /// Ask the model to write a single search query for the given
    /// instruction. The caller sanitizes whatever comes back.
    async fn write_query(&self, instruction: &str) -> Result<String, LlmError>;

    /// Structured qualification call.
    async fn qualify(&self, system: &str, user: &str) -> Result<QualifyResponse, LlmError>;
}

const QUERY_WRITER_SYSTEM: &str =
    "You are a lead-generation researcher. Answer with a single search engine \
     query string and nothing else: no explanation, no quoting, no markdown.";

#[async_trait]
impl LeadLlm for Claude {
    async fn write_query(&self, instruction: &str) -> Result<String, LlmError> {
        self.chat_completion(QUERY_WRITER_SYSTEM, instruction, 0.4).await
    }

    async fn qualify(&self, system: &str, user: &str) -> Result<QualifyResponse, LlmError> {
        self.extract::<QualifyResponse>(system, user).await
    }
}
