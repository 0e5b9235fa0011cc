// Test mocks for the pipeline, one per trait boundary:
// - MockSearcher (WebSearcher) - HashMap-based query→hits
// - MockFetcher (PageFetcher) - HashMap-based URL→page
// - MockLlm (LeadLlm) - scripted query/qualify responses
// - MemoryStore (LeadStore) - stateful in-memory store
//
// Plus helpers for building hits, leads and qualify responses. Everything
// runs with no network and no database.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use ai_client::LlmError;
use leadscout_common::{
    FetchError, Lead, Qualification, SearchCacheEntry, SearchError, SearchHit, Verdict,
};
use leadscout_store::StoreError;

use crate::qualifier::QualifyResponse;
use crate::traits::{FetchedPage, LeadLlm, LeadStore, PageFetcher, WebSearcher};

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum MockSearchFailure {
    Quota,
    Unavailable,
}

impl MockSearchFailure {
    fn to_error(self) -> SearchError {
        match self {
            MockSearchFailure::Quota => SearchError::QuotaExceeded,
            MockSearchFailure::Unavailable => {
                SearchError::Unavailable("mock outage".to_string())
            }
        }
    }
}

/// Query→hits searcher. Unregistered queries resolve to the default hit
/// set if one was given, otherwise to zero hits. Every live call is
/// recorded.
pub struct MockSearcher {
    responses: HashMap<String, Vec<SearchHit>>,
    default_hits: Option<Vec<SearchHit>>,
    fail_all: Option<MockSearchFailure>,
    calls: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            default_hits: None,
            fail_all: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_query(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.responses.insert(query.to_string(), hits);
        self
    }

    pub fn any_query(mut self, hits: Vec<SearchHit>) -> Self {
        self.default_hits = Some(hits);
        self
    }

    pub fn failing(mut self, failure: MockSearchFailure) -> Self {
        self.fail_all = Some(failure);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(
        &self,
        query: &str,
        _max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.calls.lock().unwrap().push(query.to_string());

        if let Some(failure) = self.fail_all {
            return Err(failure.to_error());
        }
        if let Some(hits) = self.responses.get(query) {
            return Ok(hits.clone());
        }
        Ok(self.default_hits.clone().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// URL→page fetcher. Returns `Err` for unregistered URLs, so a test that
/// forgot to register a page fails loudly instead of silently succeeding.
pub struct MockFetcher {
    pages: HashMap<String, FetchedPage>,
    raw_pages: HashMap<String, String>,
    fetch_calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            raw_pages: HashMap::new(),
            fetch_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_page(mut self, url: &str, content: &str, raw_html: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                content: content.to_string(),
                raw_html: raw_html.to_string(),
            },
        );
        self
    }

    pub fn on_raw(mut self, url: &str, html: &str) -> Self {
        self.raw_pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Every URL handed to either fetch path.
    pub fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.lock().unwrap().clone()
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.fetch_calls.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Failed(format!("no mock page registered for {url}")))
    }

    async fn fetch_raw(&self, url: &str) -> Result<String, FetchError> {
        self.fetch_calls.lock().unwrap().push(url.to_string());
        self.raw_pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Failed(format!("no mock raw page registered for {url}")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockLlm
// ---------------------------------------------------------------------------

pub enum MockQualify {
    Respond(QualifyResponse),
    Timeout,
    RateLimited,
    Malformed,
}

/// Scripted LLM. Query answers pop off a queue (an empty queue fails the
/// call, pushing callers onto their deterministic fallbacks); qualify
/// answers pop off their own script before falling back to the default
/// response, if any. Qualify invocations are counted.
pub struct MockLlm {
    query_script: Mutex<VecDeque<String>>,
    qualify_script: Mutex<VecDeque<MockQualify>>,
    qualify_default: Option<QualifyResponse>,
    qualify_calls: AtomicUsize,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            query_script: Mutex::new(VecDeque::new()),
            qualify_script: Mutex::new(VecDeque::new()),
            qualify_default: None,
            qualify_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query_script.lock().unwrap().push_back(query.to_string());
        self
    }

    pub fn on_qualify(mut self, step: MockQualify) -> Self {
        self.qualify_script.lock().unwrap().push_back(step);
        self
    }

    pub fn with_default_qualify(mut self, response: QualifyResponse) -> Self {
        self.qualify_default = Some(response);
        self
    }

    pub fn qualify_calls(&self) -> usize {
        self.qualify_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadLlm for MockLlm {
    async fn write_query(&self, _instruction: &str) -> Result<String, LlmError> {
        match self.query_script.lock().unwrap().pop_front() {
            Some(query) => Ok(query),
            None => Err(LlmError::Api {
                status: 503,
                message: "no scripted query".to_string(),
            }),
        }
    }

    async fn qualify(&self, _system: &str, _user: &str) -> Result<QualifyResponse, LlmError> {
        self.qualify_calls.fetch_add(1, Ordering::SeqCst);

        let step = self.qualify_script.lock().unwrap().pop_front();
        match step {
            Some(MockQualify::Respond(response)) => Ok(response),
            Some(MockQualify::Timeout) => Err(LlmError::Timeout),
            Some(MockQualify::RateLimited) => Err(LlmError::RateLimited),
            Some(MockQualify::Malformed) => {
                Err(LlmError::MalformedResponse("mock garbage".to_string()))
            }
            None => match &self.qualify_default {
                Some(response) => Ok(response.clone()),
                None => Err(LlmError::Api {
                    status: 503,
                    message: "no scripted qualify response".to_string(),
                }),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Stateful in-memory LeadStore with the same upsert semantics as the
/// Postgres store.
pub struct MemoryStore {
    leads: Mutex<HashMap<String, Lead>>,
    cache: Mutex<HashMap<String, SearchCacheEntry>>,
    fail_upserts: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            leads: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            fail_upserts: false,
        }
    }

    /// A store whose lead writes fail, for persistence-outage tests.
    pub fn failing_upserts() -> Self {
        Self {
            fail_upserts: true,
            ..Self::new()
        }
    }

    pub fn seed_lead(&self, lead: Lead) {
        self.leads.lock().unwrap().insert(lead.url.clone(), lead);
    }

    pub fn lead(&self, url: &str) -> Option<Lead> {
        self.leads.lock().unwrap().get(url).cloned()
    }

    pub fn lead_count(&self) -> usize {
        self.leads.lock().unwrap().len()
    }

    pub fn cache_entry(&self, normalized_query: &str) -> Option<SearchCacheEntry> {
        self.cache.lock().unwrap().get(normalized_query).cloned()
    }

    pub fn seed_cache(&self, entry: SearchCacheEntry) {
        self.cache.lock().unwrap().insert(entry.query.clone(), entry);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn get_lead(&self, url: &str) -> Result<Option<Lead>, StoreError> {
        Ok(self.leads.lock().unwrap().get(url).cloned())
    }

    async fn upsert_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        if self.fail_upserts {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.leads
            .lock()
            .unwrap()
            .insert(lead.url.clone(), lead.clone());
        Ok(())
    }

    async fn list_all_leads(&self) -> Result<Vec<Lead>, StoreError> {
        let mut leads: Vec<Lead> = self.leads.lock().unwrap().values().cloned().collect();
        leads.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(leads)
    }

    async fn get_cache_entry(
        &self,
        normalized_query: &str,
    ) -> Result<Option<SearchCacheEntry>, StoreError> {
        Ok(self.cache.lock().unwrap().get(normalized_query).cloned())
    }

    async fn put_cache_entry(&self, entry: &SearchCacheEntry) -> Result<(), StoreError> {
        self.cache
            .lock()
            .unwrap()
            .insert(entry.query.clone(), entry.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn hit(url: &str) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        snippet: String::new(),
        search_tag: String::new(),
    }
}

pub fn hit_with_snippet(url: &str, snippet: &str) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        snippet: snippet.to_string(),
        search_tag: String::new(),
    }
}

/// A stored lead aged `age_days` into the past.
pub fn stored_lead(url: &str, age_days: i64) -> Lead {
    Lead {
        url: url.to_string(),
        company_name: "Stored Co".to_string(),
        email: Some("old@stored.example".to_string()),
        phone: None,
        qualification: Some(Qualification {
            verdict: Verdict::Maybe,
            score: 5,
            reasoning: "previously qualified".to_string(),
            signals: vec![],
            red_flags: vec![],
        }),
        source: Some("Google".to_string()),
        search_tag: None,
        content_preview: None,
        last_updated: Utc::now() - Duration::days(age_days),
    }
}

pub fn qualify_response(verdict: Verdict, score: i32) -> QualifyResponse {
    QualifyResponse {
        company_name: Some("Acme Plumbing".to_string()),
        email: None,
        phone: None,
        qualified: verdict,
        lead_score: score,
        reasoning: "solid local business".to_string(),
        signals: vec!["established site".to_string()],
        red_flags: vec![],
    }
}
