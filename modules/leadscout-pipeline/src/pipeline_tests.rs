// Chain tests - end-to-end with mocks.
//
// Each test follows MOCK → FUNCTION → OUTPUT: set up the fake external
// world, run the actual pipeline, assert what came out. No test reaches
// into a component and calls its internals.

use std::sync::Arc;

use chrono::Utc;

use leadscout_common::{config::DEFAULT_NEGATIVE_KEYWORDS, Criteria, JobStatus, SubmitError, Verdict};

use crate::orchestrator::{Orchestrator, PipelineDeps};
use crate::qualifier::Qualifier;
use crate::query_gen::QueryGenerator;
use crate::scrape_chain::{ChainConfig, ScrapeChain};
use crate::search_cache::{normalize_query, SearchCache};
use crate::freshness::Freshness;
use crate::testing::*;

const FRESH_DAYS: i64 = 14;

fn criteria() -> Criteria {
    Criteria::new("plumbing", "home services", "Austin")
}

fn negative_keywords() -> Vec<String> {
    DEFAULT_NEGATIVE_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

/// Wire the real pipeline over the four mocks.
fn rig(
    store: Arc<MemoryStore>,
    searcher: Arc<MockSearcher>,
    fetcher: Arc<MockFetcher>,
    llm: Arc<MockLlm>,
) -> Orchestrator {
    let search = Arc::new(SearchCache::new(store.clone(), searcher, FRESH_DAYS, 10));
    Orchestrator::new(PipelineDeps {
        store: store.clone(),
        query_gen: QueryGenerator::new(llm.clone()),
        search: search.clone(),
        chain: Arc::new(ScrapeChain::new(fetcher, search, ChainConfig::default())),
        qualifier: Arc::new(Qualifier::new(llm, negative_keywords())),
        freshness: Arc::new(Freshness::new(store, FRESH_DAYS)),
        url_workers: 4,
        min_search_results: 3,
    })
}

// ---------------------------------------------------------------------------
// Freshness short-circuit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_lead_skips_scrape_and_qualification() {
    let url = "https://acmeplumbing.example/";
    let store = Arc::new(MemoryStore::new());
    store.seed_lead(stored_lead(url, 2));

    let searcher = Arc::new(MockSearcher::new().any_query(vec![hit(url)]));
    let fetcher = Arc::new(MockFetcher::new());
    let llm = Arc::new(MockLlm::new());

    let orchestrator = rig(store.clone(), searcher, fetcher.clone(), llm.clone());
    let job_id = orchestrator
        .submit(criteria(), &["google".to_string()])
        .await
        .unwrap();
    orchestrator.await_job(job_id).await;

    let job = orchestrator.snapshot(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.leads.len(), 1);
    assert_eq!(job.leads[0].email.as_deref(), Some("old@stored.example"));

    // The whole point: no fetch, no LLM for a fresh URL.
    assert!(fetcher.fetch_calls().is_empty());
    assert_eq!(llm.qualify_calls(), 0);

    // Stored lead untouched.
    let stored = store.lead(url).unwrap();
    assert_eq!(stored.company_name, "Stored Co");
}

// ---------------------------------------------------------------------------
// Stale lead re-processing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_lead_is_rescraped_requalified_and_upserted() {
    let url = "https://acmeplumbing.example/";
    let store = Arc::new(MemoryStore::new());
    store.seed_lead(stored_lead(url, 30));

    let searcher = Arc::new(MockSearcher::new().any_query(vec![hit(url)]));
    let fetcher = Arc::new(MockFetcher::new().on_page(
        url,
        "Acme Plumbing: drain cleaning and pipe repair across Austin.",
        r#"<a href="mailto:info@acmeplumbing.example">Email us</a>"#,
    ));
    // Out-of-range score from the model gets clamped, not rejected.
    let llm = Arc::new(MockLlm::new().with_default_qualify(qualify_response(Verdict::Yes, 12)));

    let orchestrator = rig(store.clone(), searcher, fetcher, llm.clone());
    let job_id = orchestrator
        .submit(criteria(), &["google".to_string()])
        .await
        .unwrap();
    orchestrator.await_job(job_id).await;

    let job = orchestrator.snapshot(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.leads.len(), 1);
    assert_eq!(llm.qualify_calls(), 1);

    let stored = store.lead(url).unwrap();
    let q = stored.qualification.as_ref().unwrap();
    assert_eq!(q.verdict, Verdict::Yes);
    assert_eq!(q.score, 10, "score must be clamped into 0-10");
    assert_eq!(stored.email.as_deref(), Some("info@acmeplumbing.example"));
    assert_eq!(stored.source.as_deref(), Some("Google"));
    assert!(Utc::now() - stored.last_updated < chrono::Duration::minutes(1));
}

// ---------------------------------------------------------------------------
// Search cache windows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_cache_entry_triggers_live_search_and_refresh() {
    let store = Arc::new(MemoryStore::new());
    let searcher = Arc::new(MockSearcher::new().any_query(vec![hit("https://b.example/")]));
    let cache = SearchCache::new(store.clone(), searcher.clone(), FRESH_DAYS, 10);

    let key = normalize_query("Plumbing  Austin");
    store.seed_cache(leadscout_common::SearchCacheEntry {
        query: key.clone(),
        results: vec![hit("https://old.example/")],
        retrieved_at: Utc::now() - chrono::Duration::days(20),
    });

    // Stale entry: live search runs and replaces it.
    let first = cache.search("Plumbing  Austin").await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.hits[0].url, "https://b.example/");
    assert_eq!(searcher.call_count(), 1);

    let refreshed = store.cache_entry(&key).unwrap();
    assert_eq!(refreshed.results[0].url, "https://b.example/");
    assert!(Utc::now() - refreshed.retrieved_at < chrono::Duration::minutes(1));

    // Fresh now: second resolution never touches the live API.
    let second = cache.search("plumbing austin").await.unwrap();
    assert!(second.from_cache);
    assert_eq!(searcher.call_count(), 1);
}

// ---------------------------------------------------------------------------
// Scrape fallback chain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_fetch_falls_through_to_search_discovery() {
    let url = "https://acmeplumbing.example/";
    let store = Arc::new(MemoryStore::new());
    // Primary fetch and direct parse both fail (nothing registered); the
    // site-scoped discovery query finds an email in a snippet.
    let dork = "site:acmeplumbing.example \"contact\" OR \"email\" OR \"phone\"";
    let searcher = Arc::new(MockSearcher::new().on_query(
        dork,
        vec![hit_with_snippet(
            "https://acmeplumbing.example/contact",
            "Reach Acme at office@acmeplumbing.example today",
        )],
    ));
    let fetcher = Arc::new(MockFetcher::new());
    let search = Arc::new(SearchCache::new(store, searcher, FRESH_DAYS, 10));
    let chain = ScrapeChain::new(fetcher, search, ChainConfig::default());

    let extraction = chain.scrape(url, "home services").await.unwrap();

    assert_eq!(extraction.emails, vec!["office@acmeplumbing.example"]);
    assert_eq!(extraction.attempts.len(), 3);
    let successes = extraction
        .attempts
        .iter()
        .filter(|a| a.outcome == leadscout_common::AttemptOutcome::Success)
        .count();
    assert_eq!(successes, 1);
    assert!(!extraction.content.trim().is_empty());
}

#[tokio::test]
async fn chain_reports_hard_failure_when_nothing_yields_content() {
    let url = "https://ghost.example/";
    let store = Arc::new(MemoryStore::new());
    let searcher = Arc::new(MockSearcher::new());
    let fetcher = Arc::new(MockFetcher::new());
    let search = Arc::new(SearchCache::new(store, searcher, FRESH_DAYS, 10));
    let chain = ScrapeChain::new(fetcher, search, ChainConfig::default());

    let failure = chain.scrape(url, "home services").await.unwrap_err();
    assert_eq!(failure.attempts.len(), 3);
    assert!(failure
        .attempts
        .iter()
        .all(|a| a.outcome == leadscout_common::AttemptOutcome::Failure));
}

// ---------------------------------------------------------------------------
// Zero-result job with broadened retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_result_job_completes_after_broadened_retry() {
    let store = Arc::new(MemoryStore::new());
    let searcher = Arc::new(MockSearcher::new());
    let fetcher = Arc::new(MockFetcher::new());
    let llm = Arc::new(MockLlm::new());

    let orchestrator = rig(store, searcher.clone(), fetcher, llm);
    let job_id = orchestrator
        .submit(criteria(), &["google".to_string()])
        .await
        .unwrap();
    orchestrator.await_job(job_id).await;

    let job = orchestrator.snapshot(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.leads.is_empty());
    assert!(job
        .log
        .iter()
        .any(|entry| entry.message.contains("retrying with a broader query")));
    assert!(searcher.call_count() >= 1);
}

// ---------------------------------------------------------------------------
// Search quota failures are contained
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quota_exhaustion_yields_empty_agent_not_failed_job() {
    let store = Arc::new(MemoryStore::new());
    let searcher = Arc::new(MockSearcher::new().failing(MockSearchFailure::Quota));
    let fetcher = Arc::new(MockFetcher::new());
    let llm = Arc::new(MockLlm::new());

    let orchestrator = rig(store, searcher, fetcher, llm);
    let job_id = orchestrator
        .submit(criteria(), &["google".to_string()])
        .await
        .unwrap();
    orchestrator.await_job(job_id).await;

    let job = orchestrator.snapshot(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.leads.is_empty());
    assert!(job
        .log
        .iter()
        .any(|entry| entry.message.contains("quota")));
}

// ---------------------------------------------------------------------------
// Qualification retry and terminal skip
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn malformed_responses_retry_then_succeed() {
    let llm = Arc::new(
        MockLlm::new()
            .on_qualify(MockQualify::Malformed)
            .on_qualify(MockQualify::RateLimited)
            .on_qualify(MockQualify::Respond(qualify_response(Verdict::Maybe, 4))),
    );
    let qualifier = Qualifier::new(llm.clone(), negative_keywords());

    let extraction = leadscout_common::ContactExtraction {
        content: "Acme Plumbing, Austin. Pipe repair specialists.".to_string(),
        ..Default::default()
    };
    let lead = qualifier
        .qualify(&criteria(), "https://acmeplumbing.example/", &extraction)
        .await
        .unwrap();

    assert_eq!(llm.qualify_calls(), 3);
    assert_eq!(lead.qualification.unwrap().score, 4);
}

#[tokio::test(start_paused = true)]
async fn malformed_responses_exhaust_retries_and_fail_the_url() {
    let llm = Arc::new(
        MockLlm::new()
            .on_qualify(MockQualify::Malformed)
            .on_qualify(MockQualify::Malformed)
            .on_qualify(MockQualify::Malformed),
    );
    let qualifier = Qualifier::new(llm.clone(), negative_keywords());

    let extraction = leadscout_common::ContactExtraction {
        content: "Acme Plumbing, Austin.".to_string(),
        ..Default::default()
    };
    let err = qualifier
        .qualify(&criteria(), "https://acmeplumbing.example/", &extraction)
        .await
        .unwrap_err();

    assert_eq!(llm.qualify_calls(), 3);
    assert!(matches!(err, ai_client::LlmError::MalformedResponse(_)));
}

// ---------------------------------------------------------------------------
// Negative-keyword pre-filter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn negative_keywords_short_circuit_without_llm() {
    let llm = Arc::new(MockLlm::new());
    let qualifier = Qualifier::new(llm.clone(), negative_keywords());

    let extraction = leadscout_common::ContactExtraction {
        content: "Browse our careers page for openings".to_string(),
        ..Default::default()
    };

    for _ in 0..3 {
        let lead = qualifier
            .qualify(&criteria(), "https://jobs.example/", &extraction)
            .await
            .unwrap();
        let q = lead.qualification.unwrap();
        assert_eq!(q.verdict, Verdict::No);
        assert_eq!(q.score, 0);
        assert!(q.red_flags.contains(&"negative keywords present".to_string()));
    }

    assert_eq!(llm.qualify_calls(), 0);
}

// ---------------------------------------------------------------------------
// Concurrent agents, consistent snapshots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_agents_never_expose_torn_leads() {
    let urls = [
        "https://one.example/",
        "https://two.example/",
        "https://three.example/",
        "https://four.example/",
    ];
    let store = Arc::new(MemoryStore::new());
    let searcher = Arc::new(MockSearcher::new().any_query(urls.iter().map(|u| hit(u)).collect()));
    let mut fetcher = MockFetcher::new();
    for url in urls {
        fetcher = fetcher.on_page(
            url,
            "Locally owned plumbing outfit in Austin.",
            r#"<a href="mailto:hello@site.example">hi</a>"#,
        );
    }
    let fetcher = Arc::new(fetcher);
    let llm = Arc::new(MockLlm::new().with_default_qualify(qualify_response(Verdict::Yes, 8)));

    let orchestrator = rig(store, searcher, fetcher, llm);
    let job_id = orchestrator
        .submit(criteria(), &["google".to_string(), "facebook".to_string()])
        .await
        .unwrap();

    // Poll while the job runs: every observed snapshot must be internally
    // consistent, leads whole.
    loop {
        let job = orchestrator.snapshot(job_id).await.unwrap();
        for lead in &job.leads {
            assert!(!lead.url.is_empty());
            assert!(!lead.company_name.is_empty());
            let q = lead.qualification.as_ref().expect("lead emitted without qualification");
            assert!(q.score <= 10);
        }
        assert!(job.leads.len() as u32 <= job.processed_urls);
        if job.status.is_terminal() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    orchestrator.await_job(job_id).await;

    let job = orchestrator.snapshot(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    // Both agents emit a lead per URL (the second agent may reuse the
    // first's freshly stored record).
    assert_eq!(job.leads.len(), 8);
    assert_eq!(job.processed_urls, 8);
    assert_eq!(job.total_urls, 8);
    assert!((job.progress - 100.0).abs() < f32::EPSILON);
}

// ---------------------------------------------------------------------------
// Persistence outage fails the job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_outage_during_upsert_fails_the_job() {
    let url = "https://acmeplumbing.example/";
    let store = Arc::new(MemoryStore::failing_upserts());
    let searcher = Arc::new(MockSearcher::new().any_query(vec![hit(url)]));
    let fetcher = Arc::new(MockFetcher::new().on_page(
        url,
        "Acme Plumbing, Austin.",
        r#"<a href="mailto:info@acmeplumbing.example">Email</a>"#,
    ));
    let llm = Arc::new(MockLlm::new().with_default_qualify(qualify_response(Verdict::Yes, 7)));

    let orchestrator = rig(store, searcher, fetcher, llm);
    let job_id = orchestrator
        .submit(criteria(), &["google".to_string()])
        .await
        .unwrap();
    orchestrator.await_job(job_id).await;

    let job = orchestrator.snapshot(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .log
        .iter()
        .any(|entry| entry.message.contains("CRITICAL")));
}

// ---------------------------------------------------------------------------
// Submission validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submission_rejects_bad_input_before_spawning_anything() {
    let orchestrator = rig(
        Arc::new(MemoryStore::new()),
        Arc::new(MockSearcher::new()),
        Arc::new(MockFetcher::new()),
        Arc::new(MockLlm::new()),
    );

    let err = orchestrator.submit(criteria(), &[]).await.unwrap_err();
    assert!(matches!(err, SubmitError::NoAgents));

    let err = orchestrator
        .submit(criteria(), &["myspace".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::UnknownAgent(_)));

    let incomplete = Criteria::new("", "home services", "Austin");
    let err = orchestrator
        .submit(incomplete, &["google".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::IncompleteCriteria));
}
