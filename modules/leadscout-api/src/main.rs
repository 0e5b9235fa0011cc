use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::Claude;
use leadscout_common::Config;
use leadscout_pipeline::freshness::Freshness;
use leadscout_pipeline::qualifier::Qualifier;
use leadscout_pipeline::query_gen::QueryGenerator;
use leadscout_pipeline::scrape_chain::{ChainConfig, ScrapeChain};
use leadscout_pipeline::scraper::{ChromeFetcher, SerperSearcher};
use leadscout_pipeline::search_cache::SearchCache;
use leadscout_pipeline::traits::{LeadLlm, LeadStore, PageFetcher, WebSearcher};
use leadscout_pipeline::{Orchestrator, PipelineDeps};
use leadscout_store::PgStore;

mod export;
mod rest;

pub struct AppState {
    pub orchestrator: Orchestrator,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("leadscout=info".parse()?))
        .init();

    info!("LeadScout API starting...");

    let config = Config::from_env();

    let store = PgStore::connect(&config.database_url).await?;
    let store: Arc<dyn LeadStore> = Arc::new(store);

    let llm: Arc<dyn LeadLlm> =
        Arc::new(Claude::new(&config.anthropic_api_key, &config.llm_model));
    let searcher: Arc<dyn WebSearcher> = Arc::new(SerperSearcher::new(&config.serper_api_key));
    let fetcher: Arc<dyn PageFetcher> = Arc::new(ChromeFetcher::new());

    let search = Arc::new(SearchCache::new(
        store.clone(),
        searcher,
        config.cache_expiration_days,
        config.max_search_results,
    ));

    let orchestrator = Orchestrator::new(PipelineDeps {
        store: store.clone(),
        query_gen: QueryGenerator::new(llm.clone()),
        search: search.clone(),
        chain: Arc::new(ScrapeChain::new(fetcher, search, ChainConfig::default())),
        qualifier: Arc::new(Qualifier::new(llm, config.negative_keywords.clone())),
        freshness: Arc::new(Freshness::new(store, config.lead_refresh_days)),
        url_workers: config.url_workers,
        min_search_results: config.min_search_results,
    });

    let state = Arc::new(AppState { orchestrator });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        .route("/scrape", post(rest::submit_job))
        .route("/status/{job_id}", get(rest::job_status))
        .route("/results/{job_id}", get(rest::job_results))
        .route("/export_csv", get(rest::export_csv))
        .with_state(state)
        // The frontend runs on a different origin.
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("LeadScout API listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
