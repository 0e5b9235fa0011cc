use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use leadscout_common::{FetchError, SearchError, SearchHit};

use crate::traits::{FetchedPage, PageFetcher, WebSearcher};

// --- Chrome + Readability fetcher ---

/// Max concurrent Chromium processes. Each instance is heavy (~100MB+ RSS,
/// multiple child processes); small containers hit PID/memory limits fast.
const MAX_CONCURRENT_CHROME: usize = 2;

/// Max retry attempts for transient Chrome failures (e.g. "Cannot fork").
const CHROME_MAX_ATTEMPTS: u32 = 3;
/// Base backoff duration for Chrome retries. Actual delay is base * 3^attempt + jitter.
const CHROME_RETRY_BASE: Duration = Duration::from_secs(3);

/// Fetcher that uses headless Chromium `--dump-dom` for JS rendering, then
/// Readability extraction for clean main content. `fetch_raw` is a plain
/// GET with no rendering.
pub struct ChromeFetcher {
    semaphore: Semaphore,
    http: reqwest::Client,
}

impl ChromeFetcher {
    pub fn new() -> Self {
        info!("Using ChromeFetcher (dump-dom + Readability extraction, max_concurrent={MAX_CONCURRENT_CHROME})");
        Self {
            semaphore: Semaphore::new(MAX_CONCURRENT_CHROME),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Launch Chrome --dump-dom and return raw stdout bytes.
    /// Retries up to CHROME_MAX_ATTEMPTS on transient fork/launch failures
    /// with exponential backoff plus random jitter.
    async fn run_chrome(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed =
            url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(FetchError::InvalidUrl(format!(
                "only http/https URLs are allowed, got: {}",
                parsed.scheme()
            )));
        }

        let chrome_bin = std::env::var("CHROME_BIN").unwrap_or_else(|_| "chromium".to_string());

        for attempt in 0..CHROME_MAX_ATTEMPTS {
            let tmp_dir = tempfile::tempdir()
                .map_err(|e| FetchError::Failed(format!("temp profile dir: {e}")))?;

            let result = tokio::time::timeout(
                Duration::from_secs(30),
                tokio::process::Command::new(&chrome_bin)
                    .args([
                        "--headless",
                        "--no-sandbox",
                        "--disable-gpu",
                        "--disable-dev-shm-usage",
                        &format!("--user-data-dir={}", tmp_dir.path().display()),
                        "--dump-dom",
                        url,
                    ])
                    .output(),
            )
            .await;

            match result {
                Ok(Ok(output)) => {
                    if output.status.success() {
                        return Ok(output.stdout);
                    }
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    // Transient fork/resource exhaustion - retry
                    if (stderr.contains("Cannot fork")
                        || stderr.contains("Resource temporarily unavailable"))
                        && attempt + 1 < CHROME_MAX_ATTEMPTS
                    {
                        let backoff = CHROME_RETRY_BASE * 3u32.pow(attempt);
                        let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                        warn!(
                            url,
                            attempt = attempt + 1,
                            backoff_secs = backoff.as_secs(),
                            "Chrome cannot fork, retrying after backoff"
                        );
                        tokio::time::sleep(backoff + jitter).await;
                        continue;
                    }
                    return Err(FetchError::Failed(format!("Chrome exited with error: {stderr}")));
                }
                Ok(Err(e)) => {
                    let msg = e.to_string();
                    if (msg.contains("Cannot fork")
                        || msg.contains("Resource temporarily unavailable"))
                        && attempt + 1 < CHROME_MAX_ATTEMPTS
                    {
                        let backoff = CHROME_RETRY_BASE * 3u32.pow(attempt);
                        let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                        warn!(
                            url, attempt = attempt + 1, backoff_secs = backoff.as_secs(),
                            error = %e, "Chrome launch failed, retrying after backoff"
                        );
                        tokio::time::sleep(backoff + jitter).await;
                        continue;
                    }
                    return Err(FetchError::Failed(format!("failed to run Chrome: {e}")));
                }
                Err(_) => {
                    if attempt + 1 < CHROME_MAX_ATTEMPTS {
                        let backoff = CHROME_RETRY_BASE * 3u32.pow(attempt);
                        let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                        warn!(
                            url,
                            attempt = attempt + 1,
                            backoff_secs = backoff.as_secs(),
                            "Chrome timed out, retrying after backoff"
                        );
                        tokio::time::sleep(backoff + jitter).await;
                        continue;
                    }
                    return Err(FetchError::Timeout(url.to_string()));
                }
            }
        }

        Err(FetchError::Failed("Chrome produced no output".to_string()))
    }
}

impl Default for ChromeFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::Failed("Chrome semaphore closed".to_string()))?;

        info!(url, fetcher = "chrome", "Fetching URL");

        let html_bytes = self.run_chrome(url).await?;
        if html_bytes.is_empty() {
            warn!(url, fetcher = "chrome", "Empty DOM output");
            return Ok(FetchedPage::default());
        }

        let raw_html = String::from_utf8_lossy(&html_bytes).into_owned();

        let parsed_url = url::Url::parse(url).ok();
        let config = TransformConfig {
            readability: true,
            main_content: true,
            return_format: ReturnFormat::Markdown,
            filter_images: true,
            filter_svg: true,
            clean_html: true,
        };
        let input = TransformInput {
            url: parsed_url.as_ref(),
            content: raw_html.as_bytes(),
            screenshot_bytes: None,
            encoding: None,
            selector_config: None,
            ignore_tags: None,
        };

        let content = transform_content_input(input, &config);

        if content.trim().is_empty() {
            warn!(url, fetcher = "chrome", "Empty content after Readability extraction");
        } else {
            info!(url, fetcher = "chrome", bytes = content.len(), "Fetched successfully");
        }

        Ok(FetchedPage { content, raw_html })
    }

    async fn fetch_raw(&self, url: &str) -> Result<String, FetchError> {
        info!(url, fetcher = "http", "Fetching raw HTML");

        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Failed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(FetchError::Failed(format!(
                "HTTP {} for {url}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Failed(e.to_string()))?;

        info!(url, fetcher = "http", bytes = html.len(), "Raw HTML fetched");
        Ok(html)
    }

    fn name(&self) -> &str {
        "chrome"
    }
}

// --- Serper (Google Search) ---

pub struct SerperSearcher {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearcher {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        info!(query, max_results, "Serper search");

        let body = serde_json::json!({
            "q": query,
            "num": max_results,
        });

        let resp = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Unavailable(e.to_string()))?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => {
                return Err(SearchError::QuotaExceeded);
            }
            status if !status.is_success() => {
                return Err(SearchError::Unavailable(format!("HTTP {status}")));
            }
            _ => {}
        }

        let data: SerperResponse = resp
            .json()
            .await
            .map_err(|e| SearchError::Unavailable(format!("unparseable response: {e}")))?;

        let hits: Vec<SearchHit> = data
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .map(|r| SearchHit {
                url: r.link,
                snippet: r.snippet,
                search_tag: query.to_string(),
            })
            .collect();

        info!(query, count = hits.len(), "Serper search complete");
        Ok(hits)
    }
}
