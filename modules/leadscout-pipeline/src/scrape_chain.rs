use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use leadscout_common::{ContactExtraction, ScrapeAttempt, ScrapeStrategy};

use crate::contacts::{extract_emails, extract_phones};
use crate::search_cache::SearchCache;
use crate::traits::PageFetcher;

/// Tie-break policy when more than one strategy could contribute contact
/// fields. Only first-success is implemented; the chain short-circuits on
/// the first strategy that yields any contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactMerge {
    #[default]
    FirstSuccess,
}

#[derive(Debug, Clone, Default)]
pub struct ChainConfig {
    pub contact_merge: ContactMerge,
}

/// Every strategy came up without page content. The attempt trail rides
/// along so the caller can log what was tried.
#[derive(Debug, Error)]
#[error("no content retrieved for {url}")]
pub struct ChainFailure {
    pub url: String,
    pub attempts: Vec<ScrapeAttempt>,
}

/// Ordered scrape strategies for one URL:
///
/// 1. rendered fetch, contact patterns over the raw DOM;
/// 2. plain GET re-parse, only when 1 failed or found no contacts;
/// 3. targeted contact-discovery searches through the cache resolver, only
///    when 1–2 found no contacts.
///
/// Contacts short-circuit the chain; page content is kept from whichever
/// step produced it first. Each attempted strategy is recorded with its
/// outcome either way.
pub struct ScrapeChain {
    fetcher: Arc<dyn PageFetcher>,
    search: Arc<SearchCache>,
    #[allow(dead_code)]
    config: ChainConfig,
}

/// How many discovery search results get pattern-extracted per query.
const DISCOVERY_RESULTS_PER_QUERY: usize = 3;

impl ScrapeChain {
    pub fn new(fetcher: Arc<dyn PageFetcher>, search: Arc<SearchCache>, config: ChainConfig) -> Self {
        Self {
            fetcher,
            search,
            config,
        }
    }

    pub async fn scrape(
        &self,
        url: &str,
        company_hint: &str,
    ) -> Result<ContactExtraction, ChainFailure> {
        let mut out = ContactExtraction::default();

        // 1. Primary rendered fetch.
        match self.fetcher.fetch(url).await {
            Ok(page) if !page.content.trim().is_empty() || !page.raw_html.trim().is_empty() => {
                out.content = page.content;
                out.emails = extract_emails(&page.raw_html);
                out.phones = extract_phones(&page.raw_html);
                if out.has_contacts() {
                    out.attempts.push(ScrapeAttempt::success(
                        ScrapeStrategy::PrimaryFetch,
                        format!(
                            "{} emails, {} phones from rendered page",
                            out.emails.len(),
                            out.phones.len()
                        ),
                    ));
                    info!(url, strategy = "primary_fetch", "Contacts found");
                    return Ok(out);
                }
                out.attempts.push(ScrapeAttempt::failure(
                    ScrapeStrategy::PrimaryFetch,
                    format!("{} bytes of content, no contact fields", out.content.len()),
                ));
            }
            Ok(_) => {
                out.attempts.push(ScrapeAttempt::failure(
                    ScrapeStrategy::PrimaryFetch,
                    "empty page".to_string(),
                ));
            }
            Err(e) => {
                warn!(url, error = %e, "Primary fetch failed");
                out.attempts
                    .push(ScrapeAttempt::failure(ScrapeStrategy::PrimaryFetch, e.to_string()));
            }
        }

        // 2. Direct parse of a plain GET.
        match self.fetcher.fetch_raw(url).await {
            Ok(html) if !html.trim().is_empty() => {
                out.emails = extract_emails(&html);
                out.phones = extract_phones(&html);
                if out.content.trim().is_empty() {
                    out.content = html;
                }
                if out.has_contacts() {
                    out.attempts.push(ScrapeAttempt::success(
                        ScrapeStrategy::DirectParse,
                        format!(
                            "{} emails, {} phones from raw markup",
                            out.emails.len(),
                            out.phones.len()
                        ),
                    ));
                    info!(url, strategy = "direct_parse", "Contacts found");
                    return Ok(out);
                }
                out.attempts.push(ScrapeAttempt::failure(
                    ScrapeStrategy::DirectParse,
                    "no contact fields in raw markup".to_string(),
                ));
            }
            Ok(_) => {
                out.attempts.push(ScrapeAttempt::failure(
                    ScrapeStrategy::DirectParse,
                    "empty response".to_string(),
                ));
            }
            Err(e) => {
                warn!(url, error = %e, "Direct parse fetch failed");
                out.attempts
                    .push(ScrapeAttempt::failure(ScrapeStrategy::DirectParse, e.to_string()));
            }
        }

        // 3. Search-based contact discovery.
        let snippets = self.discover_contacts(url, company_hint, &mut out).await;

        if out.has_contacts() {
            if out.content.trim().is_empty() {
                out.content = discovery_content(company_hint, &out, &snippets);
            }
            return Ok(out);
        }

        if out.content.trim().is_empty() {
            return Err(ChainFailure {
                url: url.to_string(),
                attempts: out.attempts,
            });
        }

        Ok(out)
    }

    /// Issue targeted queries through the cache resolver and pattern-extract
    /// the result snippets and URLs. Returns the snippets seen, so callers
    /// can fall back to them as page content.
    async fn discover_contacts(
        &self,
        url: &str,
        company_hint: &str,
        out: &mut ContactExtraction,
    ) -> Vec<String> {
        let host = host_of(url).unwrap_or_else(|| url.to_string());
        let queries = [
            format!("site:{host} \"contact\" OR \"email\" OR \"phone\""),
            format!("\"{company_hint}\" contact email"),
            format!("\"{company_hint}\" phone number"),
        ];

        let mut snippets = Vec::new();
        for query in &queries {
            match self.search.search_limited(query, DISCOVERY_RESULTS_PER_QUERY).await {
                Ok(resolution) => {
                    for hit in resolution.hits {
                        let haystack = format!("{} {}", hit.snippet, hit.url);
                        for email in extract_emails(&haystack) {
                            if !out.emails.iter().any(|e| e.eq_ignore_ascii_case(&email)) {
                                out.emails.push(email);
                            }
                        }
                        for phone in extract_phones(&haystack) {
                            if !out.phones.contains(&phone) {
                                out.phones.push(phone);
                            }
                        }
                        if !hit.snippet.trim().is_empty() {
                            snippets.push(hit.snippet);
                        }
                    }
                }
                Err(e) => {
                    warn!(url, query = query.as_str(), error = %e, "Contact discovery search failed");
                }
            }
        }

        if out.has_contacts() {
            out.attempts.push(ScrapeAttempt::success(
                ScrapeStrategy::SearchDiscovery,
                format!(
                    "{} emails, {} phones from search results",
                    out.emails.len(),
                    out.phones.len()
                ),
            ));
            info!(url, strategy = "search_discovery", "Contacts found");
        } else {
            out.attempts.push(ScrapeAttempt::failure(
                ScrapeStrategy::SearchDiscovery,
                "no contact fields in search results".to_string(),
            ));
        }

        snippets
    }
}

/// Synthesized stand-in content when discovery found contacts but no fetch
/// ever produced a page.
fn discovery_content(company_hint: &str, out: &ContactExtraction, snippets: &[String]) -> String {
    format!(
        "Company: {}\nEmails: {}\nPhones: {}\n{}",
        company_hint,
        out.emails.join(", "),
        out.phones.join(", "),
        snippets.join("\n")
    )
}

pub fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction() {
        assert_eq!(
            host_of("https://acmeplumbing.com/contact?x=1").as_deref(),
            Some("acmeplumbing.com")
        );
        assert_eq!(host_of("not a url"), None);
    }
}
