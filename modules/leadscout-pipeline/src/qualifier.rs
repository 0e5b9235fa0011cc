use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::LlmError;
use leadscout_common::{ContactExtraction, Criteria, Lead, Qualification, Verdict};

use crate::scrape_chain::host_of;
use crate::traits::LeadLlm;

/// What the model returns for one qualification call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QualifyResponse {
    /// Business name as stated on the page, if any.
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub qualified: Verdict,
    /// 0–10; out-of-range values are clamped, not rejected.
    pub lead_score: i32,
    pub reasoning: String,
    #[serde(default)]
    pub signals: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
}

const QUALIFY_SYSTEM_PROMPT: &str = "\
You are a sales analyst qualifying business leads. Given the page content of a \
candidate business, decide whether it is a potential lead for the offered \
service: does this business plausibly need the service, is it in the target \
industry, is it in or near the target location?

Scoring: 0-2 clearly irrelevant, 3-5 weak fit, 6-8 good fit, 9-10 strong fit \
with explicit demand signals. Record concrete positive signals and red flags \
from the content, not speculation.";

/// Attempts per qualification call; transient failures back off between
/// tries.
const MAX_ATTEMPTS: u32 = 3;

/// Content handed to the model is cut here, at a char boundary.
const CONTENT_LIMIT: usize = 4000;

/// Content kept on the lead record for preview.
const PREVIEW_LIMIT: usize = 500;

/// LLM-driven scoring with a local negative-keyword pre-filter and bounded
/// retry. The pre-filter is a cost cut only: when it does not match, the
/// outcome is exactly what the model path produces.
pub struct Qualifier {
    llm: Arc<dyn LeadLlm>,
    negative_keywords: Vec<String>,
}

impl Qualifier {
    pub fn new(llm: Arc<dyn LeadLlm>, negative_keywords: Vec<String>) -> Self {
        Self {
            llm,
            negative_keywords,
        }
    }

    pub async fn qualify(
        &self,
        criteria: &Criteria,
        url: &str,
        extraction: &ContactExtraction,
    ) -> Result<Lead, LlmError> {
        let content = &extraction.content;

        if let Some(keyword) = self.matched_negative(content) {
            info!(url, keyword = keyword.as_str(), "Negative keyword matched, skipping LLM");
            return Ok(self.disqualified(url, extraction, &keyword));
        }

        let user_prompt = build_prompt(criteria, content, extraction);
        let response = self.call_with_retry(&user_prompt, url).await?;

        Ok(self.build_lead(url, extraction, response))
    }

    fn matched_negative(&self, content: &str) -> Option<String> {
        let lowered = content.to_lowercase();
        self.negative_keywords
            .iter()
            .find(|k| lowered.contains(k.as_str()))
            .cloned()
    }

    async fn call_with_retry(
        &self,
        user_prompt: &str,
        url: &str,
    ) -> Result<QualifyResponse, LlmError> {
        let mut attempt = 0;
        loop {
            match self.llm.qualify(QUALIFY_SYSTEM_PROMPT, user_prompt).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt + 1 < MAX_ATTEMPTS => {
                    let backoff = Duration::from_secs(1 << attempt);
                    let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                    warn!(
                        url,
                        attempt = attempt + 1,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "Qualification call failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff + jitter).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn disqualified(&self, url: &str, extraction: &ContactExtraction, keyword: &str) -> Lead {
        Lead {
            url: url.to_string(),
            company_name: host_of(url).unwrap_or_else(|| "Unknown".to_string()),
            email: extraction.emails.first().cloned(),
            phone: extraction.phones.first().cloned(),
            qualification: Some(Qualification {
                verdict: Verdict::No,
                score: 0,
                reasoning: format!("Content matches negative keyword \"{keyword}\"."),
                signals: Vec::new(),
                red_flags: vec!["negative keywords present".to_string()],
            }),
            source: None,
            search_tag: None,
            content_preview: Some(preview(&extraction.content)),
            last_updated: Utc::now(),
        }
    }

    fn build_lead(&self, url: &str, extraction: &ContactExtraction, resp: QualifyResponse) -> Lead {
        let mut reasoning = resp.reasoning;

        let mut email = presence(resp.email);
        if email.is_none() {
            if let Some(fallback) = extraction.emails.first() {
                email = Some(fallback.clone());
                reasoning.push_str(" | Email added via fallback extraction.");
            }
        }

        let mut phone = presence(resp.phone);
        if phone.is_none() {
            if let Some(fallback) = extraction.phones.first() {
                phone = Some(fallback.clone());
                reasoning.push_str(" | Phone added via fallback extraction.");
            }
        }

        let company_name = presence(resp.company_name)
            .or_else(|| host_of(url))
            .unwrap_or_else(|| "Unknown".to_string());

        Lead {
            url: url.to_string(),
            company_name,
            email,
            phone,
            qualification: Some(Qualification {
                verdict: resp.qualified,
                score: resp.lead_score.clamp(0, 10) as u8,
                reasoning,
                signals: resp.signals,
                red_flags: resp.red_flags,
            }),
            source: None,
            search_tag: None,
            content_preview: Some(preview(&extraction.content)),
            last_updated: Utc::now(),
        }
    }
}

fn build_prompt(criteria: &Criteria, content: &str, extraction: &ContactExtraction) -> String {
    let contacts = if extraction.has_contacts() {
        format!(
            "\nContacts already extracted from the page:\nEmails: {}\nPhones: {}\n",
            extraction.emails.join(", "),
            extraction.phones.join(", ")
        )
    } else {
        String::new()
    };

    format!(
        "Service: {}\nIndustry: {}\nLocation: {}\n{contacts}\nPage content:\n{}",
        criteria.service,
        criteria.industry,
        criteria.location,
        truncate_at_boundary(content, CONTENT_LIMIT)
    )
}

/// Model fields that mean "nothing" in practice.
fn presence(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "N/A" && v != "None")
}

fn preview(content: &str) -> String {
    let cut = truncate_at_boundary(content, PREVIEW_LIMIT);
    cut.replace('\n', " ")
}

fn truncate_at_boundary(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        return s;
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_filters_placeholder_values() {
        assert_eq!(presence(Some("  ".into())), None);
        assert_eq!(presence(Some("N/A".into())), None);
        assert_eq!(presence(Some("None".into())), None);
        assert_eq!(presence(Some("a@b.co".into())), Some("a@b.co".into()));
        assert_eq!(presence(None), None);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "héllo wörld".repeat(600);
        let cut = truncate_at_boundary(&s, 4000);
        assert!(cut.len() <= 4000);
        assert!(s.is_char_boundary(cut.len()));
    }
}
