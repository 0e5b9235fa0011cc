use std::sync::Arc;

use tracing::warn;

use leadscout_common::Criteria;

use crate::agents::Agent;
use crate::traits::LeadLlm;

/// Builds search queries for agents: asks the model for a platform-tuned
/// query, sanitizes what comes back, and falls back to a deterministic
/// template when the model is unavailable or unusable. Query generation
/// never stalls an agent.
pub struct QueryGenerator {
    llm: Arc<dyn LeadLlm>,
}

impl QueryGenerator {
    pub fn new(llm: Arc<dyn LeadLlm>) -> Self {
        Self { llm }
    }

    pub async fn generate(&self, agent: Agent, criteria: &Criteria) -> String {
        match self.llm.write_query(&agent.query_instruction(criteria)).await {
            Ok(raw) => sanitize_query(&raw, criteria, agent.site_anchor()),
            Err(e) => {
                warn!(agent = %agent, error = %e, "Query generation failed, using template query");
                fallback_query(criteria, agent.site_anchor())
            }
        }
    }

    /// One broader variant of a query that came back thin. Returns the
    /// original query when the model has nothing better.
    pub async fn broaden(&self, original: &str, agent: Agent) -> String {
        let instruction = format!(
            "Original query: {original}\nPlatform: {agent}\n\
             The previous search query yielded insufficient results. Generate a broader \
             query that keeps business relevance but returns more results. \
             Output only the query."
        );
        match self.llm.write_query(&instruction).await {
            Ok(raw) => {
                let cleaned = strip_artifacts(&raw);
                if cleaned.is_empty() {
                    original.to_string()
                } else {
                    cleaned
                }
            }
            Err(e) => {
                warn!(agent = %agent, error = %e, "Broadened query generation failed, keeping original");
                original.to_string()
            }
        }
    }
}

/// Take the last non-empty line and strip the quoting/formatting the model
/// tends to wrap queries in.
fn strip_artifacts(raw: &str) -> String {
    let line = raw
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("```"))
        .unwrap_or("");

    line.trim_matches(|c| c == '`' || c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Clean a raw model answer into a usable search query. Too-short output,
/// or output missing any of the criteria terms, is replaced with the
/// deterministic template; a missing site anchor is appended.
pub fn sanitize_query(raw: &str, criteria: &Criteria, site_anchor: Option<&str>) -> String {
    let mut cleaned = strip_artifacts(raw);

    let lowered = cleaned.to_lowercase();
    let has_all_terms = [&criteria.service, &criteria.industry, &criteria.location]
        .iter()
        .all(|term| lowered.contains(&term.to_lowercase()));

    if cleaned.len() < 15 || !has_all_terms {
        cleaned = format!(
            "\"{}\" \"{}\" \"{}\"",
            criteria.industry, criteria.service, criteria.location
        );
    }

    if let Some(site) = site_anchor {
        let anchor = format!("site:{site}");
        if !cleaned.to_lowercase().contains(&anchor) {
            cleaned = format!("{cleaned} {anchor}");
        }
    }

    cleaned
}

/// The deterministic template used when the model never produced a query.
pub fn fallback_query(criteria: &Criteria, site_anchor: Option<&str>) -> String {
    let base = format!(
        "\"{}\" \"{}\" \"{}\"",
        criteria.industry, criteria.service, criteria.location
    );
    match site_anchor {
        Some(site) => format!("{base} site:{site}"),
        None => format!("{base} -site:gov -site:edu"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> Criteria {
        Criteria::new("web design", "plumbing", "Austin")
    }

    #[test]
    fn sanitize_keeps_good_query() {
        let raw = "\"plumbing\" \"web design\" \"Austin\" -site:gov";
        let q = sanitize_query(raw, &criteria(), None);
        assert_eq!(q, "\"plumbing\" \"web design\" \"Austin\" -site:gov");
    }

    #[test]
    fn sanitize_takes_last_line_and_strips_fences() {
        let raw = "Here is your query:\n```\n\"plumbing\" web design Austin contractors\n```";
        let q = sanitize_query(raw, &criteria(), None);
        assert_eq!(q, "\"plumbing\" web design Austin contractors");
    }

    #[test]
    fn sanitize_rebuilds_short_output() {
        let q = sanitize_query("ok", &criteria(), None);
        assert_eq!(q, "\"plumbing\" \"web design\" \"Austin\"");
    }

    #[test]
    fn sanitize_rebuilds_when_terms_missing() {
        let q = sanitize_query("best plumbers near me in Texas today", &criteria(), None);
        assert_eq!(q, "\"plumbing\" \"web design\" \"Austin\"");
    }

    #[test]
    fn sanitize_appends_missing_site_anchor() {
        let raw = "\"plumbing\" \"web design\" \"Austin\" pages";
        let q = sanitize_query(raw, &criteria(), Some("facebook.com"));
        assert!(q.ends_with("site:facebook.com"));

        let already = "\"plumbing\" \"web design\" \"Austin\" site:facebook.com";
        let q = sanitize_query(already, &criteria(), Some("facebook.com"));
        assert_eq!(q.matches("site:facebook.com").count(), 1);
    }

    #[test]
    fn fallback_query_shapes() {
        assert_eq!(
            fallback_query(&criteria(), None),
            "\"plumbing\" \"web design\" \"Austin\" -site:gov -site:edu"
        );
        assert_eq!(
            fallback_query(&criteria(), Some("x.com")),
            "\"plumbing\" \"web design\" \"Austin\" site:x.com"
        );
    }
}
