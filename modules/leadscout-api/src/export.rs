// CSV rendering for the bulk lead download. The column set is fixed, so
// this stays a pair of small pure functions.

use leadscout_common::Lead;

const HEADER: &str = "url,company_name,email,phone,qualified,lead_score,reasoning,signals,red_flags,source,search_tag,content_preview,last_updated";

pub fn leads_to_csv(leads: &[Lead]) -> String {
    let mut out = String::with_capacity(leads.len() * 256);
    out.push_str(HEADER);
    out.push_str("\r\n");

    for lead in leads {
        let (qualified, score, reasoning, signals, red_flags) = match &lead.qualification {
            Some(q) => (
                q.verdict.to_string(),
                q.score.to_string(),
                q.reasoning.clone(),
                serde_json::to_string(&q.signals).unwrap_or_else(|_| "[]".to_string()),
                serde_json::to_string(&q.red_flags).unwrap_or_else(|_| "[]".to_string()),
            ),
            None => (
                String::new(),
                String::new(),
                String::new(),
                "[]".to_string(),
                "[]".to_string(),
            ),
        };

        let fields = [
            lead.url.as_str(),
            lead.company_name.as_str(),
            lead.email.as_deref().unwrap_or(""),
            lead.phone.as_deref().unwrap_or(""),
            qualified.as_str(),
            score.as_str(),
            reasoning.as_str(),
            signals.as_str(),
            red_flags.as_str(),
            lead.source.as_deref().unwrap_or(""),
            lead.search_tag.as_deref().unwrap_or(""),
            lead.content_preview.as_deref().unwrap_or(""),
        ];

        let mut row: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
        row.push(lead.last_updated.to_rfc3339());
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }

    out
}

/// RFC 4180 quoting: fields with commas, quotes or newlines get wrapped,
/// inner quotes doubled.
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leadscout_common::{Qualification, Verdict};

    fn lead() -> Lead {
        Lead {
            url: "https://acme.example/".to_string(),
            company_name: "Acme, Inc".to_string(),
            email: Some("info@acme.example".to_string()),
            phone: None,
            qualification: Some(Qualification {
                verdict: Verdict::Yes,
                score: 8,
                reasoning: "says \"call us\"\nand more".to_string(),
                signals: vec!["local".to_string()],
                red_flags: vec![],
            }),
            source: Some("Google".to_string()),
            search_tag: Some("\"plumbing\" austin".to_string()),
            content_preview: None,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn header_and_row_count() {
        let csv = leads_to_csv(&[lead()]);
        let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("url,company_name,"));
    }

    #[test]
    fn fields_with_commas_and_quotes_are_escaped() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");

        let csv = leads_to_csv(&[lead()]);
        assert!(csv.contains("\"Acme, Inc\""));
        assert!(csv.contains("\"says \"\"call us\"\"\nand more\""));
    }

    #[test]
    fn list_fields_are_json_encoded() {
        let csv = leads_to_csv(&[lead()]);
        assert!(csv.contains("\"[\"\"local\"\"]\""));
    }
}
