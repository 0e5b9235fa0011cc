// Contact pattern extraction. Pure functions over text, independent of how
// the text was fetched, so every rule here is unit-testable offline.

use regex::Regex;

const EMAIL_PATTERN: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";
const PHONE_PATTERN: &str =
    r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{2,4}\)?[-.\s]?\d{3,4}[-.\s]?\d{3,4}";
const MAILTO_PATTERN: &str = r#"(?i)href\s*=\s*["']mailto:([^"'?]+)"#;
const TEL_PATTERN: &str = r#"(?i)href\s*=\s*["']tel:([^"']+)"#;

/// All plausible email addresses in the text, `mailto:` links included.
/// Order of first appearance, deduplicated case-insensitively.
pub fn extract_emails(text: &str) -> Vec<String> {
    let email_re = Regex::new(EMAIL_PATTERN).expect("valid regex");
    let mailto_re = Regex::new(MAILTO_PATTERN).expect("valid regex");

    let mut seen = std::collections::HashSet::new();
    let mut emails = Vec::new();

    let mailto_candidates = mailto_re
        .captures_iter(text)
        .map(|cap| cap[1].trim().to_string());
    let body_candidates = email_re.find_iter(text).map(|m| m.as_str().to_string());

    for candidate in mailto_candidates.chain(body_candidates) {
        if !email_re.is_match(&candidate) {
            continue;
        }
        if seen.insert(candidate.to_lowercase()) {
            emails.push(candidate);
        }
    }

    emails
}

/// All plausible phone numbers in the text, `tel:` links included, each
/// validated and canonicalized to digits.
pub fn extract_phones(text: &str) -> Vec<String> {
    let phone_re = Regex::new(PHONE_PATTERN).expect("valid regex");
    let tel_re = Regex::new(TEL_PATTERN).expect("valid regex");

    let mut seen = std::collections::HashSet::new();
    let mut phones = Vec::new();

    let tel_candidates = tel_re.captures_iter(text).map(|cap| cap[1].to_string());
    let body_candidates = phone_re.find_iter(text).map(|m| m.as_str().to_string());

    for candidate in tel_candidates.chain(body_candidates) {
        if !is_valid_phone(&candidate) {
            continue;
        }
        let formatted = format_phone(&candidate);
        if seen.insert(formatted.clone()) {
            phones.push(formatted);
        }
    }

    phones
}

/// Strip a phone candidate to canonical digits. Bare 10-digit national
/// numbers get a leading country code 1.
pub fn format_phone(candidate: &str) -> String {
    let digits: String = candidate.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 && !candidate.trim_start().starts_with('+') {
        return format!("1{digits}");
    }
    digits
}

/// Plausibility check for phone candidates. The pattern above is
/// deliberately loose, so junk gets weeded out here: wrong length, long
/// repeated-digit runs, keyboard-walk test numbers, and 555-01xx fiction
/// numbers.
pub fn is_valid_phone(candidate: &str) -> bool {
    let formatted = format_phone(candidate);

    if !(7..=15).contains(&formatted.len()) {
        return false;
    }

    if has_repeated_run(&formatted, 5) {
        return false;
    }

    const TEST_SEQUENCES: &[&str] = &["1234567", "12345678", "123456789", "987654321"];
    if TEST_SEQUENCES.contains(&formatted.as_str()) {
        return false;
    }

    if formatted.starts_with("55501") {
        return false;
    }

    true
}

/// True if the string contains `run` or more identical consecutive chars.
fn has_repeated_run(s: &str, run: usize) -> bool {
    let mut count = 0;
    let mut prev = None;
    for c in s.chars() {
        if Some(c) == prev {
            count += 1;
            if count >= run {
                return true;
            }
        } else {
            prev = Some(c);
            count = 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_emails_from_body_and_mailto() {
        let html = r#"
            Reach us at <a href="mailto:info@acmeplumbing.com?subject=hi">email</a>
            or sales@acmeplumbing.com. Support: SALES@acmeplumbing.com
        "#;
        let emails = extract_emails(html);
        assert_eq!(emails, vec!["info@acmeplumbing.com", "sales@acmeplumbing.com"]);
    }

    #[test]
    fn extracts_phones_from_body_and_tel() {
        let html = r#"
            <a href="tel:+1-512-555-2671">Call</a> or (512) 777-3344.
        "#;
        let phones = extract_phones(html);
        assert!(phones.contains(&"15125552671".to_string()));
        assert!(phones.contains(&"15127773344".to_string()));
    }

    #[test]
    fn national_numbers_gain_country_code() {
        assert_eq!(format_phone("(512) 777-3344"), "15127773344");
        assert_eq!(format_phone("+44 20 7946 0958"), "442079460958");
    }

    #[test]
    fn junk_phones_rejected() {
        assert!(!is_valid_phone("123456"));
        assert!(!is_valid_phone("1234567"));
        assert!(!is_valid_phone("0000000000"));
        assert!(!is_valid_phone("555-0123"));
        assert!(is_valid_phone("(512) 777-3344"));
    }

    #[test]
    fn repeated_run_detection() {
        assert!(has_repeated_run("8888877", 5));
        assert!(!has_repeated_run("8888777", 5));
    }
}
