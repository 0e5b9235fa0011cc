use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // AI provider
    pub anthropic_api_key: String,
    pub llm_model: String,

    // Search provider
    pub serper_api_key: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Freshness windows (days)
    pub lead_refresh_days: i64,
    pub cache_expiration_days: i64,

    // Search tuning
    pub max_search_results: usize,
    /// Below this many live results, one broadened retry is attempted.
    pub min_search_results: usize,

    // Per-agent URL worker cap
    pub url_workers: usize,

    // Qualification pre-filter
    pub negative_keywords: Vec<String>,
}

pub const DEFAULT_NEGATIVE_KEYWORDS: &[&str] = &["jobs", "careers", "learn", "tutorial", "course"];

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            serper_api_key: required_env("SERPER_API_KEY"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: parsed_env("WEB_PORT", 3000),
            lead_refresh_days: parsed_env("LEAD_REFRESH_DAYS", 14),
            cache_expiration_days: parsed_env("CACHE_EXPIRATION_DAYS", 14),
            max_search_results: parsed_env("MAX_SEARCH_RESULTS", 10),
            min_search_results: parsed_env("MIN_SEARCH_RESULTS", 3),
            url_workers: parsed_env("URL_WORKERS", 4),
            negative_keywords: env::var("NEGATIVE_KEYWORDS")
                .map(|v| {
                    v.split(',')
                        .map(|k| k.trim().to_lowercase())
                        .filter(|k| !k.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    DEFAULT_NEGATIVE_KEYWORDS
                        .iter()
                        .map(|k| k.to_string())
                        .collect()
                }),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
