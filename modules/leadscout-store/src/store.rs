// Postgres persistence for leads and the search result cache.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use leadscout_common::{Lead, Qualification, SearchCacheEntry, SearchHit, Verdict};

use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// A row from the leads table. Qualification fields are flattened into
/// nullable columns; a NULL verdict means the lead was never qualified.
#[derive(Debug, Clone, sqlx::FromRow)]
struct LeadRow {
    url: String,
    company_name: String,
    email: Option<String>,
    phone: Option<String>,
    verdict: Option<String>,
    lead_score: Option<i16>,
    reasoning: Option<String>,
    signals: serde_json::Value,
    red_flags: serde_json::Value,
    source: Option<String>,
    search_tag: Option<String>,
    content_preview: Option<String>,
    last_updated: DateTime<Utc>,
}

impl LeadRow {
    fn into_lead(self) -> Result<Lead> {
        let qualification = match self.verdict.as_deref() {
            Some(v) => Some(Qualification {
                verdict: v
                    .parse::<Verdict>()
                    .map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))?,
                score: self.lead_score.unwrap_or(0).clamp(0, 10) as u8,
                reasoning: self.reasoning.unwrap_or_default(),
                signals: serde_json::from_value(self.signals)?,
                red_flags: serde_json::from_value(self.red_flags)?,
            }),
            None => None,
        };

        Ok(Lead {
            url: self.url,
            company_name: self.company_name,
            email: self.email,
            phone: self.phone,
            qualification,
            source: self.source,
            search_tag: self.search_tag,
            content_preview: self.content_preview,
            last_updated: self.last_updated,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct CacheRow {
    query: String,
    results: serde_json::Value,
    retrieved_at: DateTime<Utc>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        info!("Lead store connected and migrated");
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // --- Leads ---

    pub async fn get_lead(&self, url: &str) -> Result<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>("SELECT * FROM leads WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        row.map(LeadRow::into_lead).transpose()
    }

    /// Insert or overwrite the lead for its URL. Last writer wins.
    pub async fn upsert_lead(&self, lead: &Lead) -> Result<()> {
        let (verdict, score, reasoning, signals, red_flags) = match &lead.qualification {
            Some(q) => (
                Some(q.verdict.to_string()),
                Some(q.score as i16),
                Some(q.reasoning.clone()),
                serde_json::to_value(&q.signals)?,
                serde_json::to_value(&q.red_flags)?,
            ),
            None => (None, None, None, serde_json::json!([]), serde_json::json!([])),
        };

        sqlx::query(
            r#"
            INSERT INTO leads
                (url, company_name, email, phone, verdict, lead_score, reasoning,
                 signals, red_flags, source, search_tag, content_preview, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (url) DO UPDATE SET
                company_name = EXCLUDED.company_name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                verdict = EXCLUDED.verdict,
                lead_score = EXCLUDED.lead_score,
                reasoning = EXCLUDED.reasoning,
                signals = EXCLUDED.signals,
                red_flags = EXCLUDED.red_flags,
                source = EXCLUDED.source,
                search_tag = EXCLUDED.search_tag,
                content_preview = EXCLUDED.content_preview,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(&lead.url)
        .bind(&lead.company_name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&verdict)
        .bind(score)
        .bind(&reasoning)
        .bind(&signals)
        .bind(&red_flags)
        .bind(&lead.source)
        .bind(&lead.search_tag)
        .bind(&lead.content_preview)
        .bind(lead.last_updated)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_all_leads(&self) -> Result<Vec<Lead>> {
        let rows =
            sqlx::query_as::<_, LeadRow>("SELECT * FROM leads ORDER BY last_updated DESC")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(LeadRow::into_lead).collect()
    }

    // --- Search cache ---

    pub async fn get_cache_entry(&self, normalized_query: &str) -> Result<Option<SearchCacheEntry>> {
        let row = sqlx::query_as::<_, CacheRow>("SELECT * FROM search_cache WHERE query = $1")
            .bind(normalized_query)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let results: Vec<SearchHit> = serde_json::from_value(row.results)?;
                Ok(Some(SearchCacheEntry {
                    query: row.query,
                    results,
                    retrieved_at: row.retrieved_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Replace the cached result set for a query wholesale.
    pub async fn put_cache_entry(&self, entry: &SearchCacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO search_cache (query, results, retrieved_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (query) DO UPDATE SET
                results = EXCLUDED.results,
                retrieved_at = EXCLUDED.retrieved_at
            "#,
        )
        .bind(&entry.query)
        .bind(serde_json::to_value(&entry.results)?)
        .bind(entry.retrieved_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
