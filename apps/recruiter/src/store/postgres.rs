use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CandidateStore, RetrievalFilter, StoreError};
use crate::criteria::SearchCriteria;
use crate::models::candidate::{Candidate, CandidateRow, NewCandidate};

/// `$1` opens the filter, `$2` switches from the hard families to the soft ones, `$8` is the
/// experience ceiling applied to every query. Ordering is fixed so identical queries see
/// identical pools.
const RETRIEVE_SQL: &str = r#"
    SELECT id, name, phone, email, tags, resume_path, created_at
    FROM candidates
    WHERE ($8::float8 IS NULL OR (tags->>'min_experience_years')::float8 <= $8)
      AND (
            $1
         OR EXISTS (
                SELECT 1
                FROM jsonb_array_elements_text(tags->'positions') AS p(value),
                     unnest($3::text[]) AS q(value)
                WHERE p.value ILIKE '%' || q.value || '%')
         OR (tags->'skills_normalized') ?| $4::text[]
         OR EXISTS (
                SELECT 1
                FROM unnest($5::text[]) AS q(value)
                WHERE tags->>'location' ILIKE '%' || q.value || '%')
         OR EXISTS (
                SELECT 1
                FROM jsonb_array_elements(tags->'certifications') AS c(value),
                     unnest($6::text[]) AS q(value)
                WHERE c.value->>'name' ILIKE '%' || q.value || '%')
         OR ($2 AND (
                (tags->>'min_experience_years')::float8 >= $7
             OR tags->>'degree' = ANY($9::text[])
             OR EXISTS (
                    SELECT 1
                    FROM jsonb_array_elements_text(tags->'companies') AS h(value),
                         unnest($10::text[]) AS q(value)
                    WHERE lower(regexp_replace(h.value, '\s', '', 'g')) LIKE '%' || q.value || '%')))
      )
    ORDER BY created_at, id
    LIMIT $11
"#;

/// Candidate store over the `candidates` table (tags in a JSONB column).
pub struct PgCandidateStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgCandidateStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout.as_secs()))?
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl CandidateStore for PgCandidateStore {
    async fn retrieve(
        &self,
        criteria: &SearchCriteria,
        pool_size: usize,
    ) -> Result<Vec<Candidate>, StoreError> {
        let filter = RetrievalFilter::from_criteria(criteria);
        let limit = i64::try_from(pool_size).unwrap_or(i64::MAX);

        let rows: Vec<CandidateRow> = self
            .bounded(
                sqlx::query_as::<_, CandidateRow>(RETRIEVE_SQL)
                    .bind(filter.is_open())
                    .bind(filter.soft_only())
                    .bind(&filter.positions)
                    .bind(&filter.skills)
                    .bind(&filter.locations)
                    .bind(&filter.cert_names)
                    .bind(filter.experience_min)
                    .bind(filter.experience_max)
                    .bind(&filter.degrees)
                    .bind(&filter.companies)
                    .bind(limit)
                    .fetch_all(&self.pool),
            )
            .await?;

        debug!(
            "Retrieved {} candidates (pool_size={pool_size}, open_filter={}, soft_only={})",
            rows.len(),
            filter.is_open(),
            filter.soft_only()
        );
        Ok(rows.into_iter().map(Candidate::from).collect())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Candidate>, StoreError> {
        let row: Option<CandidateRow> = self
            .bounded(
                sqlx::query_as::<_, CandidateRow>(
                    "SELECT id, name, phone, email, tags, resume_path, created_at \
                     FROM candidates WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(Candidate::from))
    }

    async fn upsert(&self, record: NewCandidate) -> Result<Uuid, StoreError> {
        let record = record.normalized().map_err(StoreError::InvalidRecord)?;
        let phone = record.phone.clone().unwrap_or_default();

        let id: Uuid = self
            .bounded(
                sqlx::query_scalar::<_, Uuid>(
                    r#"
                    INSERT INTO candidates (id, name, phone, email, tags, resume_path)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (name, phone) DO UPDATE
                    SET email = EXCLUDED.email,
                        tags = EXCLUDED.tags,
                        resume_path = EXCLUDED.resume_path,
                        updated_at = NOW()
                    RETURNING id
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&record.name)
                .bind(&phone)
                .bind(&record.email)
                .bind(Json(&record.tags))
                .bind(&record.resume_path)
                .fetch_one(&self.pool),
            )
            .await?;

        info!("Upserted candidate {id} ({})", record.name);
        Ok(id)
    }
}
