use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Region, TrackedSubject};
use sqlx::PgPool;
use tracing::warn;

use super::SubjectStore;

#[derive(Debug, sqlx::FromRow)]
struct SubjectRow {
    region: String,
    subject_id: i64,
    display_name: String,
    next_check_at: DateTime<Utc>,
}

impl SubjectRow {
    fn into_subject(self) -> Option<TrackedSubject> {
        let region = Region::lookup(&self.region)?;
        Some(TrackedSubject {
            region,
            subject_id: u64::try_from(self.subject_id).ok()?,
            display_name: self.display_name,
            next_eligible_check_time: self.next_check_at,
        })
    }
}

/// Tracked subjects in the `tracked_subjects` table
#[derive(Clone)]
pub struct PgSubjectStore {
    pool: PgPool,
}

impl PgSubjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubjectStore for PgSubjectStore {
    async fn checkable_subjects(
        &self,
        regions: &[Region],
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrackedSubject>> {
        if regions.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let codes: Vec<String> = regions.iter().map(|r| r.code.to_string()).collect();

        let rows: Vec<SubjectRow> = sqlx::query_as(
            r#"
            SELECT region, subject_id, display_name, next_check_at
            FROM tracked_subjects
            WHERE next_check_at <= $1
            AND region = ANY($2)
            ORDER BY next_check_at ASC
            LIMIT $3
            "#
        )
        .bind::<DateTime<Utc>>(now)
        .bind::<Vec<String>>(codes)
        .bind::<i64>(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch checkable subjects")?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let label = format!("{}/{}", row.region, row.subject_id);
                let subject = row.into_subject();
                if subject.is_none() {
                    warn!("Ignoring malformed tracked subject {}", label);
                }
                subject
            })
            .collect())
    }

    async fn save(&self, subject: &TrackedSubject) -> Result<()> {
        let subject_id = i64::try_from(subject.subject_id).context("Subject id out of range")?;

        sqlx::query(
            r#"
            INSERT INTO tracked_subjects (region, subject_id, display_name, next_check_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (region, subject_id) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                next_check_at = EXCLUDED.next_check_at
            "#
        )
        .bind::<&str>(subject.region.code)
        .bind::<i64>(subject_id)
        .bind::<&str>(&subject.display_name)
        .bind::<DateTime<Utc>>(subject.next_eligible_check_time)
        .execute(&self.pool)
        .await
        .context("Failed to save tracked subject")?;

        Ok(())
    }

    async fn insert_if_absent(&self, subject: &TrackedSubject) -> Result<bool> {
        let subject_id = i64::try_from(subject.subject_id).context("Subject id out of range")?;

        let result = sqlx::query(
            r#"
            INSERT INTO tracked_subjects (region, subject_id, display_name, next_check_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (region, subject_id) DO NOTHING
            "#
        )
        .bind::<&str>(subject.region.code)
        .bind::<i64>(subject_id)
        .bind::<&str>(&subject.display_name)
        .bind::<DateTime<Utc>>(subject.next_eligible_check_time)
        .execute(&self.pool)
        .await
        .context("Failed to insert tracked subject")?;

        Ok(result.rows_affected() == 1)
    }
}
