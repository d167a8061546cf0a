use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::csv_import::models::CsvTalentRow;
use crate::csv_import::store::{
    duplicate_email_conflict, skill_slug, to_db_count, CreatedTalent, NewImportRun, TalentStore,
};
use crate::errors::AppError;
use crate::models::import_run::ImportRunRow;

const DEFAULT_CURRENCY: &str = "USD";

/// Postgres-backed talent store. Schema lives in `migrations/0001_talent_import.sql`.
#[derive(Clone)]
pub struct PgTalentStore {
    pool: PgPool,
}

impl PgTalentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TalentStore for PgTalentStore {
    async fn existing_emails(&self, emails: &[String]) -> Result<HashSet<String>, AppError> {
        if emails.is_empty() {
            return Ok(HashSet::new());
        }
        let found: Vec<String> = sqlx::query_scalar("SELECT email FROM users WHERE email = ANY($1)")
            .bind(emails)
            .fetch_all(&self.pool)
            .await?;
        Ok(found.into_iter().collect())
    }

    async fn create_talent(&self, talent: &CsvTalentRow) -> Result<CreatedTalent, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO users (email, first_name, last_name, role) VALUES ($1, $2, $3, 'talent') RETURNING id",
        )
        .bind(&talent.email)
        .bind(&talent.first_name)
        .bind(&talent.last_name)
        .fetch_one(&mut *tx)
        .await;

        let user_id = match inserted {
            Ok(id) => id,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(duplicate_email_conflict(&talent.email));
            }
            Err(e) => return Err(e.into()),
        };

        let profile_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO talent_profiles
                (user_id, title, bio, location, phone, hourly_rate, currency, languages, timezone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(&talent.title)
        .bind(&talent.bio)
        .bind(&talent.location)
        .bind(&talent.phone)
        .bind(talent.hourly_rate)
        .bind(talent.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))
        .bind(&talent.languages)
        .bind(&talent.timezone)
        .fetch_one(&mut *tx)
        .await?;

        let mut skills_linked = 0;
        for skill in &talent.skills {
            // Upsert keeps the first spelling of a skill name.
            let skill_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO skills (name, slug) VALUES ($1, $2)
                ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
                RETURNING id
                "#,
            )
            .bind(skill)
            .bind(skill_slug(skill))
            .fetch_one(&mut *tx)
            .await?;

            let linked = sqlx::query(
                "INSERT INTO talent_profile_skills (profile_id, skill_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(profile_id)
            .bind(skill_id)
            .execute(&mut *tx)
            .await?;
            skills_linked += linked.rows_affected() as usize;
        }

        tx.commit().await?;
        debug!("Created talent {user_id} (profile {profile_id}, {skills_linked} skills)");

        Ok(CreatedTalent {
            user_id,
            profile_id,
            skills_linked,
        })
    }

    async fn record_import_run(&self, run: &NewImportRun) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO csv_import_runs
                (request_id, total_rows, successful_rows, failed_rows,
                 duplicates_skipped, skip_duplicate_emails)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(run.request_id)
        .bind(to_db_count(run.total_rows))
        .bind(to_db_count(run.successful_rows))
        .bind(to_db_count(run.failed_rows))
        .bind(to_db_count(run.duplicates_skipped))
        .bind(run.skip_duplicate_emails)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_import_runs(&self, limit: usize) -> Result<Vec<ImportRunRow>, AppError> {
        Ok(sqlx::query_as::<_, ImportRunRow>(
            "SELECT * FROM csv_import_runs ORDER BY created_at DESC LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?)
    }
}
