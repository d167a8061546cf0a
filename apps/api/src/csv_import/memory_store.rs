use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::csv_import::models::CsvTalentRow;
use crate::csv_import::store::{
    duplicate_email_conflict, skill_slug, to_db_count, CreatedTalent, NewImportRun, TalentStore,
};
use crate::errors::AppError;
use crate::models::import_run::ImportRunRow;
use crate::models::talent::{SkillRow, TalentProfileRow};
use crate::models::user::UserRow;

#[derive(Default)]
struct Inner {
    users: Vec<UserRow>,
    emails: HashSet<String>,
    profiles: Vec<TalentProfileRow>,
    skills: HashMap<String, SkillRow>,
    profile_skills: HashSet<(Uuid, Uuid)>,
    runs: Vec<ImportRunRow>,
}

/// Process-local talent store used when no database is configured.
#[derive(Default)]
pub struct MemoryTalentStore {
    inner: RwLock<Inner>,
}

impl MemoryTalentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with bare user accounts for the given emails.
    pub fn with_existing_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let users: Vec<UserRow> = emails
            .into_iter()
            .map(|email| UserRow {
                id: Uuid::new_v4(),
                email: email.into().to_lowercase(),
                first_name: String::new(),
                last_name: String::new(),
                role: "talent".to_string(),
                created_at: Utc::now(),
            })
            .collect();
        Self {
            inner: RwLock::new(Inner {
                emails: users.iter().map(|u| u.email.clone()).collect(),
                users,
                ..Default::default()
            }),
        }
    }

    pub async fn users(&self) -> Vec<UserRow> {
        self.inner.read().await.users.clone()
    }

    pub async fn profiles(&self) -> Vec<TalentProfileRow> {
        self.inner.read().await.profiles.clone()
    }

    pub async fn skill_count(&self) -> usize {
        self.inner.read().await.skills.len()
    }
}

#[async_trait]
impl TalentStore for MemoryTalentStore {
    async fn existing_emails(&self, emails: &[String]) -> Result<HashSet<String>, AppError> {
        let inner = self.inner.read().await;
        Ok(emails
            .iter()
            .filter(|email| inner.emails.contains(*email))
            .cloned()
            .collect())
    }

    async fn create_talent(&self, talent: &CsvTalentRow) -> Result<CreatedTalent, AppError> {
        // Holding the write lock for the whole insert gives per-talent atomicity.
        let mut inner = self.inner.write().await;
        if !inner.emails.insert(talent.email.clone()) {
            return Err(duplicate_email_conflict(&talent.email));
        }

        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let profile_id = Uuid::new_v4();

        inner.users.push(UserRow {
            id: user_id,
            email: talent.email.clone(),
            first_name: talent.first_name.clone(),
            last_name: talent.last_name.clone(),
            role: "talent".to_string(),
            created_at: now,
        });
        inner.profiles.push(TalentProfileRow {
            id: profile_id,
            user_id,
            title: talent.title.clone(),
            bio: talent.bio.clone(),
            location: talent.location.clone(),
            phone: talent.phone.clone(),
            hourly_rate: talent.hourly_rate,
            currency: talent.currency.clone().unwrap_or_else(|| "USD".to_string()),
            languages: talent.languages.clone(),
            timezone: talent.timezone.clone(),
            created_at: now,
        });

        let mut skills_linked = 0;
        for name in &talent.skills {
            let slug = skill_slug(name);
            let skill_id = inner
                .skills
                .entry(slug.clone())
                .or_insert_with(|| SkillRow {
                    id: Uuid::new_v4(),
                    name: name.clone(),
                    slug,
                })
                .id;
            if inner.profile_skills.insert((profile_id, skill_id)) {
                skills_linked += 1;
            }
        }

        Ok(CreatedTalent {
            user_id,
            profile_id,
            skills_linked,
        })
    }

    async fn record_import_run(&self, run: &NewImportRun) -> Result<(), AppError> {
        self.inner.write().await.runs.push(ImportRunRow {
            request_id: run.request_id,
            total_rows: to_db_count(run.total_rows),
            successful_rows: to_db_count(run.successful_rows),
            failed_rows: to_db_count(run.failed_rows),
            duplicates_skipped: to_db_count(run.duplicates_skipped),
            skip_duplicate_emails: run.skip_duplicate_emails,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn recent_import_runs(&self, limit: usize) -> Result<Vec<ImportRunRow>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.runs.iter().rev().take(limit).cloned().collect())
    }
}
