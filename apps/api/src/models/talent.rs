use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TalentProfileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub bio: String,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub hourly_rate: Option<f64>,
    pub currency: String,
    pub languages: Vec<String>,
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SkillRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}
