use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// At most one badge per (user, course), enforced by a unique constraint
/// in the schema rather than a check-then-act query.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BadgeAward {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub course_title: String,
    pub badge_name: String,
    pub awarded_date: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
}
