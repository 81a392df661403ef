use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

pub const TASK_ISSUE_CERTIFICATE: &str = "issue_certificate";
pub const TASK_AWARD_BADGE: &str = "award_badge";
pub const TASK_INCREMENT_COMPLETED: &str = "increment_completed_courses";
pub const TASK_NOTIFY_STUDENT: &str = "notify_student";

/// Durable record of a side effect to perform after a state change,
/// written in the same transaction as the change itself and processed
/// asynchronously with retry by the outbox worker.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutboxTask {
    pub id: Uuid,
    pub task_type: String,
    pub payload: JsonValue,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
