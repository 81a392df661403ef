use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const STATUS_PENDING_VALIDATION: &str = "pending_validation";
pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_REJECTED: &str = "rejected";

/// A teacher-validatable claim of course completion, created only when a
/// quiz attempt passes. Rejection is terminal: a new pass creates a fresh
/// pending record rather than reopening a rejected one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CertificateRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub student_name: String,
    pub course_id: Uuid,
    pub course_title: String,
    pub final_score: i32,
    pub total_marks: i32,
    pub status: String,
    pub issued_date: DateTime<Utc>,
    pub validated_by_teacher_id: Option<Uuid>,
    pub validation_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
