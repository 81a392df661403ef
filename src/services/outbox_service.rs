use crate::error::Result;
use crate::models::outbox::{
    OutboxTask, TASK_AWARD_BADGE, TASK_INCREMENT_COMPLETED, TASK_ISSUE_CERTIFICATE,
    TASK_NOTIFY_STUDENT,
};
use crate::utils::time;
use reqwest::Client;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Processes durable side-effect tasks written alongside state changes.
/// One worker loop in main polls `run_once`; tasks retry with exponential
/// backoff and end up `failed` with the last error once exhausted.
#[derive(Clone)]
pub struct OutboxService {
    pool: PgPool,
    client: Client,
}

impl OutboxService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            client: Client::new(),
        }
    }

    /// Insert a task. Takes any executor so callers can enqueue inside the
    /// transaction that persists the triggering state change.
    pub async fn enqueue<'e, E>(executor: E, task_type: &str, payload: &JsonValue) -> Result<Uuid>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
            INSERT INTO outbox_tasks (task_type, payload, status)
            VALUES ($1, $2, 'pending')
            RETURNING id
            "#,
        )
        .bind(task_type)
        .bind(payload)
        .fetch_one(executor)
        .await?;
        let id: Uuid = row.try_get("id")?;
        Ok(id)
    }

    /// Claim and process at most one due task. Returns false when the
    /// queue is empty so the worker loop can back off.
    ///
    /// Claiming pushes `next_retry_at` out by a lease instead of flipping
    /// the status, so a worker that dies mid-task leaves the row pending
    /// and reclaimable once the lease expires.
    pub async fn run_once(&self) -> Result<bool> {
        let claimed = sqlx::query_as::<_, OutboxTask>(
            r#"
            UPDATE outbox_tasks
            SET next_retry_at = NOW() + INTERVAL '5 minutes', updated_at = NOW()
            WHERE id = (
                SELECT id FROM outbox_tasks
                WHERE status = 'pending'
                  AND (next_retry_at IS NULL OR next_retry_at <= NOW())
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(task) = claimed else { return Ok(false) };
        let task_id = task.id;

        match self.dispatch(&task).await {
            Ok(()) => {
                sqlx::query(
                    r#"UPDATE outbox_tasks SET status = 'succeeded', updated_at = NOW() WHERE id = $1"#,
                )
                .bind(task_id)
                .execute(&self.pool)
                .await?;
            }
            Err(err) => {
                let attempts = task.attempts + 1;
                tracing::error!(
                    task_id = %task_id,
                    task_type = %task.task_type,
                    attempts,
                    error = %err,
                    "Outbox task failed"
                );
                if attempts >= task.max_attempts {
                    sqlx::query(
                        r#"UPDATE outbox_tasks
                           SET status = 'failed', attempts = $2, last_error = $3, updated_at = NOW()
                           WHERE id = $1"#,
                    )
                    .bind(task_id)
                    .bind(attempts)
                    .bind(err.to_string())
                    .execute(&self.pool)
                    .await?;
                } else {
                    sqlx::query(
                        r#"UPDATE outbox_tasks
                           SET attempts = $2, last_error = $3,
                               next_retry_at = NOW() + make_interval(secs => LEAST(3600, 30 * power(2::float, GREATEST(0, $2 - 1))::int)),
                               updated_at = NOW()
                           WHERE id = $1"#,
                    )
                    .bind(task_id)
                    .bind(attempts)
                    .bind(err.to_string())
                    .execute(&self.pool)
                    .await?;
                }
            }
        }

        Ok(true)
    }

    async fn dispatch(&self, task: &OutboxTask) -> Result<()> {
        match task.task_type.as_str() {
            TASK_ISSUE_CERTIFICATE => self.issue_certificate(&task.payload).await,
            TASK_AWARD_BADGE => self.award_badge(&task.payload).await,
            TASK_INCREMENT_COMPLETED => self.increment_completed(&task.payload).await,
            TASK_NOTIFY_STUDENT => self.notify_student(&task.payload).await,
            other => Err(crate::error::Error::Internal(format!(
                "Unknown outbox task type: {}",
                other
            ))),
        }
    }

    async fn issue_certificate(&self, payload: &JsonValue) -> Result<()> {
        let user_id = get_uuid(payload, "user_id")?;
        let course_id = get_uuid(payload, "course_id")?;
        let student_name = get_str(payload, "student_name")?;
        let course_title = get_str(payload, "course_title")?;
        let final_score = get_i64(payload, "final_score")? as i32;
        let total_marks = get_i64(payload, "total_marks")? as i32;
        let issued_date = payload
            .get("issued_date")
            .and_then(time::parse_timestamp)
            .unwrap_or_else(time::now);

        sqlx::query(
            r#"
            INSERT INTO certificates (
                user_id, student_name, course_id, course_title,
                final_score, total_marks, status, issued_date
            ) VALUES ($1, $2, $3, $4, $5, $6, 'pending_validation', $7)
            "#,
        )
        .bind(user_id)
        .bind(student_name)
        .bind(course_id)
        .bind(course_title)
        .bind(final_score)
        .bind(total_marks)
        .bind(issued_date)
        .execute(&self.pool)
        .await?;

        tracing::info!(%user_id, %course_id, "Certificate issued, pending validation");
        Ok(())
    }

    /// Idempotent by the unique (user_id, course_id) constraint: a second
    /// award for the same pair is a silent no-op.
    async fn award_badge(&self, payload: &JsonValue) -> Result<()> {
        let user_id = get_uuid(payload, "user_id")?;
        let course_id = get_uuid(payload, "course_id")?;
        let course_title = get_str(payload, "course_title")?;
        let badge_name = get_str(payload, "badge_name")?;
        let awarded_date = payload
            .get("awarded_date")
            .and_then(time::parse_timestamp)
            .unwrap_or_else(time::now);

        let result = sqlx::query(
            r#"
            INSERT INTO badge_awards (user_id, course_id, course_title, badge_name, awarded_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, course_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(course_title)
        .bind(badge_name)
        .bind(awarded_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::info!(%user_id, %course_id, "Badge already awarded, skipping");
        }
        Ok(())
    }

    async fn increment_completed(&self, payload: &JsonValue) -> Result<()> {
        let user_id = get_uuid(payload, "user_id")?;
        sqlx::query(
            r#"UPDATE users SET completed_courses = completed_courses + 1, updated_at = NOW() WHERE id = $1"#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn notify_student(&self, payload: &JsonValue) -> Result<()> {
        let config = crate::config::get_config();
        let Some(target_url) = &config.notification_webhook_url else {
            tracing::warn!("No notification webhook configured, dropping notification");
            return Ok(());
        };

        let resp = self
            .client
            .post(target_url)
            .header("X-Webhook-Secret", &config.webhook_secret)
            .json(payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(crate::error::Error::Internal(format!(
                "Notification webhook returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

fn get_uuid(payload: &JsonValue, key: &str) -> Result<Uuid> {
    let raw = get_str(payload, key)?;
    Uuid::parse_str(&raw)
        .map_err(|e| crate::error::Error::Internal(format!("Invalid uuid in payload {}: {}", key, e)))
}

fn get_str(payload: &JsonValue, key: &str) -> Result<String> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            crate::error::Error::Internal(format!("Missing field in outbox payload: {}", key))
        })
}

fn get_i64(payload: &JsonValue, key: &str) -> Result<i64> {
    payload.get(key).and_then(|v| v.as_i64()).ok_or_else(|| {
        crate::error::Error::Internal(format!("Missing field in outbox payload: {}", key))
    })
}
