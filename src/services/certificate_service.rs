use crate::error::{Error, Result};
use crate::models::certificate::{CertificateRecord, STATUS_PENDING_VALIDATION};
use crate::models::course::Course;
use crate::models::outbox::TASK_NOTIFY_STUDENT;
use crate::services::outbox_service::OutboxService;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct CertificateService {
    pool: PgPool,
}

impl CertificateService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_certificate(&self, certificate_id: Uuid) -> Result<CertificateRecord> {
        let cert =
            sqlx::query_as::<_, CertificateRecord>(r#"SELECT * FROM certificates WHERE id = $1"#)
                .bind(certificate_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(cert)
    }

    /// Certificates awaiting validation across the teacher's courses,
    /// optionally narrowed to one course.
    pub async fn list_pending(
        &self,
        teacher_id: Uuid,
        course_id: Option<Uuid>,
    ) -> Result<Vec<CertificateRecord>> {
        let rows = sqlx::query_as::<_, CertificateRecord>(
            r#"
            SELECT c.* FROM certificates c
            JOIN courses co ON c.course_id = co.id
            WHERE co.teacher_id = $1
              AND c.status = 'pending_validation'
              AND ($2::uuid IS NULL OR c.course_id = $2)
            ORDER BY c.issued_date ASC
            "#,
        )
        .bind(teacher_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// pending_validation -> approved | rejected, performed exclusively by
    /// the course's teacher. Approval stamps the validator and date and
    /// notifies the student; rejection is terminal for this record.
    pub async fn validate(
        &self,
        certificate_id: Uuid,
        teacher_id: Uuid,
        approve: bool,
    ) -> Result<CertificateRecord> {
        let cert = self.get_certificate(certificate_id).await?;

        let course = sqlx::query_as::<_, Course>(r#"SELECT * FROM courses WHERE id = $1"#)
            .bind(cert.course_id)
            .fetch_one(&self.pool)
            .await?;
        if course.teacher_id != teacher_id {
            return Err(Error::Forbidden(
                "Only the course's teacher may validate this certificate".to_string(),
            ));
        }
        if cert.status != STATUS_PENDING_VALIDATION {
            return Err(Error::BadRequest(format!(
                "Certificate is not pending validation (status: {})",
                cert.status
            )));
        }

        let mut tx = self.pool.begin().await?;

        let updated = if approve {
            let updated = sqlx::query_as::<_, CertificateRecord>(
                r#"
                UPDATE certificates
                SET status = 'approved', validated_by_teacher_id = $2,
                    validation_date = NOW(), updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(certificate_id)
            .bind(teacher_id)
            .fetch_one(&mut *tx)
            .await?;

            OutboxService::enqueue(
                &mut *tx,
                TASK_NOTIFY_STUDENT,
                &serde_json::json!({
                    "event": "certificate_approved",
                    "user_id": updated.user_id,
                    "course_id": updated.course_id,
                    "course_title": updated.course_title,
                    "certificate_id": updated.id,
                    "validated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
            updated
        } else {
            sqlx::query_as::<_, CertificateRecord>(
                r#"
                UPDATE certificates
                SET status = 'rejected', updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(certificate_id)
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;

        tracing::info!(
            certificate_id = %certificate_id,
            approved = approve,
            "Certificate validation recorded"
        );
        Ok(updated)
    }
}
