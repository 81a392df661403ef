use crate::error::{Error, Result};
use crate::models::course::{Course, GeneratedCourse};
use crate::models::enrollment::Enrollment;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct CourseService {
    pool: PgPool,
}

impl CourseService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a pipeline result as an unpublished, unapproved draft owned
    /// by the requesting teacher.
    pub async fn create_draft(
        &self,
        generated: &GeneratedCourse,
        teacher_id: Uuid,
    ) -> Result<Course> {
        let course = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (
                title, description, category_id, category_name, difficulty,
                duration_minutes, badge_on_complete, modules,
                is_published, is_approved, teacher_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, FALSE, $9)
            RETURNING *
            "#,
        )
        .bind(&generated.title)
        .bind(&generated.description)
        .bind(slugify(&generated.category_name))
        .bind(&generated.category_name)
        .bind(generated.difficulty.as_str())
        .bind(generated.estimated_duration_minutes)
        .bind(&generated.badge_on_complete)
        .bind(serde_json::to_value(&generated.modules)?)
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(course)
    }

    pub async fn get_course(&self, course_id: Uuid) -> Result<Course> {
        let course = sqlx::query_as::<_, Course>(r#"SELECT * FROM courses WHERE id = $1"#)
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(course)
    }

    pub async fn publish(&self, course_id: Uuid, teacher_id: Uuid) -> Result<Course> {
        let course = self.get_course(course_id).await?;
        if course.teacher_id != teacher_id {
            return Err(Error::Forbidden(
                "Only the owning teacher may publish this course".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, Course>(
            r#"UPDATE courses SET is_published = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *"#,
        )
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    pub async fn approve(&self, course_id: Uuid) -> Result<Course> {
        let updated = sqlx::query_as::<_, Course>(
            r#"UPDATE courses SET is_approved = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *"#,
        )
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    /// Courses visible to students: published and approved.
    pub async fn list_visible(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query_as::<_, Course>(
            r#"SELECT * FROM courses
               WHERE is_published = TRUE AND is_approved = TRUE
               ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        let course = self.get_course(course_id).await?;
        if !course.is_visible() {
            return Err(Error::BadRequest(
                "Course is not open for enrollment".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Enrollment>(
            r#"
            INSERT INTO enrollments (user_id, course_id, completed_chapter_ids)
            VALUES ($1, $2, '[]'::jsonb)
            ON CONFLICT (user_id, course_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;

        let enrollment = match inserted {
            Some(enrollment) => {
                sqlx::query(
                    r#"UPDATE courses SET enrollment_count = enrollment_count + 1, updated_at = NOW() WHERE id = $1"#,
                )
                .bind(course_id)
                .execute(&mut *tx)
                .await?;
                enrollment
            }
            None => {
                sqlx::query_as::<_, Enrollment>(
                    r#"SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2"#,
                )
                .bind(user_id)
                .bind(course_id)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        Ok(enrollment)
    }

    pub async fn complete_chapter(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        chapter_id: &str,
    ) -> Result<Enrollment> {
        let course = self.get_course(course_id).await?;
        let known_ids = course.all_chapter_ids()?;
        if !known_ids.iter().any(|id| id == chapter_id) {
            return Err(Error::NotFound(format!(
                "Chapter {} does not exist in this course",
                chapter_id
            )));
        }

        // Single-statement append so two concurrent completions can never
        // overwrite each other; the containment guard keeps it idempotent.
        let updated = sqlx::query_as::<_, Enrollment>(
            r#"
            UPDATE enrollments
            SET completed_chapter_ids = CASE
                    WHEN completed_chapter_ids @> $3 THEN completed_chapter_ids
                    ELSE completed_chapter_ids || $3
                END,
                updated_at = NOW()
            WHERE user_id = $1 AND course_id = $2
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(serde_json::json!([chapter_id]))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::BadRequest("Learner is not enrolled in this course".to_string()))?;
        Ok(updated)
    }
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect()
}
