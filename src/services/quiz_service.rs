use crate::error::{Error, GenerationError, Result};
use crate::models::course::Course;
use crate::models::enrollment::Enrollment;
use crate::models::outbox::{TASK_AWARD_BADGE, TASK_INCREMENT_COMPLETED, TASK_ISSUE_CERTIFICATE};
use crate::models::quiz::{AnswerSelection, GradedAnswer, QuizAttempt, QuizQuestion};
use crate::models::user::User;
use crate::services::outbox_service::OutboxService;
use crate::services::prompt_service::{PromptExecutor, QuizPromptInput};
use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Fixed pass threshold, percent of total marks.
pub const PASS_THRESHOLD_PERCENT: f64 = 70.0;
/// Cooldown after a failed submission before a fresh quiz may be generated.
pub const RETRY_COOLDOWN_HOURS: i64 = 24;

const QUIZ_QUESTION_COUNT: usize = 10;

#[derive(Clone)]
pub struct QuizService {
    pool: PgPool,
    executor: Arc<dyn PromptExecutor>,
}

impl QuizService {
    pub fn new(pool: PgPool, executor: Arc<dyn PromptExecutor>) -> Self {
        Self { pool, executor }
    }

    /// Generate a fresh final-quiz attempt for an enrolled learner who has
    /// completed every chapter. Returns the existing attempt (with the
    /// created flag false) while one is still live, generated but not yet
    /// submitted.
    pub async fn generate_attempt(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<(QuizAttempt, bool)> {
        let course = sqlx::query_as::<_, Course>(r#"SELECT * FROM courses WHERE id = $1"#)
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2"#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::BadRequest("Learner is not enrolled in this course".to_string()))?;

        let chapter_ids = course.all_chapter_ids()?;
        if !enrollment.has_completed_all(&chapter_ids) {
            return Err(Error::BadRequest(
                "All lessons must be completed before taking the final assessment".to_string(),
            ));
        }

        let now = Utc::now();
        let latest = sqlx::query_as::<_, QuizAttempt>(
            r#"SELECT * FROM quiz_attempts
               WHERE user_id = $1 AND course_id = $2
               ORDER BY created_at DESC
               LIMIT 1"#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(attempt) = latest {
            if attempt.passed == Some(true) {
                return Err(Error::BadRequest(
                    "Final assessment already passed for this course".to_string(),
                ));
            }
            if attempt.cooldown_active(now) {
                let allowed_at = attempt
                    .next_attempt_allowed_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                return Err(Error::BadRequest(format!(
                    "A failed attempt is still cooling down; next attempt allowed at {}",
                    allowed_at
                )));
            }
            if !attempt.is_submitted() {
                tracing::info!(attempt_id = %attempt.id, "Returning existing live quiz attempt");
                return Ok((attempt, false));
            }
        }

        let input = QuizPromptInput {
            course_id,
            course_title: course.title.clone(),
            num_questions: QUIZ_QUESTION_COUNT,
            cache_buster: format!("{}-{}", user_id, now.timestamp_millis()),
        };

        let output = match self.executor.generate_final_quiz(&input).await {
            Ok(output) => output,
            Err(Error::Generation(err)) => return Err(err.into()),
            Err(err) => return Err(GenerationError::from_upstream(&err.to_string()).into()),
        };

        let questions = sanitize_questions(output.questions);
        if questions.is_empty() {
            return Err(GenerationError::InvalidStructure(
                "quiz generation returned no usable questions".to_string(),
            )
            .into());
        }
        let total_marks: i32 = questions.iter().map(|q| q.marks).sum();

        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"
            INSERT INTO quiz_attempts (
                user_id, course_id, course_title, badge_on_complete,
                questions, total_marks, quiz_generated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(&course.title)
        .bind(&course.badge_on_complete)
        .bind(serde_json::to_value(&questions)?)
        .bind(total_marks)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            attempt_id = %attempt.id,
            course_id = %course_id,
            questions = questions.len(),
            "Final quiz attempt generated"
        );
        Ok((attempt, true))
    }

    pub async fn get_attempt(&self, attempt_id: Uuid, user_id: Uuid) -> Result<QuizAttempt> {
        let attempt =
            sqlx::query_as::<_, QuizAttempt>(r#"SELECT * FROM quiz_attempts WHERE id = $1"#)
                .bind(attempt_id)
                .fetch_one(&self.pool)
                .await?;
        if attempt.user_id != user_id {
            return Err(Error::Forbidden(
                "Attempt belongs to another learner".to_string(),
            ));
        }
        Ok(attempt)
    }

    /// Transition Generated-NotStarted -> InProgress. Stamping
    /// `attempted_at` is the only mutation; no new document is created.
    pub async fn start_attempt(&self, attempt_id: Uuid, user_id: Uuid) -> Result<QuizAttempt> {
        let attempt = self.get_attempt(attempt_id, user_id).await?;
        if attempt.is_submitted() {
            return Err(Error::BadRequest(
                "Attempt has already been submitted".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, QuizAttempt>(
            r#"
            UPDATE quiz_attempts
            SET attempted_at = COALESCE(attempted_at, NOW()), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    /// Score the submission and persist the outcome. When the learner
    /// passes, the certificate/badge/counter side effects are recorded as
    /// outbox tasks in the same transaction as the result row, so the
    /// user-visible outcome is never rolled back by bookkeeping failures.
    pub async fn submit_attempt(
        &self,
        attempt_id: Uuid,
        user_id: Uuid,
        answers: &[AnswerSelection],
    ) -> Result<(QuizAttempt, ScoredSubmission)> {
        let attempt = self.get_attempt(attempt_id, user_id).await?;
        if attempt.is_submitted() {
            return Err(Error::BadRequest(
                "Attempt has already been submitted".to_string(),
            ));
        }

        let questions = attempt.parsed_questions()?;
        let scored = score_submission(&questions, answers);

        let now = Utc::now();
        let next_attempt_allowed_at =
            (!scored.passed).then(|| now + Duration::hours(RETRY_COOLDOWN_HOURS));
        let percentage =
            Decimal::from_f64(scored.percentage).unwrap_or_else(|| Decimal::new(0, 0));

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, QuizAttempt>(
            r#"
            UPDATE quiz_attempts
            SET student_answers = $2, score = $3, percentage = $4, passed = $5,
                attempted_at = COALESCE(attempted_at, $6),
                submitted_at = $6, next_attempt_allowed_at = $7, updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(serde_json::to_value(&scored.graded)?)
        .bind(scored.score)
        .bind(percentage)
        .bind(scored.passed)
        .bind(now)
        .bind(next_attempt_allowed_at)
        .fetch_one(&mut *tx)
        .await?;

        if scored.passed {
            let user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE id = $1"#)
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

            OutboxService::enqueue(
                &mut *tx,
                TASK_ISSUE_CERTIFICATE,
                &serde_json::json!({
                    "user_id": user_id,
                    "student_name": user.name,
                    "course_id": updated.course_id,
                    "course_title": updated.course_title,
                    "final_score": scored.score,
                    "total_marks": scored.total_marks,
                    "issued_date": now.to_rfc3339(),
                }),
            )
            .await?;

            if let Some(badge_name) = &updated.badge_on_complete {
                OutboxService::enqueue(
                    &mut *tx,
                    TASK_AWARD_BADGE,
                    &serde_json::json!({
                        "user_id": user_id,
                        "course_id": updated.course_id,
                        "course_title": updated.course_title,
                        "badge_name": badge_name,
                        "awarded_date": now.to_rfc3339(),
                    }),
                )
                .await?;
            }

            OutboxService::enqueue(
                &mut *tx,
                TASK_INCREMENT_COMPLETED,
                &serde_json::json!({ "user_id": user_id }),
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            attempt_id = %attempt_id,
            score = scored.score,
            total = scored.total_marks,
            passed = scored.passed,
            "Quiz attempt submitted"
        );
        Ok((updated, scored))
    }
}

#[derive(Debug, Clone)]
pub struct ScoredSubmission {
    pub score: i32,
    pub total_marks: i32,
    pub percentage: f64,
    pub passed: bool,
    pub graded: Vec<GradedAnswer>,
}

/// Pure scoring: sum of marks over questions whose selected index equals
/// the correct index. Unanswered questions never match and score zero;
/// submission itself is never blocked here.
pub fn score_submission(
    questions: &[QuizQuestion],
    answers: &[AnswerSelection],
) -> ScoredSubmission {
    let mut score = 0;
    let mut total_marks = 0;
    let mut graded = Vec::with_capacity(questions.len());

    for question in questions {
        total_marks += question.marks;
        let selected = answers
            .iter()
            .find(|a| a.question_id == question.id)
            .and_then(|a| a.selected_index);
        let is_correct = selected == Some(question.correct_answer_index);
        let marks_earned = if is_correct { question.marks } else { 0 };
        score += marks_earned;

        graded.push(GradedAnswer {
            question_id: question.id,
            selected_index: selected,
            correct_answer_index: question.correct_answer_index,
            is_correct,
            marks_earned,
            max_marks: question.marks,
        });
    }

    let percentage = if total_marks > 0 {
        (score as f64 / total_marks as f64) * 100.0
    } else {
        0.0
    };

    ScoredSubmission {
        score,
        total_marks,
        percentage,
        passed: percentage >= PASS_THRESHOLD_PERCENT,
        graded,
    }
}

/// Clean up a generated question set: drop degenerate questions, shuffle
/// options with the correct index remapped, reassign sequential ids and
/// default the marks.
pub fn sanitize_questions(raw: Vec<QuizQuestion>) -> Vec<QuizQuestion> {
    let mut rng = rand::thread_rng();
    let mut questions = Vec::with_capacity(raw.len());

    for mut question in raw {
        if question.options.len() < 2 {
            continue;
        }
        if question.marks <= 0 {
            question.marks = 1;
        }
        if question.correct_answer_index < 0
            || question.correct_answer_index as usize >= question.options.len()
        {
            question.correct_answer_index = 0;
        }

        let correct_option = question.options[question.correct_answer_index as usize].clone();
        question.options.shuffle(&mut rng);
        question.correct_answer_index = question
            .options
            .iter()
            .position(|o| o == &correct_option)
            .unwrap_or(0) as i32;

        question.id = questions.len() as i32 + 1;
        questions.push(question);
    }

    questions
}
