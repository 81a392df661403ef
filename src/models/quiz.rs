use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// One generated assessment instance tied to a single learner and course.
/// The question set is snapshotted into `questions` at generation time so
/// later edits to the course never affect an open attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub course_title: String,
    pub badge_on_complete: Option<String>,
    pub questions: JsonValue,
    pub total_marks: i32,
    pub quiz_generated_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub student_answers: Option<JsonValue>,
    pub score: Option<i32>,
    pub percentage: Option<rust_decimal::Decimal>,
    pub passed: Option<bool>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub next_attempt_allowed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl QuizAttempt {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    /// A failed attempt blocks regeneration until its cooldown elapses.
    pub fn cooldown_active(&self, now: DateTime<Utc>) -> bool {
        match (self.passed, self.next_attempt_allowed_at) {
            (Some(false), Some(allowed_at)) => now < allowed_at,
            _ => false,
        }
    }

    pub fn parsed_questions(&self) -> crate::error::Result<Vec<QuizQuestion>> {
        Ok(serde_json::from_value(self.questions.clone())?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    #[serde(default)]
    pub id: i32,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer_index: i32,
    #[serde(default = "default_marks")]
    pub marks: i32,
}

fn default_marks() -> i32 {
    1
}

/// A learner's selection for one question. `None` means unanswered and
/// never matches a correct index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSelection {
    pub question_id: i32,
    pub selected_index: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub question_id: i32,
    pub selected_index: Option<i32>,
    pub correct_answer_index: i32,
    pub is_correct: bool,
    pub marks_earned: i32,
    pub max_marks: i32,
}
