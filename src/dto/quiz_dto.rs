use crate::models::quiz::{AnswerSelection, GradedAnswer, QuizAttempt, QuizQuestion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct GenerateQuizRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct StartAttemptRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AttemptOwnerQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub user_id: Uuid,
    pub answers: Vec<AnswerSelection>,
}

/// Question as shown to the learner: the correct index stays server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerQuestion {
    pub id: i32,
    pub question_text: String,
    pub options: Vec<String>,
    pub marks: i32,
}

impl From<QuizQuestion> for LearnerQuestion {
    fn from(q: QuizQuestion) -> Self {
        Self {
            id: q.id,
            question_text: q.question_text,
            options: q.options,
            marks: q.marks,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptView {
    pub id: Uuid,
    pub course_id: Uuid,
    pub course_title: String,
    pub total_marks: i32,
    pub quiz_generated_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<i32>,
    pub passed: Option<bool>,
    pub next_attempt_allowed_at: Option<DateTime<Utc>>,
    pub questions: Vec<LearnerQuestion>,
}

impl QuizAttemptView {
    pub fn from_attempt(attempt: QuizAttempt) -> crate::error::Result<Self> {
        let questions = attempt
            .parsed_questions()?
            .into_iter()
            .map(LearnerQuestion::from)
            .collect();
        Ok(Self {
            id: attempt.id,
            course_id: attempt.course_id,
            course_title: attempt.course_title,
            total_marks: attempt.total_marks,
            quiz_generated_at: attempt.quiz_generated_at,
            attempted_at: attempt.attempted_at,
            submitted_at: attempt.submitted_at,
            score: attempt.score,
            passed: attempt.passed,
            next_attempt_allowed_at: attempt.next_attempt_allowed_at,
            questions,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizResponse {
    pub attempt_id: Uuid,
    pub score: i32,
    pub total_marks: i32,
    pub percentage: f64,
    pub passed: bool,
    pub next_attempt_allowed_at: Option<DateTime<Utc>>,
    pub graded: Vec<GradedAnswer>,
}
