use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    dto::quiz_dto::{
        AttemptOwnerQuery, GenerateQuizRequest, QuizAttemptView, StartAttemptRequest,
        SubmitQuizRequest, SubmitQuizResponse,
    },
    error::Result,
    AppState,
};

#[axum::debug_handler]
pub async fn generate_final_quiz(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<GenerateQuizRequest>,
) -> Result<impl IntoResponse> {
    let (attempt, created) = state
        .quiz_service
        .generate_attempt(payload.user_id, course_id)
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(QuizAttemptView::from_attempt(attempt)?)))
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
    Query(query): Query<AttemptOwnerQuery>,
) -> Result<impl IntoResponse> {
    let attempt = state
        .quiz_service
        .get_attempt(attempt_id, query.user_id)
        .await?;
    Ok(Json(QuizAttemptView::from_attempt(attempt)?))
}

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse> {
    let attempt = state
        .quiz_service
        .start_attempt(attempt_id, payload.user_id)
        .await?;
    Ok(Json(QuizAttemptView::from_attempt(attempt)?))
}

#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse> {
    let (attempt, scored) = state
        .quiz_service
        .submit_attempt(attempt_id, payload.user_id, &payload.answers)
        .await?;
    Ok(Json(SubmitQuizResponse {
        attempt_id: attempt.id,
        score: scored.score,
        total_marks: scored.total_marks,
        percentage: scored.percentage,
        passed: scored.passed,
        next_attempt_allowed_at: attempt.next_attempt_allowed_at,
        graded: scored.graded,
    }))
}
