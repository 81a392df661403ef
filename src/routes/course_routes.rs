use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::course_dto::{
        CompleteChapterRequest, EnrollRequest, GenerateCourseRequest, PublishCourseRequest,
    },
    error::Result,
    AppState,
};

#[axum::debug_handler]
pub async fn generate_course(
    State(state): State<AppState>,
    Json(payload): Json<GenerateCourseRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let generated = state
        .course_gen_service
        .generate_course(
            &payload.course_title,
            payload.target_audience.clone(),
            payload.number_of_modules,
        )
        .await?;
    let course = state
        .course_service
        .create_draft(&generated, payload.teacher_id)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

#[axum::debug_handler]
pub async fn publish_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PublishCourseRequest>,
) -> Result<impl IntoResponse> {
    let course = state.course_service.publish(id, payload.teacher_id).await?;
    Ok(Json(course))
}

#[axum::debug_handler]
pub async fn approve_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let course = state.course_service.approve(id).await?;
    Ok(Json(course))
}

#[axum::debug_handler]
pub async fn list_courses(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let courses = state.course_service.list_visible().await?;
    Ok(Json(courses))
}

#[axum::debug_handler]
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let course = state.course_service.get_course(id).await?;
    if !course.is_visible() {
        return Err(crate::error::Error::NotFound(
            "Course not available".to_string(),
        ));
    }
    Ok(Json(course))
}

#[axum::debug_handler]
pub async fn enroll(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EnrollRequest>,
) -> Result<impl IntoResponse> {
    let enrollment = state.course_service.enroll(payload.user_id, id).await?;
    Ok(Json(enrollment))
}

#[axum::debug_handler]
pub async fn complete_chapter(
    State(state): State<AppState>,
    Path((id, chapter_id)): Path<(Uuid, String)>,
    Json(payload): Json<CompleteChapterRequest>,
) -> Result<impl IntoResponse> {
    let enrollment = state
        .course_service
        .complete_chapter(payload.user_id, id, &chapter_id)
        .await?;
    Ok(Json(enrollment))
}
