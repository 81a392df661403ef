use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    dto::certificate_dto::{
        CertificateDecision, PendingCertificatesQuery, ValidateCertificateRequest,
    },
    error::Result,
    AppState,
};

#[axum::debug_handler]
pub async fn list_pending_certificates(
    State(state): State<AppState>,
    Query(query): Query<PendingCertificatesQuery>,
) -> Result<impl IntoResponse> {
    let certificates = state
        .certificate_service
        .list_pending(query.teacher_id, query.course_id)
        .await?;
    Ok(Json(certificates))
}

#[axum::debug_handler]
pub async fn validate_certificate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ValidateCertificateRequest>,
) -> Result<impl IntoResponse> {
    let approve = payload.decision == CertificateDecision::Approve;
    let certificate = state
        .certificate_service
        .validate(id, payload.teacher_id, approve)
        .await?;
    Ok(Json(certificate))
}
