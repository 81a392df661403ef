use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateDecision {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct ValidateCertificateRequest {
    pub teacher_id: Uuid,
    pub decision: CertificateDecision,
}

#[derive(Debug, Deserialize)]
pub struct PendingCertificatesQuery {
    pub teacher_id: Uuid,
    pub course_id: Option<Uuid>,
}
