use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateCourseRequest {
    #[validate(length(min = 3, max = 150))]
    pub course_title: String,
    #[validate(length(max = 200))]
    pub target_audience: Option<String>,
    /// Clamped to the system maximum of 10; values above are not an error.
    pub number_of_modules: Option<u8>,
    pub teacher_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PublishCourseRequest {
    pub teacher_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CompleteChapterRequest {
    pub user_id: Uuid,
}
