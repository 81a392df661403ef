use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    /// JSONB array of chapter ids the learner has completed.
    pub completed_chapter_ids: JsonValue,
    pub enrolled_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn completed_ids(&self) -> Vec<String> {
        serde_json::from_value(self.completed_chapter_ids.clone()).unwrap_or_default()
    }

    /// True once every chapter of the course has been completed.
    pub fn has_completed_all(&self, chapter_ids: &[String]) -> bool {
        let done: std::collections::HashSet<String> =
            self.completed_ids().into_iter().collect();
        chapter_ids.iter().all(|id| done.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment_with(completed: &[&str]) -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            completed_chapter_ids: serde_json::json!(completed),
            enrolled_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn completion_requires_every_chapter() {
        let enrollment = enrollment_with(&["c1", "c2"]);
        let all = vec!["c1".to_string(), "c2".to_string(), "c3".to_string()];
        assert!(!enrollment.has_completed_all(&all));

        let enrollment = enrollment_with(&["c3", "c1", "c2"]);
        assert!(enrollment.has_completed_all(&all));
    }

    #[test]
    fn empty_course_counts_as_complete() {
        let enrollment = enrollment_with(&[]);
        assert!(enrollment.has_completed_all(&[]));
    }
}
