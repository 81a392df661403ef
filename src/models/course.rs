use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Sentinel carried by an image block until the image populator resolves it.
pub const PENDING_IMAGE_GENERATION: &str = "PENDING_IMAGE_GENERATION";
/// Sentinel carried by a video block until the video populator resolves it.
pub const PENDING_VIDEO_SUGGESTION: &str = "PENDING_VIDEO_SUGGESTION";
/// Prefix for video values that are search queries rather than direct URLs.
pub const SEARCH_PREFIX: &str = "search:";

/// Stored course row. The nested module/chapter/block structure lives in
/// the `modules` JSONB column and deserializes into [`CourseModule`]s.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category_id: Option<String>,
    pub category_name: String,
    pub difficulty: String,
    pub duration_minutes: i32,
    pub badge_on_complete: Option<String>,
    pub modules: JsonValue,
    pub is_published: bool,
    pub is_approved: bool,
    pub teacher_id: Uuid,
    pub enrollment_count: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Course {
    /// A course is visible to students only when published and approved.
    pub fn is_visible(&self) -> bool {
        self.is_published && self.is_approved
    }

    pub fn parsed_modules(&self) -> crate::error::Result<Vec<CourseModule>> {
        Ok(serde_json::from_value(self.modules.clone())?)
    }

    /// Every chapter id in the course, in document order. Used to check
    /// lesson-completion preconditions before a final quiz is generated.
    pub fn all_chapter_ids(&self) -> crate::error::Result<Vec<String>> {
        let modules = self.parsed_modules()?;
        Ok(modules
            .iter()
            .flat_map(|m| m.chapters.iter().map(|c| c.id.clone()))
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Beginner
    }
}

/// In-memory course structure produced by the generation pipeline,
/// persisted as the `modules` JSONB plus the scalar course columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub estimated_duration_minutes: i32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub badge_on_complete: Option<String>,
    #[serde(default)]
    pub modules: Vec<CourseModule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    #[serde(default = "new_block_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    #[serde(default = "new_block_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub estimated_minutes: i32,
    #[serde(default)]
    pub content_blocks: Vec<ContentBlock>,
}

/// A single typed unit of chapter content. One variant per block type,
/// dispatched by exhaustive matching rather than runtime field checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    #[serde(rename_all = "camelCase")]
    Heading {
        #[serde(default = "new_block_id")]
        id: String,
        value: String,
        #[serde(default = "default_heading_level")]
        level: u8,
    },
    #[serde(rename_all = "camelCase")]
    Text {
        #[serde(default = "new_block_id")]
        id: String,
        /// HTML-formatted paragraph content.
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        #[serde(default = "new_block_id")]
        id: String,
        /// Image URI, or [`PENDING_IMAGE_GENERATION`] while unresolved.
        value: String,
        #[serde(default)]
        alt_text: Option<String>,
        /// 1-2 keyword hint for image categorization.
        #[serde(default)]
        data_ai_hint: Option<String>,
        /// Free-text description driving AI generation for this block.
        #[serde(default)]
        topic: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Video {
        #[serde(default = "new_block_id")]
        id: String,
        /// Embeddable video URL, a `search:` query, or
        /// [`PENDING_VIDEO_SUGGESTION`] while unresolved.
        value: String,
        #[serde(default)]
        alt_text: Option<String>,
        #[serde(default)]
        topic: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Link {
        #[serde(default = "new_block_id")]
        id: String,
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    File {
        #[serde(default = "new_block_id")]
        id: String,
        value: String,
    },
}

impl ContentBlock {
    pub fn is_pending_image(&self) -> bool {
        matches!(self, ContentBlock::Image { value, .. } if value == PENDING_IMAGE_GENERATION)
    }

    pub fn is_pending_video(&self) -> bool {
        matches!(self, ContentBlock::Video { value, .. } if value == PENDING_VIDEO_SUGGESTION)
    }
}

pub fn new_block_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_heading_level() -> u8 {
    2
}
