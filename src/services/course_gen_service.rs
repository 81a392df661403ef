use crate::error::{GenerationError, Result};
use crate::models::course::{
    ContentBlock, GeneratedCourse, PENDING_IMAGE_GENERATION, PENDING_VIDEO_SUGGESTION,
};
use crate::services::image_populator::ImagePopulator;
use crate::services::prompt_service::{CourseOutlinePromptInput, PromptExecutor};
use crate::services::video_populator::VideoPopulator;
use std::sync::Arc;

/// Hard ceiling on modules per generated course. Requests above it are
/// clamped before reaching the prompt service, not merely hinted at.
pub const MAX_MODULES: u8 = 10;
const DEFAULT_MODULES: u8 = 3;
const MAX_CATEGORY_CHARS: usize = 50;

#[derive(Clone)]
pub struct CourseGenService {
    executor: Arc<dyn PromptExecutor>,
    image_populator: ImagePopulator,
    video_populator: VideoPopulator,
}

impl CourseGenService {
    pub fn new(executor: Arc<dyn PromptExecutor>) -> Self {
        Self {
            image_populator: ImagePopulator::new(executor.clone()),
            video_populator: VideoPopulator::new(executor.clone()),
            executor,
        }
    }

    /// Stage 1: produce and validate the text skeleton of the course.
    pub async fn generate_structure(
        &self,
        course_title: &str,
        target_audience: Option<String>,
        number_of_modules: Option<u8>,
    ) -> Result<GeneratedCourse> {
        let input = CourseOutlinePromptInput {
            course_title: course_title.to_string(),
            target_audience,
            number_of_modules: clamp_module_count(number_of_modules),
        };

        let mut course = match self.executor.generate_course_outline(&input).await {
            Ok(course) => course,
            Err(crate::error::Error::Generation(err)) => return Err(err.into()),
            Err(err) => return Err(GenerationError::from_upstream(&err.to_string()).into()),
        };

        validate_and_repair(&mut course)?;
        tracing::info!(
            title = %course.title,
            modules = course.modules.len(),
            "Course structure generated"
        );
        Ok(course)
    }

    /// Full pipeline: text structure, then images, then videos. Stages run
    /// strictly in sequence; a structural failure in stage 1 aborts the
    /// pipeline, while per-block media failures in stages 2-3 degrade to
    /// placeholders and never abort.
    pub async fn generate_course(
        &self,
        course_title: &str,
        target_audience: Option<String>,
        number_of_modules: Option<u8>,
    ) -> Result<GeneratedCourse> {
        let structure = self
            .generate_structure(course_title, target_audience, number_of_modules)
            .await?;
        let with_images = self.image_populator.populate(&structure).await;
        let with_videos = self.video_populator.populate(&with_images).await;
        Ok(with_videos)
    }
}

pub fn clamp_module_count(requested: Option<u8>) -> u8 {
    let requested = requested.unwrap_or(DEFAULT_MODULES);
    if requested > MAX_MODULES {
        tracing::warn!(
            requested,
            max = MAX_MODULES,
            "Requested module count exceeds system maximum, clamping"
        );
        MAX_MODULES
    } else {
        requested.max(1)
    }
}

/// Post-generation validation. Structural defects fail the stage; sentinel
/// and topic deviations are repaired in place and never fail.
pub fn validate_and_repair(
    course: &mut GeneratedCourse,
) -> std::result::Result<(), GenerationError> {
    if course.modules.is_empty() {
        return Err(GenerationError::InvalidStructure(
            "generation returned no modules".to_string(),
        ));
    }

    if course.category_name.chars().count() > MAX_CATEGORY_CHARS {
        tracing::warn!(category = %course.category_name, "Category name too long, truncating");
        course.category_name = course
            .category_name
            .chars()
            .take(MAX_CATEGORY_CHARS)
            .collect();
    }

    for module in &mut course.modules {
        if module.chapters.is_empty() {
            return Err(GenerationError::InvalidStructure(format!(
                "module '{}' has no chapters",
                module.title
            )));
        }

        for chapter in &mut module.chapters {
            if chapter.content_blocks.is_empty() {
                return Err(GenerationError::InvalidStructure(format!(
                    "chapter '{}' has no content blocks",
                    chapter.title
                )));
            }

            let chapter_title = chapter.title.clone();
            for block in &mut chapter.content_blocks {
                match block {
                    ContentBlock::Image { value, topic, .. } => {
                        if value != PENDING_IMAGE_GENERATION {
                            tracing::warn!(chapter = %chapter_title, "Image block without pending sentinel, resetting");
                            *value = PENDING_IMAGE_GENERATION.to_string();
                        }
                        if topic.as_deref().map_or(true, |t| t.trim().is_empty()) {
                            *topic = Some(format!("Image for {}", chapter_title));
                        }
                    }
                    ContentBlock::Video { value, topic, .. } => {
                        if value != PENDING_VIDEO_SUGGESTION {
                            tracing::warn!(chapter = %chapter_title, "Video block without pending sentinel, resetting");
                            *value = PENDING_VIDEO_SUGGESTION.to_string();
                        }
                        if topic.as_deref().map_or(true, |t| t.trim().is_empty()) {
                            *topic = Some(format!("Video for {}", chapter_title));
                        }
                    }
                    ContentBlock::Heading { level, .. } => {
                        *level = (*level).clamp(1, 6);
                    }
                    ContentBlock::Text { .. }
                    | ContentBlock::Link { .. }
                    | ContentBlock::File { .. } => {}
                }
            }
        }
    }

    Ok(())
}
