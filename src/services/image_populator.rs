use crate::models::course::{ContentBlock, GeneratedCourse, PENDING_IMAGE_GENERATION};
use crate::services::prompt_service::{ImagePromptOutput, MediaPromptInput, PromptExecutor};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Upper bound on concurrent media-generation calls per course.
pub const MEDIA_CONCURRENCY: usize = 4;

pub const PLACEHOLDER_AI_ERROR: &str = "https://placehold.co/600x400.png?text=AI+Error";
pub const PLACEHOLDER_GEN_ERROR: &str = "https://placehold.co/600x400.png?text=Gen+Error";
const PLACEHOLDER_HOST: &str = "placehold.co";

const MAX_HINT_CHARS: usize = 50;

/// Position of a content block inside the course document.
type BlockPath = (usize, usize, usize);

#[derive(Clone)]
pub struct ImagePopulator {
    executor: Arc<dyn PromptExecutor>,
}

struct ImageResolution {
    value: String,
    alt_text: String,
    data_ai_hint: String,
}

impl ImagePopulator {
    pub fn new(executor: Arc<dyn PromptExecutor>) -> Self {
        Self { executor }
    }

    /// Resolve every pending image block. Returns a deep copy; the input
    /// structure is never mutated. Pending blocks fan out with bounded
    /// concurrency; each block's fallback stays isolated, so one failed
    /// generation never affects its neighbours or the stage as a whole.
    pub async fn populate(&self, course: &GeneratedCourse) -> GeneratedCourse {
        let mut out = course.clone();
        let course_title = out.title.clone();

        let mut jobs: Vec<(BlockPath, MediaPromptInput)> = Vec::new();
        for (mi, module) in out.modules.iter_mut().enumerate() {
            for (ci, chapter) in module.chapters.iter_mut().enumerate() {
                let chapter_title = chapter.title.clone();
                for (bi, block) in chapter.content_blocks.iter_mut().enumerate() {
                    if let ContentBlock::Image {
                        value,
                        alt_text,
                        data_ai_hint,
                        topic,
                        ..
                    } = block
                    {
                        if value == PENDING_IMAGE_GENERATION {
                            let topic = topic
                                .clone()
                                .filter(|t| !t.trim().is_empty())
                                .unwrap_or_else(|| format!("Image for {}", chapter_title));
                            jobs.push((
                                (mi, ci, bi),
                                MediaPromptInput {
                                    topic,
                                    chapter_title: chapter_title.clone(),
                                    course_title: course_title.clone(),
                                },
                            ));
                        } else if value.contains(PLACEHOLDER_HOST) {
                            // Already-placeheld blocks only get defaults filled in.
                            let fallback_topic = topic
                                .clone()
                                .filter(|t| !t.trim().is_empty())
                                .unwrap_or_else(|| chapter_title.clone());
                            if alt_text.is_none() {
                                *alt_text = Some(fallback_topic.clone());
                            }
                            if data_ai_hint.is_none() {
                                *data_ai_hint = Some(first_two_keywords(&fallback_topic));
                            }
                        }
                    }
                }
            }
        }

        if jobs.is_empty() {
            return out;
        }

        let resolutions: Vec<(BlockPath, ImageResolution)> = stream::iter(jobs)
            .map(|(path, input)| async move {
                let resolution = self.resolve(&input).await;
                (path, resolution)
            })
            .buffer_unordered(MEDIA_CONCURRENCY)
            .collect()
            .await;

        for ((mi, ci, bi), resolution) in resolutions {
            let block = out
                .modules
                .get_mut(mi)
                .and_then(|m| m.chapters.get_mut(ci))
                .and_then(|c| c.content_blocks.get_mut(bi));
            if let Some(ContentBlock::Image {
                value,
                alt_text,
                data_ai_hint,
                ..
            }) = block
            {
                *value = resolution.value;
                *alt_text = Some(resolution.alt_text);
                *data_ai_hint = Some(resolution.data_ai_hint);
            }
        }

        out
    }

    async fn resolve(&self, input: &MediaPromptInput) -> ImageResolution {
        match self.executor.generate_chapter_image(input).await {
            Ok(ImagePromptOutput {
                image_url: Some(url),
                alt_text: Some(alt),
                data_ai_hint: Some(hint),
            }) => ImageResolution {
                value: url,
                alt_text: alt,
                data_ai_hint: first_two_keywords(&hint),
            },
            Ok(_) => {
                tracing::warn!(
                    topic = %input.topic,
                    "Image generation returned no image or metadata, using placeholder"
                );
                fallback_resolution(input, PLACEHOLDER_AI_ERROR)
            }
            Err(err) => {
                tracing::error!(
                    topic = %input.topic,
                    error = %err,
                    "Image generation call failed, using placeholder"
                );
                fallback_resolution(input, PLACEHOLDER_GEN_ERROR)
            }
        }
    }
}

fn fallback_resolution(input: &MediaPromptInput, placeholder: &str) -> ImageResolution {
    ImageResolution {
        value: placeholder.to_string(),
        alt_text: input.topic.clone(),
        data_ai_hint: first_two_keywords(&input.topic),
    }
}

/// First two whitespace-separated tokens, capped at 50 characters.
pub fn first_two_keywords(text: &str) -> String {
    text.split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_HINT_CHARS)
        .collect()
}
