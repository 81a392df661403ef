use crate::models::course::{
    ContentBlock, GeneratedCourse, PENDING_VIDEO_SUGGESTION, SEARCH_PREFIX,
};
use crate::services::image_populator::MEDIA_CONCURRENCY;
use crate::services::prompt_service::{MediaPromptInput, PromptExecutor, VideoPromptOutput};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use url::Url;

type BlockPath = (usize, usize, usize);

#[derive(Clone)]
pub struct VideoPopulator {
    executor: Arc<dyn PromptExecutor>,
}

struct VideoResolution {
    value: String,
    alt_text: String,
}

impl VideoPopulator {
    pub fn new(executor: Arc<dyn PromptExecutor>) -> Self {
        Self { executor }
    }

    /// Resolve every pending video block. Same deep-copy, bounded fan-out
    /// and per-block isolation contract as the image populator; the
    /// always-satisfiable fallback is a `search:` query over the topic.
    pub async fn populate(&self, course: &GeneratedCourse) -> GeneratedCourse {
        let mut out = course.clone();
        let course_title = out.title.clone();

        let mut jobs: Vec<(BlockPath, MediaPromptInput)> = Vec::new();
        for (mi, module) in out.modules.iter().enumerate() {
            for (ci, chapter) in module.chapters.iter().enumerate() {
                for (bi, block) in chapter.content_blocks.iter().enumerate() {
                    if let ContentBlock::Video { value, topic, .. } = block {
                        if value == PENDING_VIDEO_SUGGESTION {
                            let topic = topic
                                .clone()
                                .filter(|t| !t.trim().is_empty())
                                .unwrap_or_else(|| format!("Video for {}", chapter.title));
                            jobs.push((
                                (mi, ci, bi),
                                MediaPromptInput {
                                    topic,
                                    chapter_title: chapter.title.clone(),
                                    course_title: course_title.clone(),
                                },
                            ));
                        }
                    }
                }
            }
        }

        if jobs.is_empty() {
            return out;
        }

        let resolutions: Vec<(BlockPath, VideoResolution)> = stream::iter(jobs)
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
            if let Some(ContentBlock::Video {
                value, alt_text, ..
            }) = block
            {
                *value = resolution.value;
                *alt_text = Some(resolution.alt_text);
            }
        }

        out
    }

    async fn resolve(&self, input: &MediaPromptInput) -> VideoResolution {
        match self.executor.suggest_chapter_video(input).await {
            Ok(VideoPromptOutput {
                video_url: Some(url),
                alt_text,
            }) => {
                let value = if url.starts_with(SEARCH_PREFIX) {
                    url
                } else {
                    to_embed_url(&url).unwrap_or(url)
                };
                VideoResolution {
                    value,
                    alt_text: alt_text
                        .unwrap_or_else(|| format!("Video about {}", input.topic)),
                }
            }
            Ok(_) => {
                tracing::warn!(
                    topic = %input.topic,
                    "Video suggestion returned no URL, falling back to search query"
                );
                fallback_resolution(input)
            }
            Err(err) => {
                tracing::error!(
                    topic = %input.topic,
                    error = %err,
                    "Video suggestion call failed, falling back to search query"
                );
                fallback_resolution(input)
            }
        }
    }
}

fn fallback_resolution(input: &MediaPromptInput) -> VideoResolution {
    VideoResolution {
        value: format!("{}{}", SEARCH_PREFIX, input.topic),
        alt_text: format!("Video about {}", input.topic),
    }
}

/// Rewrite `watch?v=` and short-link video URLs to the canonical
/// embeddable form. Returns `None` when no rewrite applies.
pub fn to_embed_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.");

    let video_id = match host {
        "youtu.be" => parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string),
        "youtube.com" | "m.youtube.com" => {
            if parsed.path() == "/watch" {
                parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, v)| v.into_owned())
            } else {
                None
            }
        }
        _ => None,
    };

    video_id
        .filter(|id| !id.is_empty())
        .map(|id| format!("https://www.youtube.com/embed/{}", id))
}
