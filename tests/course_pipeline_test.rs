use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use elearning_backend::error::{Error, GenerationError, Result};
use elearning_backend::models::course::{
    Chapter, ContentBlock, CourseModule, GeneratedCourse, PENDING_IMAGE_GENERATION,
    PENDING_VIDEO_SUGGESTION,
};
use elearning_backend::services::course_gen_service::CourseGenService;
use elearning_backend::services::image_populator::PLACEHOLDER_GEN_ERROR;
use elearning_backend::services::prompt_service::{
    CourseOutlinePromptInput, ImagePromptOutput, MediaPromptInput, PromptExecutor,
    QuizPromptInput, QuizPromptOutput, VideoPromptOutput,
};

fn outline_with_media(module_count: usize) -> GeneratedCourse {
    let modules = (0..module_count)
        .map(|i| CourseModule {
            id: format!("m{}", i),
            title: format!("Module {}", i + 1),
            description: "Covers one theme".into(),
            chapters: vec![Chapter {
                id: format!("m{}c0", i),
                title: format!("Chapter {}.1", i + 1),
                estimated_minutes: 20,
                content_blocks: vec![
                    ContentBlock::Heading {
                        id: format!("m{}h", i),
                        value: format!("Chapter {}.1", i + 1),
                        level: 2,
                    },
                    ContentBlock::Text {
                        id: format!("m{}t", i),
                        value: "<p>Body text.</p>".into(),
                    },
                    ContentBlock::Image {
                        id: format!("m{}i", i),
                        value: PENDING_IMAGE_GENERATION.into(),
                        alt_text: None,
                        data_ai_hint: None,
                        topic: Some("Diagram of the water cycle".into()),
                    },
                    ContentBlock::Video {
                        id: format!("m{}v", i),
                        value: PENDING_VIDEO_SUGGESTION.into(),
                        alt_text: None,
                        topic: Some("Water cycle explained".into()),
                    },
                ],
            }],
        })
        .collect();

    GeneratedCourse {
        title: "Earth Science Basics".into(),
        description: "An introductory course".into(),
        category_name: "Science".into(),
        estimated_duration_minutes: 120,
        difficulty: Default::default(),
        badge_on_complete: Some("Earth Explorer".into()),
        modules,
    }
}

/// Serves a fixed outline and either working or failing media lookups.
struct StubExecutor {
    media_fails: bool,
    outline_modules: usize,
    seen_module_counts: Mutex<Vec<u8>>,
}

impl StubExecutor {
    fn new(outline_modules: usize, media_fails: bool) -> Self {
        Self {
            media_fails,
            outline_modules,
            seen_module_counts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PromptExecutor for StubExecutor {
    async fn generate_course_outline(
        &self,
        input: &CourseOutlinePromptInput,
    ) -> Result<GeneratedCourse> {
        self.seen_module_counts
            .lock()
            .unwrap()
            .push(input.number_of_modules);
        Ok(outline_with_media(self.outline_modules))
    }

    async fn generate_chapter_image(&self, input: &MediaPromptInput) -> Result<ImagePromptOutput> {
        if self.media_fails {
            return Err(Error::Generation(GenerationError::Upstream(
                "image backend down".into(),
            )));
        }
        Ok(ImagePromptOutput {
            image_url: Some(format!("https://img.example.com/{}.png", input.topic.len())),
            alt_text: Some(format!("Illustration of {}", input.topic)),
            data_ai_hint: Some("water cycle".into()),
        })
    }

    async fn suggest_chapter_video(&self, _input: &MediaPromptInput) -> Result<VideoPromptOutput> {
        if self.media_fails {
            return Err(Error::Generation(GenerationError::Upstream(
                "video backend down".into(),
            )));
        }
        Ok(VideoPromptOutput {
            video_url: Some("https://www.youtube.com/watch?v=abc123xyz".into()),
            alt_text: Some("A short explainer".into()),
        })
    }

    async fn generate_final_quiz(&self, _input: &QuizPromptInput) -> Result<QuizPromptOutput> {
        Err(anyhow::anyhow!("not used in this test").into())
    }
}

fn all_blocks(course: &GeneratedCourse) -> Vec<&ContentBlock> {
    course
        .modules
        .iter()
        .flat_map(|m| m.chapters.iter())
        .flat_map(|c| c.content_blocks.iter())
        .collect()
}

#[tokio::test]
async fn pipeline_resolves_all_media_sentinels() {
    let executor = Arc::new(StubExecutor::new(2, false));
    let service = CourseGenService::new(executor.clone());

    let course = service
        .generate_course("Earth Science Basics", None, Some(2))
        .await
        .expect("pipeline");

    assert_eq!(course.modules.len(), 2);
    for block in all_blocks(&course) {
        assert!(!block.is_pending_image(), "unresolved image: {:?}", block);
        assert!(!block.is_pending_video(), "unresolved video: {:?}", block);
        match block {
            ContentBlock::Image {
                value,
                alt_text,
                data_ai_hint,
                ..
            } => {
                assert!(value.starts_with("https://img.example.com/"));
                assert!(alt_text.is_some());
                assert_eq!(data_ai_hint.as_deref(), Some("water cycle"));
            }
            ContentBlock::Video { value, .. } => {
                assert_eq!(value, "https://www.youtube.com/embed/abc123xyz");
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn media_failures_degrade_to_placeholders_not_errors() {
    let executor = Arc::new(StubExecutor::new(1, true));
    let service = CourseGenService::new(executor);

    let course = service
        .generate_course("Earth Science Basics", None, Some(1))
        .await
        .expect("media failures must not fail the pipeline");

    for block in all_blocks(&course) {
        match block {
            ContentBlock::Image { value, .. } => assert_eq!(value, PLACEHOLDER_GEN_ERROR),
            ContentBlock::Video { value, .. } => {
                assert_eq!(value, "search:Water cycle explained")
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn requested_module_count_is_clamped_to_maximum() {
    let executor = Arc::new(StubExecutor::new(3, false));
    let service = CourseGenService::new(executor.clone());

    service
        .generate_course("Big Course", None, Some(200))
        .await
        .expect("pipeline");

    let seen = executor.seen_module_counts.lock().unwrap();
    assert_eq!(seen.as_slice(), &[10]);
}

#[tokio::test]
async fn populated_course_is_stable_under_a_second_pass() {
    let executor = Arc::new(StubExecutor::new(1, false));
    let service = CourseGenService::new(executor.clone());

    let first = service
        .generate_course("Earth Science Basics", None, Some(1))
        .await
        .expect("pipeline");

    let image_populator =
        elearning_backend::services::image_populator::ImagePopulator::new(executor.clone());
    let video_populator =
        elearning_backend::services::video_populator::VideoPopulator::new(executor);

    let after_images = image_populator.populate(&first).await;
    let after_videos = video_populator.populate(&after_images).await;
    assert_eq!(after_videos, first);
}

/// Outline with no modules must be rejected before any media work starts.
struct EmptyOutlineExecutor;

#[async_trait]
impl PromptExecutor for EmptyOutlineExecutor {
    async fn generate_course_outline(
        &self,
        _input: &CourseOutlinePromptInput,
    ) -> Result<GeneratedCourse> {
        Ok(GeneratedCourse {
            title: "Empty".into(),
            description: String::new(),
            category_name: String::new(),
            estimated_duration_minutes: 0,
            difficulty: Default::default(),
            badge_on_complete: None,
            modules: vec![],
        })
    }

    async fn generate_chapter_image(&self, _input: &MediaPromptInput) -> Result<ImagePromptOutput> {
        panic!("media stage must not run for an invalid outline")
    }

    async fn suggest_chapter_video(&self, _input: &MediaPromptInput) -> Result<VideoPromptOutput> {
        panic!("media stage must not run for an invalid outline")
    }

    async fn generate_final_quiz(&self, _input: &QuizPromptInput) -> Result<QuizPromptOutput> {
        Err(anyhow::anyhow!("not used in this test").into())
    }
}

#[tokio::test]
async fn empty_outline_is_an_invalid_structure_error() {
    let service = CourseGenService::new(Arc::new(EmptyOutlineExecutor));
    let err = service
        .generate_course("Empty", None, None)
        .await
        .expect_err("must fail");

    match err {
        Error::Generation(GenerationError::InvalidStructure(_)) => {}
        other => panic!("unexpected error: {:?}", other),
    }
}
