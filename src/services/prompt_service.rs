use crate::error::Result;
use crate::models::course::GeneratedCourse;
use crate::models::quiz::QuizQuestion;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseOutlinePromptInput {
    pub course_title: String,
    pub target_audience: Option<String>,
    pub number_of_modules: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPromptInput {
    pub topic: String,
    pub chapter_title: String,
    pub course_title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagePromptOutput {
    pub image_url: Option<String>,
    /// Short alt text, at most ~15 words.
    pub alt_text: Option<String>,
    /// 1-2 keywords for image categorization.
    pub data_ai_hint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoPromptOutput {
    /// Direct embeddable URL, or a `search:`-prefixed query when no
    /// specific video could be identified.
    pub video_url: Option<String>,
    /// Short alt text, at most ~20 words.
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizPromptInput {
    pub course_id: Uuid,
    pub course_title: String,
    pub num_questions: usize,
    /// Per-user, per-timestamp token so repeated generations for the same
    /// course produce fresh question sets.
    pub cache_buster: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizPromptOutput {
    pub questions: Vec<QuizQuestion>,
}

/// External prompt-execution collaborator: named prompt in, structured
/// schema out. Implementations may fail or return incomplete data; all
/// repair and fallback policy lives in the calling services.
#[async_trait]
pub trait PromptExecutor: Send + Sync {
    async fn generate_course_outline(
        &self,
        input: &CourseOutlinePromptInput,
    ) -> Result<GeneratedCourse>;

    async fn generate_chapter_image(&self, input: &MediaPromptInput) -> Result<ImagePromptOutput>;

    async fn suggest_chapter_video(&self, input: &MediaPromptInput) -> Result<VideoPromptOutput>;

    async fn generate_final_quiz(&self, input: &QuizPromptInput) -> Result<QuizPromptOutput>;
}

#[derive(Clone)]
pub struct OpenAiPromptExecutor {
    client: Client,
    api_key: String,
}

impl OpenAiPromptExecutor {
    pub fn new(api_key: String, client: Client) -> Self {
        Self { client, api_key }
    }

    async fn chat_openai(&self, payload: JsonValue) -> Result<JsonValue> {
        let res = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("OpenAI API Error {}: {}", status, text).into());
        }

        let body: JsonValue = res.json().await?;

        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .and_then(|s| serde_json::from_str(s).ok())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response format").into())
    }
}

#[async_trait]
impl PromptExecutor for OpenAiPromptExecutor {
    async fn generate_course_outline(
        &self,
        input: &CourseOutlinePromptInput,
    ) -> Result<GeneratedCourse> {
        let system_prompt = r#"You are an expert curriculum designer.
Generate a complete course structure as a single JSON object with fields:
title, description, categoryName, estimatedDurationMinutes,
difficulty ("Beginner" | "Intermediate" | "Advanced"),
badgeOnComplete (optional), modules.

Rules:
1. Generate exactly the requested number of modules, each with 2-5 chapters.
2. Every chapter starts with exactly one heading block, followed by multiple
   substantial HTML-formatted text blocks.
3. A chapter may include at most one image block and at most one video block.
   Image blocks MUST use the literal value "PENDING_IMAGE_GENERATION" and
   video blocks MUST use the literal value "PENDING_VIDEO_SUGGESTION" -
   never real URLs. Give each such block a short descriptive "topic" field.
4. Optionally include link or file blocks where external material helps.
5. Content blocks are tagged objects: {"type": "heading"|"text"|"image"|
   "video"|"link"|"file", "value": ..., ...}.
"#;

        let user_data = serde_json::json!({
            "courseTitle": input.course_title,
            "targetAudience": input.target_audience,
            "numberOfModules": input.number_of_modules,
        });

        let payload = serde_json::json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": serde_json::to_string(&user_data)?}
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.7
        });

        let response = self.chat_openai(payload).await?;
        let course: GeneratedCourse = serde_json::from_value(response)?;
        Ok(course)
    }

    async fn generate_chapter_image(&self, input: &MediaPromptInput) -> Result<ImagePromptOutput> {
        let system_prompt = r#"You are an educational illustrator.
Given a topic, produce a single relevant image and return a JSON object:
{ "image_url": "<URI of the generated image>",
  "alt_text": "<description, 15 words max>",
  "data_ai_hint": "<one or two keywords>" }"#;

        let user_data = serde_json::json!({
            "topic": input.topic,
            "chapterTitle": input.chapter_title,
            "courseTitle": input.course_title,
        });

        let payload = serde_json::json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": serde_json::to_string(&user_data)?}
            ],
            "response_format": { "type": "json_object" }
        });

        let response = self.chat_openai(payload).await?;
        Ok(serde_json::from_value(response)?)
    }

    async fn suggest_chapter_video(&self, input: &MediaPromptInput) -> Result<VideoPromptOutput> {
        let system_prompt = r#"You are an educational content curator.
Suggest one video for the given topic and return a JSON object:
{ "video_url": "...", "alt_text": "<description, 20 words max>" }
Prefer a direct embeddable video URL. If no specific video can be
identified, return a search query string prefixed with the literal
"search:" instead of a URL."#;

        let user_data = serde_json::json!({
            "topic": input.topic,
            "chapterTitle": input.chapter_title,
            "courseTitle": input.course_title,
        });

        let payload = serde_json::json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": serde_json::to_string(&user_data)?}
            ],
            "response_format": { "type": "json_object" }
        });

        let response = self.chat_openai(payload).await?;
        Ok(serde_json::from_value(response)?)
    }

    async fn generate_final_quiz(&self, input: &QuizPromptInput) -> Result<QuizPromptOutput> {
        let system_prompt = r#"You are a strict examiner.
Generate a final assessment for the given course as a JSON object with a
"questions" array. Each question:
{ "questionText": "...", "options": ["...", "...", "...", "..."],
  "correctAnswerIndex": <0-3>, "marks": 1 }

Rules:
1. Generate exactly the requested number of questions.
2. Questions must cover the whole course, be non-trivial and unambiguous.
3. VARY the correctAnswerIndex across positions - do NOT always use 0.
4. Avoid "All of the above" / "None of the above" options."#;

        let user_data = serde_json::json!({
            "courseId": input.course_id,
            "courseTitle": input.course_title,
            "requiredCount": input.num_questions,
            "freshness": input.cache_buster,
        });

        let payload = serde_json::json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": serde_json::to_string(&user_data)?}
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.8
        });

        let response = self.chat_openai(payload).await?;
        Ok(serde_json::from_value(response)?)
    }
}
