pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    certificate_service::CertificateService,
    course_gen_service::CourseGenService,
    course_service::CourseService,
    prompt_service::{OpenAiPromptExecutor, PromptExecutor},
    quiz_service::QuizService,
};
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub course_gen_service: CourseGenService,
    pub course_service: CourseService,
    pub quiz_service: QuizService,
    pub certificate_service: CertificateService,
}

impl AppState {
    pub fn new(pool: PgPool) -> crate::error::Result<Self> {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        let executor: Arc<dyn PromptExecutor> = Arc::new(OpenAiPromptExecutor::new(
            config.openai_api_key.clone(),
            http_client,
        ));
        Ok(Self::with_executor(pool, executor))
    }

    /// Wire the state around any prompt executor. Tests use this to swap in
    /// a stub instead of the OpenAI-backed one.
    pub fn with_executor(pool: PgPool, executor: Arc<dyn PromptExecutor>) -> Self {
        let course_gen_service = CourseGenService::new(executor.clone());
        let course_service = CourseService::new(pool.clone());
        let quiz_service = QuizService::new(pool.clone(), executor);
        let certificate_service = CertificateService::new(pool.clone());

        Self {
            pool,
            course_gen_service,
            course_service,
            quiz_service,
            certificate_service,
        }
    }
}
