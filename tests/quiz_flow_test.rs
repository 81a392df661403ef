use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::post,
    Router,
};
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use elearning_backend::error::{Error, Result};
use elearning_backend::models::certificate::CertificateRecord;
use elearning_backend::models::course::{Chapter, ContentBlock, CourseModule, GeneratedCourse};
use elearning_backend::models::outbox::{OutboxTask, TASK_AWARD_BADGE};
use elearning_backend::models::quiz::{AnswerSelection, QuizQuestion};
use elearning_backend::services::outbox_service::OutboxService;
use elearning_backend::services::prompt_service::{
    CourseOutlinePromptInput, ImagePromptOutput, MediaPromptInput, PromptExecutor,
    QuizPromptInput, QuizPromptOutput, VideoPromptOutput,
};
use elearning_backend::AppState;

struct FixedQuizExecutor;

#[async_trait]
impl PromptExecutor for FixedQuizExecutor {
    async fn generate_course_outline(
        &self,
        _input: &CourseOutlinePromptInput,
    ) -> Result<GeneratedCourse> {
        Err(anyhow::anyhow!("not used in this test").into())
    }

    async fn generate_chapter_image(&self, _input: &MediaPromptInput) -> Result<ImagePromptOutput> {
        Err(anyhow::anyhow!("not used in this test").into())
    }

    async fn suggest_chapter_video(&self, _input: &MediaPromptInput) -> Result<VideoPromptOutput> {
        Err(anyhow::anyhow!("not used in this test").into())
    }

    async fn generate_final_quiz(&self, _input: &QuizPromptInput) -> Result<QuizPromptOutput> {
        let questions = (0..10)
            .map(|i| QuizQuestion {
                id: 0,
                question_text: format!("Question {}", i + 1),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer_index: i % 4,
                marks: 1,
            })
            .collect();
        Ok(QuizPromptOutput { questions })
    }
}

fn algebra_course() -> GeneratedCourse {
    let chapter = |id: &str, title: &str| Chapter {
        id: id.into(),
        title: title.into(),
        estimated_minutes: 15,
        content_blocks: vec![ContentBlock::Text {
            id: format!("{}-t", id),
            value: "<p>Body text.</p>".into(),
        }],
    };
    GeneratedCourse {
        title: "Intro to Algebra".into(),
        description: "Basics".into(),
        category_name: "Mathematics".into(),
        estimated_duration_minutes: 60,
        difficulty: Default::default(),
        badge_on_complete: Some("Algebra Star".into()),
        modules: vec![CourseModule {
            id: "m1".into(),
            title: "Module 1".into(),
            description: String::new(),
            chapters: vec![chapter("c1", "Linear Equations"), chapter("c2", "Matrices")],
        }],
    }
}

#[tokio::test]
async fn quiz_flow_end_to_end() {
    dotenvy::dotenv().ok();
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("OPENAI_API_KEY", "sk-test");
    env::set_var("STUDENT_RPS", "100");
    env::set_var("STAFF_RPS", "100");
    env::set_var("WEBHOOK_SECRET", "whsec_test");
    env::remove_var("NOTIFICATION_WEBHOOK_URL");

    elearning_backend::config::init_config().expect("init config");
    let pool = elearning_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    // Queue counts below are global, so start from an empty outbox.
    sqlx::query("DELETE FROM outbox_tasks")
        .execute(&pool)
        .await
        .expect("clear outbox");

    let student_id = Uuid::new_v4();
    sqlx::query(r#"INSERT INTO users (id, name, email, role) VALUES ($1, $2, $3, 'student')"#)
        .bind(student_id)
        .bind("Alice")
        .bind(format!("alice_{}@example.com", student_id))
        .execute(&pool)
        .await
        .expect("seed student");
    let teacher_id = Uuid::new_v4();
    sqlx::query(r#"INSERT INTO users (id, name, email, role) VALUES ($1, $2, $3, 'teacher')"#)
        .bind(teacher_id)
        .bind("Bob")
        .bind(format!("bob_{}@example.com", teacher_id))
        .execute(&pool)
        .await
        .expect("seed teacher");

    AppState::new(pool.clone()).expect("app state from config");
    let executor: Arc<dyn PromptExecutor> = Arc::new(FixedQuizExecutor);
    let app_state = AppState::with_executor(pool.clone(), executor);
    let courses = app_state.course_service.clone();
    let quiz = app_state.quiz_service.clone();

    let course = courses
        .create_draft(&algebra_course(), teacher_id)
        .await
        .expect("draft");
    courses.publish(course.id, teacher_id).await.expect("publish");
    courses.approve(course.id).await.expect("approve");

    // Quiz generation is gated on enrollment first, then full completion.
    let err = quiz
        .generate_attempt(student_id, course.id)
        .await
        .expect_err("not enrolled");
    assert!(matches!(err, Error::BadRequest(_)));

    courses.enroll(student_id, course.id).await.expect("enroll");
    courses
        .enroll(student_id, course.id)
        .await
        .expect("re-enroll is a no-op");
    let enrolled = courses.get_course(course.id).await.expect("course");
    assert_eq!(enrolled.enrollment_count, 1);

    let err = quiz
        .generate_attempt(student_id, course.id)
        .await
        .expect_err("chapters incomplete");
    assert!(matches!(err, Error::BadRequest(_)));

    // Concurrent completions must both survive the append.
    let (r1, r2) = tokio::join!(
        courses.complete_chapter(student_id, course.id, "c1"),
        courses.complete_chapter(student_id, course.id, "c2"),
    );
    r1.expect("complete c1");
    r2.expect("complete c2");
    let enrollment = courses
        .complete_chapter(student_id, course.id, "c1")
        .await
        .expect("repeat completion is idempotent");
    let mut done = enrollment.completed_ids();
    done.sort();
    assert_eq!(done, vec!["c1".to_string(), "c2".to_string()]);

    // Route level: a fresh attempt is 201, the live one comes back as 200.
    let app = Router::new()
        .route(
            "/api/student/courses/:id/final-quiz",
            post(elearning_backend::routes::quiz_routes::generate_final_quiz),
        )
        .with_state(app_state.clone());
    let generate_req = || {
        Request::builder()
            .method("POST")
            .uri(format!("/api/student/courses/{}/final-quiz", course.id))
            .header("content-type", "application/json")
            .body(Body::from(json!({ "user_id": student_id }).to_string()))
            .unwrap()
    };
    let resp = app.clone().oneshot(generate_req()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let first_body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    let attempt_id: Uuid = first_body["id"].as_str().unwrap().parse().unwrap();

    let resp = app.clone().oneshot(generate_req()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let second_body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(second_body["id"], first_body["id"]);

    let started = quiz
        .start_attempt(attempt_id, student_id)
        .await
        .expect("start");
    let started_at = started.attempted_at.expect("attempted_at set");
    let restarted = quiz
        .start_attempt(attempt_id, student_id)
        .await
        .expect("restart");
    assert_eq!(restarted.attempted_at, Some(started_at));

    // Fail the first attempt outright.
    let questions = started.parsed_questions().expect("questions");
    let all_wrong: Vec<AnswerSelection> = questions
        .iter()
        .map(|q| AnswerSelection {
            question_id: q.id,
            selected_index: Some((q.correct_answer_index + 1) % q.options.len() as i32),
        })
        .collect();
    let (failed, scored) = quiz
        .submit_attempt(attempt_id, student_id, &all_wrong)
        .await
        .expect("submit");
    assert_eq!(scored.score, 0);
    assert!(!scored.passed);
    assert!(failed.next_attempt_allowed_at.is_some());

    let err = quiz
        .generate_attempt(student_id, course.id)
        .await
        .expect_err("cooldown blocks regeneration");
    assert!(matches!(err, Error::BadRequest(_)));

    sqlx::query(
        r#"UPDATE quiz_attempts SET next_attempt_allowed_at = NOW() - INTERVAL '1 minute' WHERE id = $1"#,
    )
    .bind(attempt_id)
    .execute(&pool)
    .await
    .expect("expire cooldown");

    let (retry, created) = quiz
        .generate_attempt(student_id, course.id)
        .await
        .expect("regenerate after cooldown");
    assert!(created);
    assert_ne!(retry.id, attempt_id);

    let questions = retry.parsed_questions().expect("questions");
    let all_correct: Vec<AnswerSelection> = questions
        .iter()
        .map(|q| AnswerSelection {
            question_id: q.id,
            selected_index: Some(q.correct_answer_index),
        })
        .collect();
    let (passed, scored) = quiz
        .submit_attempt(retry.id, student_id, &all_correct)
        .await
        .expect("submit pass");
    assert_eq!(scored.score, 10);
    assert!(scored.passed);
    assert_eq!(passed.passed, Some(true));

    let err = quiz
        .submit_attempt(retry.id, student_id, &all_correct)
        .await
        .expect_err("double submit rejected");
    assert!(matches!(err, Error::BadRequest(_)));
    let err = quiz
        .generate_attempt(student_id, course.id)
        .await
        .expect_err("passed course blocks regeneration");
    assert!(matches!(err, Error::BadRequest(_)));

    // The pass wrote certificate/badge/counter tasks; drain the outbox.
    let pending: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM outbox_tasks WHERE status = 'pending'"#,
    )
    .fetch_one(&pool)
    .await
    .expect("pending count");
    assert_eq!(pending, 3);

    let outbox = OutboxService::new(pool.clone());
    while outbox.run_once().await.expect("outbox") {}

    let certificate = sqlx::query_as::<_, CertificateRecord>(
        r#"SELECT * FROM certificates WHERE user_id = $1 AND course_id = $2"#,
    )
    .bind(student_id)
    .bind(course.id)
    .fetch_one(&pool)
    .await
    .expect("certificate issued");
    assert_eq!(certificate.status, "pending_validation");
    assert_eq!(certificate.final_score, 10);
    assert_eq!(certificate.student_name, "Alice");

    let badges: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM badge_awards WHERE user_id = $1 AND course_id = $2"#,
    )
    .bind(student_id)
    .bind(course.id)
    .fetch_one(&pool)
    .await
    .expect("badge count");
    assert_eq!(badges, 1);

    let completed: i32 =
        sqlx::query_scalar(r#"SELECT completed_courses FROM users WHERE id = $1"#)
            .bind(student_id)
            .fetch_one(&pool)
            .await
            .expect("counter");
    assert_eq!(completed, 1);

    // A second award task for the same pair must not mint a second badge.
    OutboxService::enqueue(
        &pool,
        TASK_AWARD_BADGE,
        &json!({
            "user_id": student_id,
            "course_id": course.id,
            "course_title": course.title,
            "badge_name": "Algebra Star",
            "awarded_date": Utc::now().to_rfc3339(),
        }),
    )
    .await
    .expect("enqueue duplicate badge");
    while outbox.run_once().await.expect("outbox") {}
    let badges: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM badge_awards WHERE user_id = $1 AND course_id = $2"#,
    )
    .bind(student_id)
    .bind(course.id)
    .fetch_one(&pool)
    .await
    .expect("badge count");
    assert_eq!(badges, 1);

    // A task whose dispatch errors stays pending with a retry horizon, so
    // it is never stranded in a non-reclaimable state.
    let broken_id = OutboxService::enqueue(&pool, "does_not_exist", &json!({}))
        .await
        .expect("enqueue broken");
    assert!(outbox.run_once().await.expect("claim broken task"));
    let broken = sqlx::query_as::<_, OutboxTask>(r#"SELECT * FROM outbox_tasks WHERE id = $1"#)
        .bind(broken_id)
        .fetch_one(&pool)
        .await
        .expect("broken task row");
    assert_eq!(broken.status, "pending");
    assert_eq!(broken.attempts, 1);
    assert!(broken.last_error.is_some());
    assert!(broken.next_retry_at.expect("retry horizon") > Utc::now());
    // Not due yet, so the worker leaves it alone.
    assert!(!outbox.run_once().await.expect("queue drained"));

    // Validation: only the owning teacher, pending -> approved.
    let err = app_state
        .certificate_service
        .validate(certificate.id, student_id, true)
        .await
        .expect_err("only the course teacher validates");
    assert!(matches!(err, Error::Forbidden(_)));

    let approved = app_state
        .certificate_service
        .validate(certificate.id, teacher_id, true)
        .await
        .expect("approve");
    assert_eq!(approved.status, "approved");
    assert_eq!(approved.validated_by_teacher_id, Some(teacher_id));

    while outbox.run_once().await.expect("outbox") {}
    let notified: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM outbox_tasks WHERE task_type = 'notify_student' AND status = 'succeeded'"#,
    )
    .fetch_one(&pool)
    .await
    .expect("notify count");
    assert_eq!(notified, 1);
}
