use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use elearning_backend::services::outbox_service::OutboxService;
use elearning_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool)?;

    {
        let state = app_state.clone();
        tokio::spawn(async move {
            let outbox = OutboxService::new(state.pool.clone());
            loop {
                match outbox.run_once().await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::time::sleep(Duration::from_millis(750)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Outbox worker error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let staff_api = Router::new()
        .route(
            "/api/teacher/courses/generate",
            post(routes::course_routes::generate_course),
        )
        .route(
            "/api/teacher/courses/:id/publish",
            post(routes::course_routes::publish_course),
        )
        .route(
            "/api/admin/courses/:id/approve",
            post(routes::course_routes::approve_course),
        )
        .route(
            "/api/teacher/certificates",
            get(routes::certificate_routes::list_pending_certificates),
        )
        .route(
            "/api/teacher/certificates/:id/validate",
            post(routes::certificate_routes::validate_certificate),
        )
        .layer(axum::middleware::from_fn_with_state(
            elearning_backend::middleware::rate_limit::new_rps_state(config.staff_rps),
            elearning_backend::middleware::rate_limit::rps_middleware,
        ));

    let student_api = Router::new()
        .route(
            "/api/student/courses",
            get(routes::course_routes::list_courses),
        )
        .route(
            "/api/student/courses/:id",
            get(routes::course_routes::get_course),
        )
        .route(
            "/api/student/courses/:id/enroll",
            post(routes::course_routes::enroll),
        )
        .route(
            "/api/student/courses/:id/chapters/:chapter_id/complete",
            post(routes::course_routes::complete_chapter),
        )
        .route(
            "/api/student/courses/:id/final-quiz",
            post(routes::quiz_routes::generate_final_quiz),
        )
        .route(
            "/api/student/attempts/:id",
            get(routes::quiz_routes::get_attempt),
        )
        .route(
            "/api/student/attempts/:id/start",
            post(routes::quiz_routes::start_attempt),
        )
        .route(
            "/api/student/attempts/:id/submit",
            post(routes::quiz_routes::submit_attempt),
        )
        .layer(axum::middleware::from_fn_with_state(
            elearning_backend::middleware::rate_limit::new_rps_state(config.student_rps),
            elearning_backend::middleware::rate_limit::rps_middleware,
        ));

    let app = base_routes
        .merge(staff_api)
        .merge(student_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
