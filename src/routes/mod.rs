pub mod certificate_routes;
pub mod course_routes;
pub mod health;
pub mod quiz_routes;
