pub mod badge;
pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod outbox;
pub mod quiz;
pub mod user;
