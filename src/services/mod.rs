pub mod certificate_service;
pub mod course_gen_service;
pub mod course_service;
pub mod image_populator;
pub mod outbox_service;
pub mod prompt_service;
pub mod quiz_service;
pub mod video_populator;
