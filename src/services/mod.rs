pub mod course_service;

pub use course_service::{
    CourseService, CreateOutcome, ImportOutcome, UpdateOutcome, generate_share_code,
};
