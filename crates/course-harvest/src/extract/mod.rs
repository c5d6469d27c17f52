//! Adaptive extraction: course discovery, curriculum trees and course
//! page metadata.

pub mod course_page;
pub mod curriculum;
pub mod discover;

pub use course_page::{course_id_from_url, read_course_page, CoursePage};
pub use curriculum::{extract_curriculum, read_curriculum, to_lectures, ExpansionStats};
pub use discover::{discover_courses, discover_on};
