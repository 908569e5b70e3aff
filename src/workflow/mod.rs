//! Multi-step write workflows shared by the route handlers.

pub mod blog;
pub mod form;
pub mod json_field;
pub mod project;
pub mod reorder;

pub use form::{FilePart, MultipartForm};
