//! Template rendering.

mod engine;

pub use engine::{TemplateEngine, SERVICE_UNIT_TEMPLATE};
