//! Tera template engine wrapper.
//!
//! Provides built-in templates with optional operator overrides.

use std::path::Path;
use std::sync::Arc;

use tera::{Context, Tera};
use tracing::{debug, info};

use crate::error::DeployError;

/// Name of the systemd unit template.
pub const SERVICE_UNIT_TEMPLATE: &str = "systemd/service.unit.tera";

const SERVICE_UNIT_SOURCE: &str = include_str!("../../templates/systemd/service.unit.tera");

/// Template engine for rendering service definitions.
///
/// Wraps Tera and provides a simplified interface for template operations.
#[derive(Clone)]
pub struct TemplateEngine {
    tera: Arc<Tera>,
}

impl TemplateEngine {
    /// Create an engine holding only the templates compiled into the binary.
    pub fn builtin() -> Result<Self, DeployError> {
        Ok(Self {
            tera: Arc::new(builtin_tera()?),
        })
    }

    /// Create an engine that prefers templates found in `override_dir`.
    ///
    /// Templates are loaded recursively from the directory with `.tera`
    /// extension. Any built-in template without an override is kept. A
    /// missing directory simply means no overrides.
    pub fn with_overrides(override_dir: &Path) -> Result<Self, DeployError> {
        if !override_dir.is_dir() {
            debug!(directory = %override_dir.display(), "No template overrides");
            return Self::builtin();
        }

        let pattern = override_dir.join("**/*.tera");
        let pattern_str = pattern.to_string_lossy();

        debug!(pattern = %pattern_str, "Loading template overrides");

        let mut tera = Tera::new(&pattern_str).map_err(|e| DeployError::Template {
            message: format!(
                "Failed to load templates from '{}': {}",
                override_dir.display(),
                e
            ),
        })?;

        let overrides = tera.get_template_names().count();
        tera.extend(&builtin_tera()?).map_err(|e| DeployError::Template {
            message: format!("Failed to merge built-in templates: {}", e),
        })?;

        info!(
            directory = %override_dir.display(),
            overrides = overrides,
            "Template engine initialized"
        );

        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    /// Render a template with the given context.
    ///
    /// # Arguments
    ///
    /// * `template_name` - Name of the template (e.g., "systemd/service.unit.tera")
    /// * `context` - JSON value containing template variables
    pub fn render(
        &self,
        template_name: &str,
        context: &serde_json::Value,
    ) -> Result<String, DeployError> {
        let tera_context = Context::from_serialize(context).map_err(|e| DeployError::Template {
            message: format!("Invalid template context: {}", e),
        })?;

        self.tera
            .render(template_name, &tera_context)
            .map_err(|e| DeployError::Template {
                message: format!("Failed to render template '{}': {}", template_name, e),
            })
    }

    /// Check if a template exists.
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }
}

fn builtin_tera() -> Result<Tera, DeployError> {
    let mut tera = Tera::default();
    tera.add_raw_template(SERVICE_UNIT_TEMPLATE, SERVICE_UNIT_SOURCE)
        .map_err(|e| DeployError::Template {
            message: format!("Built-in template '{}' is invalid: {}", SERVICE_UNIT_TEMPLATE, e),
        })?;
    Ok(tera)
}
