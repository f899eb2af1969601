//! Minijinja rendering for handoff messages.
//!
//! Templates are arbitrary strings (the default, or one supplied through
//! config), so a fresh [`minijinja::Environment`] is created per render call.

use crate::traits::NotifyError;

/// Message used when no template is configured.
pub const DEFAULT_TEMPLATE: &str = "On-call for *{{ rotation }}* is now {{ assignee }} ({{ reason }}).";

/// Context data available to handoff templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HandoffContext {
    /// Rotation display name.
    pub rotation: String,
    pub rotation_id: String,
    /// Rendered assignee reference (mention, display name, or placeholder).
    pub assignee: String,
    /// Reason phrase, e.g. `"scheduled shift change"`.
    pub reason: String,
    /// Machine form of the reason, e.g. `"shift_change"`.
    pub reason_code: String,
    /// Rendered reference to the previous assignee.
    pub previous: String,
    /// Current timestamp in ISO 8601 format.
    pub now: String,
}

/// Renders handoff templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    template: String,
}

impl TemplateRenderer {
    /// Renderer using [`DEFAULT_TEMPLATE`].
    pub fn new() -> Self {
        Self { template: DEFAULT_TEMPLATE.to_string() }
    }

    /// Renderer for a custom template; syntax is checked up front.
    pub fn with_template(template: impl Into<String>) -> Result<Self, NotifyError> {
        let renderer = Self { template: template.into() };
        renderer.validate()?;
        Ok(renderer)
    }

    /// Build a minijinja environment with the `env()` global.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_function("env", env_function);

        env
    }

    /// Render the configured template with the given context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if rendering fails.
    pub fn render(&self, ctx: &HandoffContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(&self.template, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Check that the configured template parses without evaluating it.
    pub fn validate(&self) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(&self.template)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Global function: read an environment variable by name.
///
/// Returns the variable value, or an empty string if not found
/// (with a warning logged via tracing).
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}
