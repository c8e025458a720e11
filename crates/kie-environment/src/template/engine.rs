//! Template engine for configuration templates
//!
//! Uses minijinja with custom syntax configuration:
//! - Variable delimiters: `${...}`
//! - Block delimiters: `{%...%}`
//! - Comment delimiters: `{#...#}`
//! - Escape: `$${...}` produces literal `${...}`

use minijinja::syntax::SyntaxConfig;
use minijinja::value::ValueKind;
use minijinja::{Environment, UndefinedBehavior, Value};
use serde::Serialize;

use super::error::TemplateError;

/// Placeholder for escaped `$${` during preprocessing
const ESCAPED_PLACEHOLDER: &str = "\x00__KIE_ESCAPED_DOLLAR_BRACE__\x00";

/// Template engine rendering configuration templates against a context
///
/// Supports:
/// - `${...}` variable syntax
/// - `$${...}` escape syntax (produces literal `${...}`)
/// - `{%...%}` blocks for conditionals and loops over server sets
/// - Strict undefined variable handling
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create a new template engine
    ///
    /// # Panics
    ///
    /// Panics if minijinja rejects the syntax configuration. The delimiters
    /// are fixed, so this only happens on an incompatible minijinja release.
    pub fn new() -> Self {
        let syntax = SyntaxConfig::builder()
            .variable_delimiters("${", "}")
            .block_delimiters("{%", "%}")
            .comment_delimiters("{#", "#}")
            .build()
            .expect("template syntax configuration is hardcoded and valid");

        let mut env = Environment::new();
        env.set_syntax(syntax);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        // block tags sit on their own lines in YAML templates
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        Self { env }
    }

    /// Render a template string with the given context
    ///
    /// Nothing is returned on error; partial output is dropped.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` if:
    /// - Template syntax is invalid
    /// - A referenced variable is undefined
    /// - The context does not serialize
    pub fn render<C: Serialize>(&self, template: &str, ctx: &C) -> Result<String, TemplateError> {
        let ctx = Value::from_serialize(ctx);
        if ctx.kind() != ValueKind::Map {
            return Err(TemplateError::Context(format!(
                "context must serialize to a map, got {}",
                ctx.kind()
            )));
        }

        let preprocessed = template.replace("$${", ESCAPED_PLACEHOLDER);
        let rendered = self
            .env
            .render_str(&preprocessed, ctx)
            .map_err(TemplateError::from)?;

        Ok(rendered.replace(ESCAPED_PLACEHOLDER, "${"))
    }
}
