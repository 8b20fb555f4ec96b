// crates/stac-auth-proxy-filters/src/template.rs
// ============================================================================
// Module: Template Filter Generator
// Description: Renders a Handlebars template against the request context.
// Purpose: Express per-user predicates declaratively in configuration.
// Dependencies: handlebars, cql2-logic, crate::generator
// ============================================================================

//! ## Overview
//! The template sees the JSON request context (`req`, `payload`,
//! `authenticated`, `scopes`). HTML escaping is disabled so quotes reach the
//! CQL2 parser untouched; missing variables render empty.
//!
//! ```text
//! {{#if authenticated}}owner = '{{payload.sub}}'{{else}}private = false{{/if}}
//! ```

use async_trait::async_trait;
use cql2_logic::Expr;
use handlebars::Handlebars;
use serde_json::Value;
use stac_auth_proxy_config::FilterBinding;

use crate::generator::FilterContext;
use crate::generator::FilterError;
use crate::generator::FilterGenerator;
use crate::generator::parse_generated;

/// Registered template name.
const TEMPLATE_NAME: &str = "filter";

/// Handlebars-backed filter generator.
pub struct TemplateGenerator {
    /// Template registry holding the compiled filter template.
    registry: Handlebars<'static>,
}

impl TemplateGenerator {
    /// Compiles `template`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Config`] when the template does not compile.
    pub fn new(template: &str) -> Result<Self, FilterError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(TEMPLATE_NAME, template)
            .map_err(|err| FilterError::Config(format!("template does not compile: {err}")))?;
        Ok(Self {
            registry,
        })
    }

    /// Builds the generator from a binding: `args[0]` or `kwargs.template`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Config`] when no template string is supplied.
    pub fn from_binding(binding: &FilterBinding) -> Result<Self, FilterError> {
        let template = binding
            .args
            .first()
            .or_else(|| binding.kwargs.get("template"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FilterError::Config("template generator requires a template string".to_string())
            })?;
        Self::new(template)
    }

    /// Renders the template for `ctx` without parsing the output.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Generator`] when rendering fails.
    pub fn render(&self, ctx: &FilterContext) -> Result<String, FilterError> {
        self.registry
            .render(TEMPLATE_NAME, &ctx.as_json())
            .map(|rendered| rendered.trim().to_string())
            .map_err(|err| FilterError::Generator(err.to_string()))
    }
}

#[async_trait]
impl FilterGenerator for TemplateGenerator {
    async fn generate(&self, ctx: &FilterContext) -> Result<Expr, FilterError> {
        parse_generated(&self.render(ctx)?)
    }
}
