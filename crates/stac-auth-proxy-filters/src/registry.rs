// crates/stac-auth-proxy-filters/src/registry.rs
// ============================================================================
// Module: Filter Generator Registry
// Description: Resolves configured generator identifiers to implementations.
// Purpose: Build filter generators from configuration at startup.
// Dependencies: stac-auth-proxy-config, crate::{opa, template}
// ============================================================================

//! ## Overview
//! Generators are constructed by factories registered under stable
//! identifiers. The built-ins are `template` and `opa`. An unknown identifier
//! is a startup error, never a per-request one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use stac_auth_proxy_config::FilterBinding;

use crate::generator::FilterError;
use crate::generator::FilterGenerator;
use crate::opa::OpaConfig;
use crate::opa::OpaGenerator;
use crate::template::TemplateGenerator;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Shared generator handle.
pub type SharedGenerator = Arc<dyn FilterGenerator>;

/// Builds a generator from its configured arguments.
pub type GeneratorFactory =
    Box<dyn Fn(&FilterBinding) -> Result<SharedGenerator, FilterError> + Send + Sync>;

/// Identifier of the template generator.
pub const TEMPLATE_GENERATOR: &str = "template";
/// Identifier of the OPA generator.
pub const OPA_GENERATOR: &str = "opa";

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Generator factory registry.
///
/// # Invariants
/// - Identifiers are unique within the registry.
pub struct FilterRegistry {
    /// Factories keyed by generator identifier.
    factories: BTreeMap<String, GeneratorFactory>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Creates a registry with the built-in generators registered.
    #[must_use]
    pub fn with_builtin_generators() -> Self {
        let mut factories: BTreeMap<String, GeneratorFactory> = BTreeMap::new();
        factories.insert(
            TEMPLATE_GENERATOR.to_string(),
            Box::new(|binding: &FilterBinding| {
                TemplateGenerator::from_binding(binding)
                    .map(|generator| Arc::new(generator) as SharedGenerator)
            }),
        );
        factories.insert(
            OPA_GENERATOR.to_string(),
            Box::new(|binding: &FilterBinding| {
                OpaGenerator::new(OpaConfig::from_binding(binding)?)
                    .map(|generator| Arc::new(generator) as SharedGenerator)
            }),
        );
        Self {
            factories,
        }
    }

    /// Registers a factory under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Config`] when `id` is already registered.
    pub fn register_factory(
        &mut self,
        id: impl Into<String>,
        factory: GeneratorFactory,
    ) -> Result<(), FilterError> {
        let id = id.into();
        if self.factories.contains_key(&id) {
            return Err(FilterError::Config(format!("generator already registered: {id}")));
        }
        self.factories.insert(id, factory);
        Ok(())
    }

    /// Returns registered identifiers in order.
    #[must_use]
    pub fn identifiers(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Builds the generator described by `binding`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnknownGenerator`] for unregistered identifiers
    /// and the factory's error otherwise.
    pub fn build(&self, binding: &FilterBinding) -> Result<SharedGenerator, FilterError> {
        let factory = self
            .factories
            .get(binding.generator.as_str())
            .ok_or_else(|| FilterError::UnknownGenerator(binding.generator.clone()))?;
        factory(binding)
    }

    /// Builds an optional binding.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] when the binding cannot be built.
    pub fn build_optional(
        &self,
        binding: Option<&FilterBinding>,
    ) -> Result<Option<SharedGenerator>, FilterError> {
        binding.map(|binding| self.build(binding)).transpose()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtin_generators()
    }
}
