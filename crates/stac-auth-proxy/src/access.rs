// crates/stac-auth-proxy/src/access.rs
// ============================================================================
// Module: Access Rule Table
// Description: Classifies (path, method) pairs as public or private.
// Purpose: Decide authentication requirements before any other stage runs.
// Dependencies: regex, stac-auth-proxy-config
// ============================================================================

//! ## Overview
//! The `default_public` flag selects the authoritative table. With
//! `default_public = true` the private table decides: a match is private
//! (with that rule's scopes), anything else is public. With
//! `default_public = false` the public table decides: a match is public,
//! anything else is private. Private results in that mode take their
//! required scopes from the first matching private rule, which never changes
//! the visibility outcome.
//!
//! Rules match by pattern first, then by method (case-insensitive); a
//! pattern hit with another method continues to the next rule. Patterns are
//! compiled once, and the table is immutable and shared across requests.

use regex::Regex;
use stac_auth_proxy_config::AccessConfig;
use stac_auth_proxy_config::EndpointRule;

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Access classification for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No credential required.
    Public,
    /// Credential required, with scopes the token must carry.
    Private {
        /// Required scopes (empty when any valid token suffices).
        scopes: Vec<String>,
    },
}

impl Classification {
    /// Returns true for private classifications.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        matches!(self, Self::Private { .. })
    }

    /// Returns the required scopes (empty for public routes).
    #[must_use]
    pub fn required_scopes(&self) -> &[String] {
        match self {
            Self::Public => &[],
            Self::Private {
                scopes,
            } => scopes,
        }
    }
}

// ============================================================================
// SECTION: Compiled Rules
// ============================================================================

/// Rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Compiled path pattern.
    pattern: Regex,
    /// Upper-cased methods.
    methods: Vec<String>,
    /// Non-blank scopes.
    scopes: Vec<String>,
}

impl CompiledRule {
    /// Compiles `rule`, anchoring the pattern at the start of the path.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] when the pattern does not compile.
    pub fn compile(rule: &EndpointRule) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&format!("^(?:{})", rule.pattern))?,
            methods: rule.methods.iter().map(|method| method.trim().to_ascii_uppercase()).collect(),
            scopes: rule
                .scopes
                .iter()
                .map(|scope| scope.trim())
                .filter(|scope| !scope.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }

    /// Returns true when the rule covers `path` and `method`.
    #[must_use]
    pub fn matches(&self, path: &str, method: &str) -> bool {
        self.pattern.is_match(path)
            && self.methods.iter().any(|candidate| candidate.eq_ignore_ascii_case(method))
    }
}

/// Ordered list of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// Rules in configuration order.
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compiles `rules` in order.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] for the first pattern that does not compile.
    pub fn compile(rules: &[EndpointRule]) -> Result<Self, regex::Error> {
        Ok(Self {
            rules: rules.iter().map(CompiledRule::compile).collect::<Result<_, _>>()?,
        })
    }

    /// Returns the first rule covering `path` and `method`.
    #[must_use]
    pub fn first_match(&self, path: &str, method: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|rule| rule.matches(path, method))
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ============================================================================
// SECTION: Rule Table
// ============================================================================

/// Compiled access rule table.
#[derive(Debug, Clone)]
pub struct AccessRuleTable {
    /// Visibility default for unmatched routes.
    default_public: bool,
    /// Rules that make routes public.
    public: RuleSet,
    /// Rules that make routes private.
    private: RuleSet,
}

impl AccessRuleTable {
    /// Compiles the table from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] when a pattern does not compile.
    pub fn from_config(config: &AccessConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            default_public: config.default_public,
            public: RuleSet::compile(&config.public_endpoints)?,
            private: RuleSet::compile(&config.private_endpoints)?,
        })
    }

    /// Returns the visibility default.
    #[must_use]
    pub const fn default_public(&self) -> bool {
        self.default_public
    }

    /// Classifies `path` (already prefix-stripped) for `method`.
    #[must_use]
    pub fn classify(&self, path: &str, method: &str) -> Classification {
        if self.default_public {
            return self.private.first_match(path, method).map_or(Classification::Public, |rule| {
                Classification::Private {
                    scopes: rule.scopes.clone(),
                }
            });
        }
        if self.public.first_match(path, method).is_some() {
            return Classification::Public;
        }
        Classification::Private {
            scopes: self
                .private
                .first_match(path, method)
                .map(|rule| rule.scopes.clone())
                .unwrap_or_default(),
        }
    }
}
