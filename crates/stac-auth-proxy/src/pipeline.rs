// crates/stac-auth-proxy/src/pipeline.rs
// ============================================================================
// Module: Mediation Pipeline
// Description: Ordered request/response stages between client and upstream.
// Purpose: Apply auth, filtering, and response rewriting exactly once each.
// Dependencies: cql2-logic, stac-auth-proxy-filters, tracing, crate::*
// ============================================================================

//! ## Overview
//! Every request walks a fixed sequence of [`Stage`]s:
//!
//! `PathRewriteIn -> AuthEnforcement -> BuildFilter -> ApplyFilterRequest ->
//! Forward -> ApplyFilterResponse -> AuthExtension -> OpenApiAugment ->
//! PathRewriteOut -> Respond`
//!
//! A stage either advances to its successor or fails with a [`ProxyError`],
//! which jumps straight to `Respond`. Nothing is forwarded upstream after a
//! request-side failure. Per-request state lives in `Exchange` and is
//! dropped with the response; the pipeline itself is shared and immutable.
//!
//! Mutations on filtered routes are rejected with `mutation_not_supported`
//! unless the policy is `validate`, in which case the current record is
//! fetched with a read-only probe and checked before the write is forwarded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use axum::http::Method;
use axum::http::StatusCode;
use bytes::Bytes;
use cql2_logic::Expr;
use serde_json::Value;
use stac_auth_proxy_config::MutationPolicy;
use stac_auth_proxy_config::ProxyConfig;
use stac_auth_proxy_filters::FilterContext;
use stac_auth_proxy_filters::FilterError;
use stac_auth_proxy_filters::FilterRegistry;
use stac_auth_proxy_filters::RequestInfo;
use stac_auth_proxy_filters::SharedGenerator;
use stac_auth_proxy_filters::generate_with_timeout;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;
use url::Url;

use crate::access::AccessRuleTable;
use crate::access::Classification;
use crate::access::RuleSet;
use crate::auth::AuthContext;
use crate::auth::CredentialValidator;
use crate::auth_extension::AuthExtension;
use crate::error::ProxyError;
use crate::error::ReasonCode;
use crate::exchange::ClientInfo;
use crate::exchange::ProxyRequest;
use crate::exchange::ProxyResponse;
use crate::filter_apply::apply_to_body;
use crate::filter_apply::apply_to_query;
use crate::filter_apply::check_create;
use crate::filter_apply::check_record;
use crate::filter_apply::check_update;
use crate::filter_apply::record_satisfies;
use crate::openapi::SpecAugmenter;
use crate::paths::PathRewriter;
use crate::routing::FilterAction;
use crate::routing::ResourceKind;
use crate::routing::StacRoute;
use crate::routing::filter_action;
use crate::upstream::Upstream;

// ============================================================================
// SECTION: Stages
// ============================================================================

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Strip the external root prefix.
    PathRewriteIn,
    /// Classify the route and authenticate the caller.
    AuthEnforcement,
    /// Generate the row-level predicate.
    BuildFilter,
    /// Merge the predicate into the request or validate a mutation.
    ApplyFilterRequest,
    /// Send the request upstream.
    Forward,
    /// Validate single-record responses.
    ApplyFilterResponse,
    /// Advertise the authentication extension.
    AuthExtension,
    /// Decorate the API description.
    OpenApiAugment,
    /// Rewrite links back to the proxy.
    PathRewriteOut,
    /// Emit the response.
    Respond,
}

impl Stage {
    /// Returns the stage after `self`.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::PathRewriteIn => Self::AuthEnforcement,
            Self::AuthEnforcement => Self::BuildFilter,
            Self::BuildFilter => Self::ApplyFilterRequest,
            Self::ApplyFilterRequest => Self::Forward,
            Self::Forward => Self::ApplyFilterResponse,
            Self::ApplyFilterResponse => Self::AuthExtension,
            Self::AuthExtension => Self::OpenApiAugment,
            Self::OpenApiAugment => Self::PathRewriteOut,
            Self::PathRewriteOut | Self::Respond => Self::Respond,
        }
    }

    /// Returns the stable stage label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PathRewriteIn => "path_rewrite_in",
            Self::AuthEnforcement => "auth_enforcement",
            Self::BuildFilter => "build_filter",
            Self::ApplyFilterRequest => "apply_filter_request",
            Self::Forward => "forward",
            Self::ApplyFilterResponse => "apply_filter_response",
            Self::AuthExtension => "auth_extension",
            Self::OpenApiAugment => "openapi_augment",
            Self::PathRewriteOut => "path_rewrite_out",
            Self::Respond => "respond",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Pipeline construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// An access or mutation rule did not compile.
    #[error("invalid endpoint rule: {0}")]
    Rules(String),
    /// A filter binding could not be built.
    #[error("invalid filter binding: {0}")]
    Filters(String),
    /// The upstream URL could not be used for link rewriting.
    #[error("invalid upstream url: {0}")]
    Upstream(String),
}

// ============================================================================
// SECTION: Exchange State
// ============================================================================

/// Per-request state carried between stages.
struct Exchange {
    /// Outbound request; the path is prefix-stripped after `PathRewriteIn`.
    request: ProxyRequest,
    /// Downstream connection facts.
    client: ClientInfo,
    /// Access classification.
    classification: Classification,
    /// Caller identity.
    auth: AuthContext,
    /// Filter action for the route and method.
    action: Option<FilterAction>,
    /// Generated predicate; `None` when nothing restricts the request.
    predicate: Option<Expr>,
    /// Client sent `HEAD`; forwarded as `GET` and the body dropped at the end.
    head: bool,
    /// Upstream response.
    response: Option<ProxyResponse>,
    /// Parsed response document shared by the response stages.
    document: Option<Value>,
    /// True once `document` differs from the response body.
    dirty: bool,
}

impl Exchange {
    /// Starts the exchange for `request`.
    fn new(request: ProxyRequest, client: ClientInfo) -> Self {
        let head = request.method == Method::HEAD;
        Self {
            request,
            client,
            classification: Classification::Public,
            auth: AuthContext::anonymous(),
            action: None,
            predicate: None,
            head,
            response: None,
            document: None,
            dirty: false,
        }
    }

    /// Returns the request route, if it is a catalog route.
    fn route(&self) -> Option<StacRoute<'_>> {
        StacRoute::parse(&self.request.path)
    }

    /// Returns the parsed response document when the body is JSON.
    fn document_mut(&mut self) -> Option<&mut Value> {
        if self.document.is_none() {
            self.document = self.response.as_ref().and_then(ProxyResponse::json_body);
        }
        self.document.as_mut()
    }

    /// Builds the generator context.
    fn filter_context(&self, path_params: BTreeMap<String, String>) -> FilterContext {
        let mut query_params = BTreeMap::new();
        for (key, value) in &self.request.query {
            query_params.entry(key.clone()).or_insert_with(|| value.clone());
        }
        let headers = self
            .request
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        FilterContext {
            req: RequestInfo {
                path: self.request.path.clone(),
                method: self.request.method.as_str().to_string(),
                query_params,
                path_params,
                headers,
            },
            payload: self.auth.payload(),
            authenticated: self.auth.authenticated,
            scopes: self.auth.scopes.iter().cloned().collect(),
        }
    }

    /// Finalizes the response.
    fn into_response(mut self) -> ProxyResponse {
        let document = self.document.take();
        let Some(mut response) = self.response.take() else {
            return ProxyError::new(ReasonCode::UpstreamUnavailable, "no upstream response")
                .into_response();
        };
        if self.dirty
            && let Some(document) = document
        {
            response.set_json_body(&document);
        }
        if self.head {
            response.body = Bytes::new();
        }
        response
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Shared mediation pipeline.
pub struct Pipeline {
    /// Root prefix handling.
    rewriter: PathRewriter,
    /// Access classification.
    rules: Arc<AccessRuleTable>,
    /// EnforceAuth stage.
    validator: CredentialValidator,
    /// Generator bound to items routes.
    items_filter: Option<SharedGenerator>,
    /// Generator bound to collections routes.
    collections_filter: Option<SharedGenerator>,
    /// Per-call generator deadline.
    filter_timeout: Duration,
    /// Mutation handling on filtered routes.
    mutation_policy: MutationPolicy,
    /// Endpoints whose mutations are always rejected.
    mutation_disabled: RuleSet,
    /// Upstream forwarder.
    upstream: Arc<dyn Upstream>,
    /// Authentication extension augmenter, when enabled.
    auth_extension: Option<AuthExtension>,
    /// API description augmenter, when a spec endpoint is configured.
    spec: Option<SpecAugmenter>,
}

impl Pipeline {
    /// Assembles the pipeline from configuration and its services.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when rules, filter bindings, or the upstream
    /// URL are invalid.
    pub fn from_config(
        config: &ProxyConfig,
        validator: CredentialValidator,
        upstream: Arc<dyn Upstream>,
        registry: &FilterRegistry,
    ) -> Result<Self, PipelineError> {
        let rules = Arc::new(
            AccessRuleTable::from_config(&config.access)
                .map_err(|err| PipelineError::Rules(err.to_string()))?,
        );
        let mutation_disabled = RuleSet::compile(&config.filters.mutation_disabled_endpoints)
            .map_err(|err| PipelineError::Rules(err.to_string()))?;
        let items_filter = registry
            .build_optional(config.filters.items.as_ref())
            .map_err(|err| PipelineError::Filters(err.to_string()))?;
        let collections_filter = registry
            .build_optional(config.filters.collections.as_ref())
            .map_err(|err| PipelineError::Filters(err.to_string()))?;
        let rewriter = PathRewriter::new(&config.server.root_path, &config.upstream.url)
            .map_err(|err| PipelineError::Upstream(err.to_string()))?;
        let upstream_prefix = Url::parse(&config.upstream.url)
            .map(|url| url.path().to_string())
            .map_err(|err| PipelineError::Upstream(err.to_string()))?;
        let auth_extension = config.auth_extension.enabled.then(|| {
            AuthExtension::new(
                config.auth_extension.scheme_name.clone(),
                config.oidc.discovery_url.clone(),
                Arc::clone(&rules),
                upstream_prefix,
            )
        });
        let spec = config.openapi.spec_endpoint.as_ref().map(|endpoint| {
            SpecAugmenter::new(
                endpoint.clone(),
                config.openapi.auth_scheme_name.clone(),
                &config.oidc.discovery_url,
                config.openapi.auth_scheme_override.clone(),
                config.server.root_path.clone(),
                Arc::clone(&rules),
            )
        });
        Ok(Self {
            rewriter,
            rules,
            validator,
            items_filter,
            collections_filter,
            filter_timeout: Duration::from_millis(config.filters.timeout_ms),
            mutation_policy: config.filters.mutation_policy,
            mutation_disabled,
            upstream,
            auth_extension,
            spec,
        })
    }

    /// Returns the compiled access rules.
    #[must_use]
    pub fn rules(&self) -> &Arc<AccessRuleTable> {
        &self.rules
    }

    /// Runs `request` through every stage and returns the client response.
    pub async fn handle(&self, request: ProxyRequest, client: ClientInfo) -> ProxyResponse {
        let started = Instant::now();
        let method = request.method.clone();
        let path = request.path.clone();
        let mut exchange = Exchange::new(request, client);
        let mut stage = Stage::PathRewriteIn;
        while stage != Stage::Respond {
            if let Err(err) = self.run_stage(stage, &mut exchange).await {
                warn!(
                    method = %method,
                    path = %path,
                    stage = stage.as_str(),
                    reason = err.reason.as_str(),
                    status = err.status().as_u16(),
                    elapsed_ms = elapsed_ms(started),
                    "request rejected"
                );
                return err.into_response();
            }
            stage = stage.next();
        }
        let response = exchange.into_response();
        info!(
            method = %method,
            path = %path,
            status = response.status.as_u16(),
            elapsed_ms = elapsed_ms(started),
            "request completed"
        );
        response
    }

    /// Runs one stage.
    async fn run_stage(&self, stage: Stage, exchange: &mut Exchange) -> Result<(), ProxyError> {
        match stage {
            Stage::PathRewriteIn => {
                exchange.request.path = self.rewriter.strip(&exchange.request.path)?;
                Ok(())
            }
            Stage::AuthEnforcement => self.enforce_auth(exchange).await,
            Stage::BuildFilter => self.build_filter(exchange).await,
            Stage::ApplyFilterRequest => self.apply_filter_request(exchange).await,
            Stage::Forward => {
                let response = self.upstream.forward(&exchange.request, &exchange.client).await?;
                exchange.response = Some(response);
                Ok(())
            }
            Stage::ApplyFilterResponse => apply_filter_response(exchange),
            Stage::AuthExtension => {
                self.advertise_auth(exchange);
                Ok(())
            }
            Stage::OpenApiAugment => {
                self.augment_spec(exchange);
                Ok(())
            }
            Stage::PathRewriteOut => {
                self.rewrite_links(exchange);
                Ok(())
            }
            Stage::Respond => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Request side
    // ------------------------------------------------------------------------

    /// Classifies the route and authenticates the caller.
    async fn enforce_auth(&self, exchange: &mut Exchange) -> Result<(), ProxyError> {
        let method = exchange.request.method.as_str().to_string();
        let path = exchange.request.path.clone();
        exchange.classification = self.rules.classify(&path, &method);
        let header = exchange.request.header("authorization");
        exchange.auth =
            self.validator.authenticate(&exchange.classification, &method, &path, header).await?;
        Ok(())
    }

    /// Returns the generator bound to `kind`.
    fn generator_for(&self, kind: ResourceKind) -> Option<&SharedGenerator> {
        match kind {
            ResourceKind::Items => self.items_filter.as_ref(),
            ResourceKind::Collections => self.collections_filter.as_ref(),
        }
    }

    /// Generates the predicate for filtered routes.
    async fn build_filter(&self, exchange: &mut Exchange) -> Result<(), ProxyError> {
        let Some(route) = exchange.route() else {
            return Ok(());
        };
        let Some(generator) = route.kind().and_then(|kind| self.generator_for(kind)) else {
            return Ok(());
        };
        let Some(action) = filter_action(&route, &exchange.request.method) else {
            return Ok(());
        };
        if action.is_mutation() {
            self.admit_mutation(action, &exchange.request)?;
        }
        let ctx = exchange.filter_context(route.path_params());
        let predicate = generate_with_timeout(generator.as_ref(), &ctx, self.filter_timeout)
            .await
            .map_err(filter_failure)?;
        debug!(path = %exchange.request.path, predicate = %predicate.to_text(), "filter generated");
        exchange.action = Some(action);
        exchange.predicate = (predicate != Expr::TRUE).then_some(predicate);
        Ok(())
    }

    /// Applies the mutation policy to a write on a filtered route.
    fn admit_mutation(&self, action: FilterAction, request: &ProxyRequest) -> Result<(), ProxyError> {
        let disabled =
            self.mutation_disabled.first_match(&request.path, request.method.as_str()).is_some();
        if action == FilterAction::Unsupported
            || disabled
            || self.mutation_policy == MutationPolicy::Reject
        {
            return Err(ProxyError::new(
                ReasonCode::MutationNotSupported,
                format!("{} is not supported on filtered route {}", request.method, request.path),
            ));
        }
        Ok(())
    }

    /// Merges the predicate into listings or validates mutations.
    async fn apply_filter_request(&self, exchange: &mut Exchange) -> Result<(), ProxyError> {
        let (Some(action), Some(predicate)) = (exchange.action, exchange.predicate.clone()) else {
            return Ok(());
        };
        match action {
            FilterAction::Listing if exchange.request.method == Method::POST => {
                apply_to_body(&mut exchange.request, &predicate)
            }
            FilterAction::Listing => apply_to_query(&mut exchange.request, &predicate),
            FilterAction::Record => {
                if exchange.head {
                    exchange.request.method = Method::GET;
                }
                Ok(())
            }
            FilterAction::Create => {
                let bulk = matches!(exchange.route(), Some(StacRoute::BulkItems { .. }));
                check_create(&exchange.request, &predicate, bulk)
            }
            FilterAction::Replace | FilterAction::Patch | FilterAction::Delete => {
                let current = self.fetch_current(exchange).await?;
                if !record_satisfies(&predicate, &current) {
                    return Err(ProxyError::not_found());
                }
                match action {
                    FilterAction::Delete => Ok(()),
                    _ => check_update(
                        &exchange.request,
                        &current,
                        &predicate,
                        action == FilterAction::Patch,
                    ),
                }
            }
            FilterAction::Unsupported => Err(ProxyError::new(
                ReasonCode::MutationNotSupported,
                "mutation has no defined enforcement",
            )),
        }
    }

    /// Reads the record a mutation targets with a `GET` probe.
    async fn fetch_current(&self, exchange: &Exchange) -> Result<Value, ProxyError> {
        let mut headers = exchange.request.headers.clone();
        headers.remove(axum::http::header::CONTENT_TYPE);
        headers.remove(axum::http::header::CONTENT_LENGTH);
        let probe = ProxyRequest::new(Method::GET, exchange.request.path.clone()).with_headers(headers);
        let response = self.upstream.forward(&probe, &exchange.client).await?;
        match response.status {
            StatusCode::OK => response.json_body().ok_or_else(|| {
                ProxyError::new(ReasonCode::UpstreamInvalidResponse, "current record is not JSON")
            }),
            StatusCode::NOT_FOUND => Err(ProxyError::not_found()),
            status => Err(ProxyError::new(
                ReasonCode::UpstreamInvalidResponse,
                format!("current record fetch returned {}", status.as_u16()),
            )),
        }
    }

    // ------------------------------------------------------------------------
    // Response side
    // ------------------------------------------------------------------------

    /// Adds the authentication extension to catalog documents.
    fn advertise_auth(&self, exchange: &mut Exchange) {
        let Some(extension) = &self.auth_extension else {
            return;
        };
        let is_catalog = exchange.route().is_some_and(|route| route.is_catalog_document());
        let is_read = exchange.request.method == Method::GET;
        let eligible = exchange
            .response
            .as_ref()
            .is_some_and(|response| response.status.is_success() && response.is_json());
        if !(is_catalog && is_read && eligible) {
            return;
        }
        if let Some(document) = exchange.document_mut() {
            extension.augment(document);
            exchange.dirty = true;
        }
    }

    /// Decorates the API description response.
    fn augment_spec(&self, exchange: &mut Exchange) {
        let Some(spec) = &self.spec else {
            return;
        };
        let applies = exchange
            .response
            .as_ref()
            .is_some_and(|response| spec.applies(&exchange.request.path, response));
        if !applies {
            return;
        }
        if let Some(document) = exchange.document_mut() {
            spec.augment(document);
            exchange.dirty = true;
        }
    }

    /// Points document links back at the proxy.
    fn rewrite_links(&self, exchange: &mut Exchange) {
        let eligible = exchange.response.as_ref().is_some_and(ProxyResponse::is_json);
        if !eligible {
            return;
        }
        let client = exchange.client.clone();
        if let Some(document) = exchange.document_mut()
            && self.rewriter.rewrite_links(document, &client)
        {
            exchange.dirty = true;
        }
    }
}

/// Validates single-record responses against the predicate.
fn apply_filter_response(exchange: &mut Exchange) -> Result<(), ProxyError> {
    if exchange.action != Some(FilterAction::Record) {
        return Ok(());
    }
    match (&exchange.predicate, &exchange.response) {
        (Some(predicate), Some(response)) => check_record(response, predicate),
        _ => Ok(()),
    }
}

/// Milliseconds since `started`, saturating.
fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Maps generator failures to reason codes.
fn filter_failure(err: FilterError) -> ProxyError {
    let reason = match err {
        FilterError::Timeout(_) => ReasonCode::FilterGeneratorTimeout,
        FilterError::InvalidOutput(_) => ReasonCode::InvalidGeneratedFilter,
        FilterError::Generator(_) | FilterError::UnknownGenerator(_) | FilterError::Config(_) => {
            ReasonCode::FilterGeneratorFailed
        }
    };
    ProxyError::new(reason, err.to_string())
}
