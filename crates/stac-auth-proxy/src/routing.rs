// crates/stac-auth-proxy/src/routing.rs
// ============================================================================
// Module: STAC Routes
// Description: Recognizes catalog routes and the filter action they imply.
// Purpose: Pick the filter binding and application strategy for a request.
// Dependencies: axum (http types)
// ============================================================================

//! ## Overview
//! Paths are matched segment by segment; every identifier segment must be
//! non-empty, so `/collections/` is not a collection route. Collections
//! routes are `/collections` and `/collections/{id}`; items routes are
//! `/collections/{id}/items`, `/collections/{id}/items/{id}`, and `/search`.
//! `/collections/{id}/bulk_items` is an items route for mutations only.

use std::collections::BTreeMap;

use axum::http::Method;

// ============================================================================
// SECTION: Routes
// ============================================================================

/// Resource kind a filter binding covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Item-level filtering.
    Items,
    /// Collection-level filtering.
    Collections,
}

/// Recognized catalog route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StacRoute<'a> {
    /// `/`
    Landing,
    /// `/collections`
    Collections,
    /// `/collections/{collection_id}`
    Collection {
        /// Collection identifier.
        collection_id: &'a str,
    },
    /// `/collections/{collection_id}/items`
    Items {
        /// Collection identifier.
        collection_id: &'a str,
    },
    /// `/collections/{collection_id}/items/{item_id}`
    Item {
        /// Collection identifier.
        collection_id: &'a str,
        /// Item identifier.
        item_id: &'a str,
    },
    /// `/collections/{collection_id}/bulk_items`
    BulkItems {
        /// Collection identifier.
        collection_id: &'a str,
    },
    /// `/search`
    Search,
}

impl<'a> StacRoute<'a> {
    /// Recognizes `path`.
    #[must_use]
    pub fn parse(path: &'a str) -> Option<Self> {
        if path == "/" {
            return Some(Self::Landing);
        }
        let rest = path.strip_prefix('/')?;
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return None;
        }
        match *segments.as_slice() {
            ["search"] => Some(Self::Search),
            ["collections"] => Some(Self::Collections),
            ["collections", collection_id] => Some(Self::Collection {
                collection_id,
            }),
            ["collections", collection_id, "items"] => Some(Self::Items {
                collection_id,
            }),
            ["collections", collection_id, "items", item_id] => Some(Self::Item {
                collection_id,
                item_id,
            }),
            ["collections", collection_id, "bulk_items"] => Some(Self::BulkItems {
                collection_id,
            }),
            _ => None,
        }
    }

    /// Returns the filter resource kind of this route.
    #[must_use]
    pub const fn kind(&self) -> Option<ResourceKind> {
        match self {
            Self::Landing => None,
            Self::Collections | Self::Collection { .. } => Some(ResourceKind::Collections),
            Self::Items { .. } | Self::Item { .. } | Self::BulkItems { .. } | Self::Search => {
                Some(ResourceKind::Items)
            }
        }
    }

    /// Returns true for routes that carry the authentication extension.
    #[must_use]
    pub const fn is_catalog_document(&self) -> bool {
        !matches!(self, Self::BulkItems { .. })
    }

    /// Returns `collection_id` and `item_id` parameters.
    #[must_use]
    pub fn path_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        match self {
            Self::Collection {
                collection_id,
            }
            | Self::Items {
                collection_id,
            }
            | Self::BulkItems {
                collection_id,
            } => {
                params.insert("collection_id".to_string(), (*collection_id).to_string());
            }
            Self::Item {
                collection_id,
                item_id,
            } => {
                params.insert("collection_id".to_string(), (*collection_id).to_string());
                params.insert("item_id".to_string(), (*item_id).to_string());
            }
            Self::Landing | Self::Collections | Self::Search => {}
        }
        params
    }
}

// ============================================================================
// SECTION: Filter Actions
// ============================================================================

/// How a predicate is enforced for a route and method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// Listing or search: merge into the query or body.
    Listing,
    /// Single-record read: validate the response.
    Record,
    /// Creation of a new record.
    Create,
    /// Replacement (`PUT`) of an existing record.
    Replace,
    /// Partial update (`PATCH`) of an existing record.
    Patch,
    /// Deletion of an existing record.
    Delete,
    /// Mutating request with no defined enforcement.
    Unsupported,
}

impl FilterAction {
    /// Returns true for actions that change upstream state.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(self, Self::Create | Self::Replace | Self::Patch | Self::Delete | Self::Unsupported)
    }
}

/// Returns the filter action for `route` and `method`, or `None` when the
/// request needs no predicate.
#[must_use]
pub fn filter_action(route: &StacRoute<'_>, method: &Method) -> Option<FilterAction> {
    let read = *method == Method::GET || *method == Method::HEAD;
    let write = *method == Method::POST
        || *method == Method::PUT
        || *method == Method::PATCH
        || *method == Method::DELETE;
    match route {
        StacRoute::Landing => None,
        StacRoute::Search => {
            (read || *method == Method::POST).then_some(FilterAction::Listing)
        }
        StacRoute::Collections | StacRoute::Items { .. } if read => Some(FilterAction::Listing),
        StacRoute::Collection { .. } | StacRoute::Item { .. } if read => {
            Some(FilterAction::Record)
        }
        StacRoute::Collections | StacRoute::Items { .. } | StacRoute::BulkItems { .. }
            if *method == Method::POST =>
        {
            Some(FilterAction::Create)
        }
        StacRoute::Collection { .. } | StacRoute::Item { .. } if *method == Method::PUT => {
            Some(FilterAction::Replace)
        }
        StacRoute::Collection { .. } | StacRoute::Item { .. } if *method == Method::PATCH => {
            Some(FilterAction::Patch)
        }
        StacRoute::Collection { .. } | StacRoute::Item { .. } if *method == Method::DELETE => {
            Some(FilterAction::Delete)
        }
        _ if write => Some(FilterAction::Unsupported),
        _ => None,
    }
}

#[cfg(test)]
mod tests;
