// crates/stac-auth-proxy/src/routing/tests.rs
// ============================================================================
// Module: STAC Route Unit Tests
// Description: Route recognition, parameters, and filter actions.
// Purpose: Keep binding selection aligned with catalog URL shapes.
// Dependencies: super
// ============================================================================

use axum::http::Method;

use super::FilterAction;
use super::ResourceKind;
use super::StacRoute;
use super::filter_action;

#[test]
fn recognizes_catalog_routes() {
    assert_eq!(StacRoute::parse("/"), Some(StacRoute::Landing));
    assert_eq!(StacRoute::parse("/search"), Some(StacRoute::Search));
    assert_eq!(
        StacRoute::parse("/collections/a/items/b"),
        Some(StacRoute::Item {
            collection_id: "a",
            item_id: "b",
        })
    );
    assert_eq!(StacRoute::parse("/collections/"), None);
    assert_eq!(StacRoute::parse("/collections/a/items/b/extra"), None);
    assert_eq!(StacRoute::parse("/queryables"), None);
}

#[test]
fn kinds_split_items_from_collections() {
    assert_eq!(StacRoute::Collections.kind(), Some(ResourceKind::Collections));
    assert_eq!(StacRoute::Search.kind(), Some(ResourceKind::Items));
    assert_eq!(StacRoute::Landing.kind(), None);
}

#[test]
fn path_params_name_both_identifiers() {
    let route = StacRoute::Item {
        collection_id: "landsat",
        item_id: "scene-1",
    };
    let params = route.path_params();
    assert_eq!(params.get("collection_id").map(String::as_str), Some("landsat"));
    assert_eq!(params.get("item_id").map(String::as_str), Some("scene-1"));
    assert!(StacRoute::Search.path_params().is_empty());
}

#[test]
fn actions_follow_method_and_shape() {
    let collection = StacRoute::Collection {
        collection_id: "a",
    };
    assert_eq!(filter_action(&StacRoute::Search, &Method::POST), Some(FilterAction::Listing));
    assert_eq!(filter_action(&StacRoute::Collections, &Method::GET), Some(FilterAction::Listing));
    assert_eq!(filter_action(&collection, &Method::GET), Some(FilterAction::Record));
    assert_eq!(filter_action(&StacRoute::Collections, &Method::POST), Some(FilterAction::Create));
    assert_eq!(filter_action(&collection, &Method::PATCH), Some(FilterAction::Patch));
    assert_eq!(filter_action(&collection, &Method::DELETE), Some(FilterAction::Delete));
    assert_eq!(filter_action(&collection, &Method::POST), Some(FilterAction::Unsupported));
    assert_eq!(filter_action(&StacRoute::Collections, &Method::OPTIONS), None);
    assert_eq!(filter_action(&StacRoute::Landing, &Method::GET), None);
}

#[test]
fn only_writes_are_mutations() {
    assert!(FilterAction::Create.is_mutation());
    assert!(FilterAction::Unsupported.is_mutation());
    assert!(!FilterAction::Record.is_mutation());
}
