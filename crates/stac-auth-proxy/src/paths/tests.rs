// crates/stac-auth-proxy/src/paths/tests.rs
// ============================================================================
// Module: Path Rewriter Unit Tests
// Description: Prefix stripping and link rewriting rules.
// Purpose: Keep links pointing at the proxy, never around it.
// Dependencies: super, serde_json
// ============================================================================

#![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

use serde_json::json;

use super::PathRewriter;
use crate::error::ReasonCode;
use crate::exchange::ClientInfo;

fn client(host: &str) -> ClientInfo {
    ClientInfo {
        peer: None,
        scheme: "https".to_string(),
        host: Some(host.to_string()),
    }
}

#[test]
fn strip_is_segment_aligned() {
    let rewriter = PathRewriter::new("/api", "http://upstream:8080").unwrap();
    assert_eq!(rewriter.strip("/api").unwrap(), "/");
    assert_eq!(rewriter.strip("/api/collections").unwrap(), "/collections");
    assert_eq!(rewriter.strip("/apiv2/collections").unwrap_err().reason, ReasonCode::RootPathMismatch);
    assert_eq!(rewriter.strip("/collections").unwrap_err().reason, ReasonCode::RootPathMismatch);
}

#[test]
fn empty_root_passes_paths_through() {
    let rewriter = PathRewriter::new("", "http://upstream:8080").unwrap();
    assert_eq!(rewriter.strip("/search").unwrap(), "/search");
    assert_eq!(rewriter.root_path(), "");
}

#[test]
fn proxy_links_get_root_prefix_and_lose_upstream_prefix() {
    let rewriter = PathRewriter::new("/api", "http://upstream:8080/stac").unwrap();
    let href = rewriter
        .rewrite_href("https://proxy.example.com/stac/collections?limit=1#x", &client("proxy.example.com"))
        .unwrap();
    assert_eq!(href, "https://proxy.example.com/api/collections?limit=1#x");
}

#[test]
fn upstream_links_are_repointed_at_the_client_host() {
    let rewriter = PathRewriter::new("", "http://upstream:8080/stac").unwrap();
    let href =
        rewriter.rewrite_href("http://upstream:8080/stac/search", &client("proxy.example.com")).unwrap();
    assert_eq!(href, "https://proxy.example.com/search");
}

#[test]
fn foreign_and_relative_links_are_untouched() {
    let rewriter = PathRewriter::new("/api", "http://upstream:8080").unwrap();
    assert_eq!(rewriter.rewrite_href("https://other.org/x", &client("proxy")), None);
    assert_eq!(rewriter.rewrite_href("/collections", &client("proxy")), None);
}

#[test]
fn document_links_are_visited_at_every_level() {
    let rewriter = PathRewriter::new("/api", "http://upstream:8080").unwrap();
    let mut document = json!({
        "links": [{"rel": "self", "href": "http://proxy/search"}],
        "features": [{"links": [{"rel": "self", "href": "http://proxy/collections/a/items/1"}]}],
        "collections": [{"links": [{"rel": "root", "href": "http://elsewhere/"}]}],
    });
    assert!(rewriter.rewrite_links(&mut document, &client("proxy")));
    assert_eq!(document["links"][0]["href"], "http://proxy/api/search");
    assert_eq!(document["features"][0]["links"][0]["href"], "http://proxy/api/collections/a/items/1");
    assert_eq!(document["collections"][0]["links"][0]["href"], "http://elsewhere/");
}

#[test]
fn already_rooted_links_are_not_prefixed_twice() {
    let rewriter = PathRewriter::new("/api", "http://upstream:8080").unwrap();
    assert_eq!(rewriter.rewrite_href("http://proxy/api/search", &client("proxy")), None);
}
