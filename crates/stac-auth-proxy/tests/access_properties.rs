// crates/stac-auth-proxy/tests/access_properties.rs
// ============================================================================
// Module: Access and Path Property Tests
// Description: Property checks for rule classification and link rewriting.
// Purpose: Hold visibility and rewrite invariants over arbitrary paths.
// Dependencies: stac-auth-proxy, proptest
// ============================================================================

//! Property tests for the access rule table and the path rewriter.

#![allow(clippy::unwrap_used, reason = "Test-only assertions use unwrap for clarity.")]

use proptest::prelude::*;
use stac_auth_proxy::AccessRuleTable;
use stac_auth_proxy::ClientInfo;
use stac_auth_proxy::PathRewriter;
use stac_auth_proxy_config::AccessConfig;
use stac_auth_proxy_config::EndpointRule;

fn segments() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9_-]{1,12}", 0..5).prop_map(|parts| format!("/{}", parts.join("/")))
}

fn method() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE"])
}

fn client() -> ClientInfo {
    ClientInfo {
        peer: None,
        scheme: "https".to_string(),
        host: Some("proxy.example".to_string()),
    }
}

proptest! {
    #[test]
    fn empty_tables_fall_back_to_the_default(path in segments(), method in method(), default_public in any::<bool>()) {
        let table = AccessRuleTable::from_config(&AccessConfig {
            default_public,
            public_endpoints: Vec::new(),
            private_endpoints: Vec::new(),
        })
        .unwrap();
        prop_assert_eq!(table.classify(&path, method).is_private(), !default_public);
    }

    #[test]
    fn only_the_authoritative_table_decides_visibility(path in segments(), method in method()) {
        let catch_all = vec![EndpointRule::new(".*", &["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE"])];
        let public_default = AccessRuleTable::from_config(&AccessConfig {
            default_public: true,
            public_endpoints: Vec::new(),
            private_endpoints: catch_all.clone(),
        })
        .unwrap();
        prop_assert!(public_default.classify(&path, method).is_private());
        let private_default = AccessRuleTable::from_config(&AccessConfig {
            default_public: false,
            public_endpoints: catch_all.clone(),
            private_endpoints: catch_all,
        })
        .unwrap();
        prop_assert!(!private_default.classify(&path, method).is_private());
    }

    #[test]
    fn stripping_inverts_prefixing(path in segments()) {
        let rewriter = PathRewriter::new("/stac", "http://upstream:8080").unwrap();
        prop_assert_eq!(rewriter.strip(&format!("/stac{path}")).unwrap(), path);
    }

    #[test]
    fn link_rewriting_is_idempotent(path in segments(), query in proptest::option::of("[a-z]{1,6}=[0-9]{1,3}")) {
        let rewriter = PathRewriter::new("/stac", "http://upstream:8080/api").unwrap();
        let mut href = format!("http://upstream:8080/api{path}");
        if let Some(query) = &query {
            href.push('?');
            href.push_str(query);
        }
        let once = rewriter.rewrite_href(&href, &client()).unwrap();
        prop_assert!(once.starts_with("https://proxy.example/stac"));
        prop_assert_eq!(rewriter.rewrite_href(&once, &client()), None);
    }
}
