// tests/properties.rs

use proptest::prelude::*;
use skillrun::env::{EnvMap, overlay};
use skillrun::exec::network::{HOST_ALIAS, rewrite_loopback};
use skillrun::types::HostPlatform;

fn env_map() -> impl Strategy<Value = EnvMap> {
    proptest::collection::btree_map("[A-Z_]{1,6}", "[a-z0-9]{0,8}", 0..8)
}

proptest! {
    // Every key of the top layer ends up with the top layer's value; every
    // other key keeps its base value.
    #[test]
    fn overlay_prefers_top_layer(base in env_map(), top in env_map()) {
        let merged = overlay(&base, &top);

        for (k, v) in &top {
            prop_assert_eq!(merged.get(k), Some(v));
        }
        for (k, v) in &base {
            if !top.contains_key(k) {
                prop_assert_eq!(merged.get(k), Some(v));
            }
        }
        prop_assert!(merged.keys().all(|k| base.contains_key(k) || top.contains_key(k)));
    }

    #[test]
    fn loopback_urls_point_at_host_alias_off_linux(port in 1u16..=65535, path in "(/[a-z]{1,5}){0,3}") {
        for host in ["127.0.0.1", "localhost"] {
            let url = format!("http://{host}:{port}{path}");

            let rewritten = rewrite_loopback(&url, HostPlatform::Other);
            prop_assert_eq!(rewritten, format!("http://{HOST_ALIAS}:{port}{path}"));

            prop_assert_eq!(rewrite_loopback(&url, HostPlatform::Linux), url);
        }
    }

    #[test]
    fn non_loopback_hosts_are_never_rewritten(host in "[a-k]{1,8}\\.example", port in 1u16..=65535) {
        let url = format!("http://{host}:{port}");
        prop_assert_eq!(rewrite_loopback(&url, HostPlatform::Other), url);
    }
}
