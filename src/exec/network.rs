// src/exec/network.rs

//! Address rules for reaching the host service from inside a container.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::HostPlatform;

/// Name containers use for the host machine.
pub const HOST_ALIAS: &str = "host.docker.internal";

static LOOPBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(127\.0\.0\.1|localhost)\b").unwrap_or_else(|e| panic!("loopback pattern: {e}"))
});

/// Replace loopback host references in `value` with [`HOST_ALIAS`].
///
/// Only applied off Linux; on Linux the value is returned as is.
pub fn rewrite_loopback(value: &str, platform: HostPlatform) -> String {
    if platform.is_linux() {
        return value.to_string();
    }
    LOOPBACK.replace_all(value, HOST_ALIAS).into_owned()
}

/// Extra `/etc/hosts` entries for a container on `platform`.
pub fn extra_hosts(platform: HostPlatform) -> Vec<String> {
    if platform.is_linux() {
        Vec::new()
    } else {
        vec![format!("{HOST_ALIAS}:host-gateway")]
    }
}
