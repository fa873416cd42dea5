use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which execution strategy produced a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Unit runs as a child process of this service.
    Local,
    /// Unit runs inside a container managed by the local daemon.
    Container,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => f.write_str("local"),
            BackendKind::Container => f.write_str("container"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "mock" => Ok(BackendKind::Local),
            "container" | "docker" => Ok(BackendKind::Container),
            other => Err(format!(
                "invalid backend kind: {other} (expected \"local\" or \"container\")"
            )),
        }
    }
}

/// Host operating system family, as far as container networking cares.
///
/// On Linux the daemon shares the host network stack closely enough that
/// loopback-bound services are reachable without an alias. Everywhere else
/// (Docker Desktop on macOS / Windows) containers must go through
/// `host.docker.internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Linux,
    Other,
}

impl HostPlatform {
    /// Platform of the running binary.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            HostPlatform::Linux
        } else {
            HostPlatform::Other
        }
    }

    pub fn is_linux(self) -> bool {
        self == HostPlatform::Linux
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        HostPlatform::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_aliases() {
        assert_eq!("mock".parse::<BackendKind>(), Ok(BackendKind::Local));
        assert_eq!(" Docker ".parse::<BackendKind>(), Ok(BackendKind::Container));
        assert!("vm".parse::<BackendKind>().is_err());
    }

    #[test]
    fn backend_kind_serialises_lowercase() {
        let json = serde_json::to_string(&BackendKind::Container).unwrap();
        assert_eq!(json, "\"container\"");
    }
}
