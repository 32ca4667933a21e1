//! LXD client configuration
//!
//! Every default that depends on the environment (home directory, whether
//! the snap socket exists) is resolved here, at construction time.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Default LXD endpoint
pub const DEFAULT_URL: &str = "unix:/var/lib/lxd/unix.socket";

/// Endpoint of LXD installed from the snap package
pub const DEFAULT_SNAP_URL: &str = "unix:/var/snap/lxd/common/lxd/unix.socket";

const UNIX_SCHEME: &str = "unix:";

/// Where the LXD API is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Local unix socket
    UnixSocket(PathBuf),
    /// Remote HTTPS server, without trailing slash
    Https(String),
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self> {
        if let Some(path) = url.strip_prefix(UNIX_SCHEME) {
            if path.is_empty() {
                return Err(Error::Configuration(format!("invalid unix socket url: {}", url)));
            }
            return Ok(Endpoint::UnixSocket(PathBuf::from(path)));
        }
        if url.starts_with("https://") {
            return Ok(Endpoint::Https(url.trim_end_matches('/').to_string()));
        }
        Err(Error::Configuration(format!(
            "unsupported LXD url {} (expected unix:<path> or https://<host>)",
            url
        )))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::UnixSocket(path) => write!(f, "{}{}", UNIX_SCHEME, path.display()),
            Endpoint::Https(url) => write!(f, "{}", url),
        }
    }
}

/// Configuration for [`super::LxdClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Unix socket path or HTTPS url
    pub url: String,
    /// Socket used instead of the default url when it exists
    pub snap_url: String,
    /// Client certificate; defaults to `{home}/.config/lxc/client.crt`
    pub client_cert: Option<PathBuf>,
    /// Client key; defaults to `{home}/.config/lxc/client.key`
    pub client_key: Option<PathBuf>,
    /// Home directory used for the certificate defaults
    pub home: Option<PathBuf>,
    /// Record every request and response
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            snap_url: DEFAULT_SNAP_URL.to_string(),
            client_cert: None,
            client_key: None,
            home: None,
            debug: false,
        }
    }
}

impl ClientConfig {
    /// Pick the endpoint. An explicit url wins; otherwise the snap socket is
    /// preferred when `socket_exists` reports it present.
    pub fn resolve_endpoint(&self, socket_exists: impl Fn(&Path) -> bool) -> Result<Endpoint> {
        if self.url != DEFAULT_URL {
            return Endpoint::parse(&self.url);
        }

        let snap_socket = self
            .snap_url
            .strip_prefix(UNIX_SCHEME)
            .unwrap_or(&self.snap_url);
        if socket_exists(Path::new(snap_socket)) {
            return Endpoint::parse(&self.snap_url);
        }

        Endpoint::parse(&self.url)
    }

    pub fn cert_path(&self) -> Option<PathBuf> {
        self.client_cert
            .clone()
            .or_else(|| self.default_lxc_file("client.crt"))
    }

    pub fn key_path(&self) -> Option<PathBuf> {
        self.client_key
            .clone()
            .or_else(|| self.default_lxc_file("client.key"))
    }

    fn default_lxc_file(&self, file: &str) -> Option<PathBuf> {
        self.home
            .as_ref()
            .map(|home| home.join(".config").join("lxc").join(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_explicit_url_wins() {
        let config = ClientConfig {
            url: "https://lxd.example.com:8443/".into(),
            ..Default::default()
        };

        let endpoint = config.resolve_endpoint(|_| true).unwrap();
        assert_eq!(endpoint, Endpoint::Https("https://lxd.example.com:8443".into()));
    }

    #[test]
    fn test_snap_socket_preferred_when_present() {
        let config = ClientConfig::default();

        let endpoint = config
            .resolve_endpoint(|p| p == Path::new("/var/snap/lxd/common/lxd/unix.socket"))
            .unwrap();
        assert_eq!(
            endpoint,
            Endpoint::UnixSocket("/var/snap/lxd/common/lxd/unix.socket".into())
        );

        let endpoint = config.resolve_endpoint(|_| false).unwrap();
        assert_eq!(endpoint, Endpoint::UnixSocket("/var/lib/lxd/unix.socket".into()));
        assert_eq!(endpoint.to_string(), DEFAULT_URL);
    }

    #[test]
    fn test_unsupported_url() {
        assert_matches!(Endpoint::parse("http://lxd"), Err(Error::Configuration(_)));
        assert_matches!(Endpoint::parse("unix:"), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_certificate_defaults_from_home() {
        let config = ClientConfig {
            home: Some("/home/ops".into()),
            client_key: Some("/etc/lxd/key.pem".into()),
            ..Default::default()
        };

        assert_eq!(
            config.cert_path(),
            Some(PathBuf::from("/home/ops/.config/lxc/client.crt"))
        );
        assert_eq!(config.key_path(), Some(PathBuf::from("/etc/lxd/key.pem")));
        assert_eq!(ClientConfig::default().cert_path(), None);
    }
}
