//! A single upstream gateway instance.

use axum::http::uri::{Authority, Scheme};
use axum::http::Uri;
use std::str::FromStr;
use url::Url;

use crate::load_balancer::proxy::ProxyError;

/// An upstream instance the balancer forwards to.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Configured base URL.
    pub base_url: Url,
    /// `host:port` the rewritten URI points at.
    pub authority: Authority,
}

impl Backend {
    /// Parse a configured backend address. Only plain `http` is supported.
    pub fn parse(raw: &str) -> Result<Self, ProxyError> {
        let invalid = |reason: &str| ProxyError::InvalidBackend {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let base_url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        if base_url.scheme() != "http" {
            return Err(invalid("only http backends are supported"));
        }
        let host = base_url.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = base_url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;
        let authority =
            Authority::from_str(&format!("{host}:{port}")).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            base_url,
            authority,
        })
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &str {
        self.authority.as_str()
    }

    /// `original`'s path and query, pointed at this backend.
    pub fn uri_for(&self, original: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = original
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_rewrite() {
        let backend = Backend::parse("http://api-gateway-1:9999").unwrap();
        assert_eq!(backend.label(), "api-gateway-1:9999");

        let original: Uri = "/payments-summary?from=2025-01-01T00:00:00Z".parse().unwrap();
        let uri = backend.uri_for(&original).unwrap();
        assert_eq!(
            uri.to_string(),
            "http://api-gateway-1:9999/payments-summary?from=2025-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_default_port() {
        let backend = Backend::parse("http://gateway").unwrap();
        assert_eq!(backend.label(), "gateway:80");
    }

    #[test]
    fn test_rejects_unsupported() {
        assert!(matches!(
            Backend::parse("https://gateway:443"),
            Err(ProxyError::InvalidBackend { .. })
        ));
        assert!(Backend::parse("not a url").is_err());
    }
}
