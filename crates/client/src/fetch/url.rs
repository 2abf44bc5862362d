//! URL assembly and redirect resolution for the fetch state machine.
//!
//! URLs are always rebuilt in the canonical `scheme://authority/path` shape
//! (query and fragment dropped), so the machine can compare the URL it just
//! requested against a redirect target byte-for-byte when hunting for
//! redirect-to-self loops.

use url::Url;

/// Wire protocol for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Https,
    Http,
}

impl Protocol {
    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Https => "https",
            Protocol::Http => "http",
        }
    }

    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "https" => Some(Protocol::Https),
            "http" => Some(Protocol::Http),
            _ => None,
        }
    }
}

/// Errors turning hostnames or Location headers into attempt URLs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("cannot build URL from {raw:?}: {message}")]
    Invalid { raw: String, message: String },

    #[error("redirect to unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Where a redirect points, already broken into machine state updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    /// Canonical `scheme://authority/path` form.
    pub url: String,
    /// Authority, with the port kept when non-default.
    pub host: String,
    pub path: String,
    pub protocol: Protocol,
}

/// Build the attempt URL for `protocol://host` and `path`, forcing the path
/// to begin with `/`. Returns the canonical URL string.
pub fn assemble(protocol: Protocol, host: &str, path: &str) -> Result<String, UrlError> {
    let mut raw = String::with_capacity(host.len() + path.len() + 9);
    raw.push_str(protocol.scheme());
    raw.push_str("://");
    raw.push_str(host);
    if !path.starts_with('/') {
        raw.push('/');
    }
    raw.push_str(path);

    let parsed = Url::parse(&raw).map_err(|e| UrlError::Invalid { raw: raw.clone(), message: e.to_string() })?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::Invalid { raw, message: "empty host".to_string() });
    }
    Ok(canonical(&parsed))
}

/// Resolve a Location header against the URL that produced it.
///
/// Relative and absolute locations both work; the query string of the target
/// is dropped, matching the path-only URL shape the machine requests.
pub fn resolve_redirect(current: &str, location: &str) -> Result<RedirectTarget, UrlError> {
    let base = Url::parse(current).map_err(|e| UrlError::Invalid {
        raw: current.to_string(),
        message: format!("bad base URL: {e}"),
    })?;
    let target = base.join(location).map_err(|e| UrlError::Invalid {
        raw: location.to_string(),
        message: format!("bad redirect location: {e}"),
    })?;

    let protocol = Protocol::from_scheme(target.scheme())
        .ok_or_else(|| UrlError::UnsupportedScheme(target.scheme().to_string()))?;

    Ok(RedirectTarget {
        url: canonical(&target),
        host: authority(&target),
        path: target.path().to_string(),
        protocol,
    })
}

fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn canonical(url: &Url) -> String {
    format!("{}://{}{}", url.scheme(), authority(url), url.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_basic() {
        let url = assemble(Protocol::Https, "example.com", "/").unwrap();
        assert_eq!(url, "https://example.com/");
    }

    #[test]
    fn test_assemble_forces_leading_slash() {
        let url = assemble(Protocol::Https, "example.com", "robots.txt").unwrap();
        assert_eq!(url, "https://example.com/robots.txt");
    }

    #[test]
    fn test_assemble_http() {
        let url = assemble(Protocol::Http, "example.com", "/index.html").unwrap();
        assert_eq!(url, "http://example.com/index.html");
    }

    #[test]
    fn test_assemble_keeps_nonstandard_port() {
        let url = assemble(Protocol::Https, "example.com:8443", "/").unwrap();
        assert_eq!(url, "https://example.com:8443/");
    }

    #[test]
    fn test_assemble_empty_host_fails() {
        assert!(matches!(
            assemble(Protocol::Https, "", "/"),
            Err(UrlError::Invalid { .. })
        ));
    }

    #[test]
    fn test_resolve_absolute_redirect() {
        let target = resolve_redirect("https://foo.test/", "https://www.foo.test/").unwrap();
        assert_eq!(target.url, "https://www.foo.test/");
        assert_eq!(target.host, "www.foo.test");
        assert_eq!(target.path, "/");
        assert_eq!(target.protocol, Protocol::Https);
    }

    #[test]
    fn test_resolve_relative_redirect() {
        let target = resolve_redirect("https://example.com/a/b", "/login").unwrap();
        assert_eq!(target.url, "https://example.com/login");
        assert_eq!(target.path, "/login");
    }

    #[test]
    fn test_resolve_redirect_to_self() {
        let target = resolve_redirect("https://example.com/", "/").unwrap();
        assert_eq!(target.url, "https://example.com/");
    }

    #[test]
    fn test_resolve_drops_query() {
        let target = resolve_redirect("https://example.com/", "/next?session=1").unwrap();
        assert_eq!(target.url, "https://example.com/next");
    }

    #[test]
    fn test_resolve_https_to_http() {
        let target = resolve_redirect("https://example.com/", "http://example.com/").unwrap();
        assert_eq!(target.protocol, Protocol::Http);
        assert_eq!(target.url, "http://example.com/");
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        assert!(matches!(
            resolve_redirect("https://example.com/", "ftp://example.com/"),
            Err(UrlError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_canonical_matches_assemble() {
        // A redirect back to the requested URL must compare equal to what
        // assemble() produced, or loop detection never fires.
        let requested = assemble(Protocol::Https, "example.com", "/").unwrap();
        let target = resolve_redirect(&requested, "https://example.com/").unwrap();
        assert_eq!(requested, target.url);
    }
}
