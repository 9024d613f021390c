use http::Uri;
use pingora::http::RequestHeader;
use pingora::prelude::*;
use url::{Host, Url};

use crate::error::ForwardError;

/// A destination parsed into everything needed to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
}

impl Target {
    pub fn parse(destination: &str) -> std::result::Result<Self, ForwardError> {
        let url = Url::parse(destination).map_err(|source| ForwardError::BadUrl {
            url: destination.to_string(),
            source,
        })?;

        if url.host_str().is_none_or(str::is_empty) {
            return Err(ForwardError::MissingHost {
                url: destination.to_string(),
            });
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// `host:port` to connect to, using the scheme's default port if none is set
    pub fn address(&self) -> String {
        let port = self.url.port_or_known_default().unwrap_or(80);
        format!("{}:{}", self.url.host_str().unwrap_or_default(), port)
    }

    /// Value for the outgoing `Host` header; the port is kept only when the
    /// destination spelled it out.
    pub fn host_header(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Bare host name for SNI, without IPv6 brackets
    pub fn sni(&self) -> String {
        match self.url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => String::new(),
        }
    }

    /// Resolves the destination and builds the upstream peer. A name that
    /// does not resolve is reported as an upstream failure.
    pub async fn peer(&self) -> Result<HttpPeer> {
        let address = self.address();
        let resolved = tokio::net::lookup_host(address.as_str())
            .await
            .ok()
            .and_then(|mut addrs| addrs.next());

        match resolved {
            Some(addr) => Ok(HttpPeer::new(addr, self.is_tls(), self.sni())),
            None => {
                let mut e = Error::explain(
                    ErrorType::ConnectNoRoute,
                    format!("cannot resolve backend '{}'", address),
                );
                e.esource = ErrorSource::Upstream;
                Err(e)
            }
        }
    }

    /// Upstream path and query for an inbound request matched under `endpoint`.
    pub fn rewrite_path_and_query(&self, endpoint: &str, path: &str, query: Option<&str>) -> String {
        let mut rewritten = join_path(self.url.path(), strip_endpoint(path, endpoint));

        let query = match (self.url.query().filter(|q| !q.is_empty()), query.filter(|q| !q.is_empty())) {
            (Some(base), Some(extra)) => Some(format!("{}&{}", base, extra)),
            (Some(base), None) => Some(base.to_string()),
            (None, Some(extra)) => Some(extra.to_string()),
            (None, None) => None,
        };

        if let Some(query) = query {
            rewritten.push('?');
            rewritten.push_str(&query);
        }
        rewritten
    }
}

/// Removes `endpoint` from the left of `path` when it is a prefix.
pub fn strip_endpoint<'a>(path: &'a str, endpoint: &str) -> &'a str {
    path.strip_prefix(endpoint).unwrap_or(path)
}

/// Joins two path pieces with exactly one slash between them.
pub fn join_path(base: &str, rest: &str) -> String {
    let joined = match (base.ends_with('/'), rest.starts_with('/')) {
        (true, true) => format!("{}{}", base, &rest[1..]),
        (false, false) => format!("{}/{}", base, rest),
        _ => format!("{}{}", base, rest),
    };

    if joined.starts_with('/') {
        joined
    } else {
        format!("/{}", joined)
    }
}

/// Points `request` at `target`: replaces the URI with the rewritten path
/// and query. Header changes are left to [`super::headers::HeaderPolicy`].
pub fn rewrite_request(request: &mut RequestHeader, target: &Target, endpoint: &str) -> Result<()> {
    let path_and_query =
        target.rewrite_path_and_query(endpoint, request.uri.path(), request.uri.query());

    let uri: Uri = path_and_query.parse().map_err(|e| {
        Error::explain(
            ErrorType::InternalError,
            format!("invalid upstream uri '{}': {}", path_and_query, e),
        )
    })?;
    request.set_uri(uri);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(destination: &str) -> Target {
        Target::parse(destination).unwrap()
    }

    #[test]
    fn test_strip_endpoint() {
        assert_eq!(strip_endpoint("/api/users/5", "/api"), "/users/5");
        assert_eq!(strip_endpoint("/api", "/api"), "");
        assert_eq!(strip_endpoint("/other", "/api"), "/other");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "/users/5"), "/users/5");
        assert_eq!(join_path("/", "/users/5"), "/users/5");
        assert_eq!(join_path("/base", "/users"), "/base/users");
        assert_eq!(join_path("/base/", "users"), "/base/users");
        assert_eq!(join_path("/base", "users"), "/base/users");
        assert_eq!(join_path("/", ""), "/");
        assert_eq!(join_path("", ""), "/");
    }

    #[test]
    fn test_rewrite_path_strips_endpoint() {
        let t = target("http://b1:9000");
        assert_eq!(t.rewrite_path_and_query("/api", "/api/users/5", None), "/users/5");
        assert_eq!(t.rewrite_path_and_query("/svc", "/svc/x", None), "/x");
        assert_eq!(t.rewrite_path_and_query("/svc", "/svc", None), "/");
    }

    #[test]
    fn test_rewrite_path_appends_to_base_path() {
        let t = target("http://b1:9000/v1");
        assert_eq!(t.rewrite_path_and_query("/api", "/api/users/5", None), "/v1/users/5");

        let t = target("http://b1:9000/v1/");
        assert_eq!(t.rewrite_path_and_query("/api/", "/api/users", None), "/v1/users");
    }

    #[test]
    fn test_rewrite_merges_queries() {
        let t = target("http://b1/?token=abc");
        assert_eq!(t.rewrite_path_and_query("/a", "/a/b", Some("x=1")), "/b?token=abc&x=1");

        let t = target("http://b1");
        assert_eq!(t.rewrite_path_and_query("/a", "/a/b", Some("x=1")), "/b?x=1");
        assert_eq!(t.rewrite_path_and_query("/a", "/a/b", Some("")), "/b");
    }

    #[test]
    fn test_target_addresses() {
        let t = target("http://b1:9000");
        assert_eq!(t.address(), "b1:9000");
        assert_eq!(t.host_header(), "b1:9000");
        assert_eq!(t.sni(), "b1");
        assert!(!t.is_tls());

        let t = target("https://secure.example.com/api");
        assert_eq!(t.address(), "secure.example.com:443");
        assert_eq!(t.host_header(), "secure.example.com");
        assert!(t.is_tls());

        let t = target("http://[::1]:8080");
        assert_eq!(t.address(), "[::1]:8080");
        assert_eq!(t.sni(), "::1");
    }

    #[tokio::test]
    async fn test_peer_for_ip_destinations() {
        let peer = target("http://127.0.0.1:9000").peer().await.unwrap();
        assert!(!peer.is_tls());

        let peer = target("https://127.0.0.1").peer().await.unwrap();
        assert!(peer.is_tls());
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_upstream_error() {
        let err = target("http://no-such-host.invalid:1").peer().await.unwrap_err();
        assert_eq!(err.etype(), &ErrorType::ConnectNoRoute);
        assert!(matches!(err.esource(), ErrorSource::Upstream));
    }

    #[test]
    fn test_target_parse_errors() {
        assert!(matches!(
            Target::parse("not a url"),
            Err(ForwardError::BadUrl { .. })
        ));
        assert!(matches!(
            Target::parse("unix:/var/run/backend.sock"),
            Err(ForwardError::MissingHost { .. })
        ));
    }

    #[test]
    fn test_forward_error_is_internal_error() {
        let err: Box<Error> = Target::parse("not a url").unwrap_err().into();
        assert_eq!(err.etype(), &ErrorType::InternalError);
    }

    #[test]
    fn test_rewrite_request_uri() {
        let mut request = RequestHeader::build("GET", b"/api/users/5?page=2", None).unwrap();
        rewrite_request(&mut request, &target("http://b1:9000/base"), "/api").unwrap();

        assert_eq!(request.uri.path(), "/base/users/5");
        assert_eq!(request.uri.query(), Some("page=2"));
    }
}
