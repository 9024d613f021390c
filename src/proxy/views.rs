use pingora::http::RequestHeader;

/// Borrowed view of the inbound request, read before the upstream copy
/// is rewritten.
pub struct RequestView<'a> {
    inner: &'a RequestHeader,
}

impl<'a> RequestView<'a> {
    pub fn new(request_header: &'a RequestHeader) -> Self {
        Self {
            inner: request_header,
        }
    }

    pub fn method(&self) -> &'a str {
        self.inner.method.as_str()
    }

    pub fn path(&self) -> &'a str {
        self.inner.uri.path()
    }

    // HTTP/2 requests may only carry `:authority`
    pub fn host(&self) -> Option<&'a str> {
        self.header("host")
            .or_else(|| self.inner.uri.authority().map(|a| a.as_str()))
    }

    pub fn header(&self, key: &str) -> Option<&'a str> {
        self.inner.headers.get(key).and_then(|h| h.to_str().ok())
    }
}
