use pingora::http::RequestHeader;
use pingora::prelude::*;

use crate::proxy::forward::Target;

pub const FORWARDED_HOST: &str = "X-Forwarded-Host";
pub const FORWARDED_FOR: &str = "X-Forwarded-For";

/// Header mutations applied to every forwarded request. Responses pass
/// through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderPolicy;

impl HeaderPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn apply_upstream_request_headers(
        &self,
        request: &mut RequestHeader,
        original_host: Option<&str>,
        client_ip: Option<&str>,
        target: &Target,
    ) -> Result<()> {
        request.insert_header(FORWARDED_HOST, original_host.unwrap_or_default())?;
        request.insert_header(http::header::HOST, target.host_header())?;

        if let Some(ip) = client_ip {
            let forwarded_for = match request
                .headers
                .get(FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
            {
                Some(prior) => format!("{}, {}", prior, ip),
                None => ip.to_string(),
            };
            request.insert_header(FORWARDED_FOR, forwarded_for)?;
        }

        Ok(())
    }
}
