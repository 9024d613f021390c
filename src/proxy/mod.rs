use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info, warn};
use pingora::http::{RequestHeader, ResponseHeader};
use pingora::prelude::*;
use pingora::proxy::{ProxyHttp, Session};
use std::time::Instant;

use crate::proxy::ctx::Ctx;
use crate::proxy::forward::{Target, rewrite_request};
use crate::proxy::headers::HeaderPolicy;
use crate::proxy::views::RequestView;
use crate::router::{PING_PATH, Router};

pub mod ctx;
pub mod forward;
pub mod headers;
pub mod views;

const PONG: &[u8] = b"pong";

/// Round-robin reverse proxy over the configured endpoints.
pub struct BalancerProxy {
    router: Router,
    header_policy: HeaderPolicy,
}

impl BalancerProxy {
    pub fn new(router: Router) -> Self {
        if router.is_empty() {
            warn!("No endpoints registered, only {} will be served", PING_PATH);
        }

        Self {
            router,
            header_policy: HeaderPolicy::new(),
        }
    }

    /// Picks the destination for a request. The first call advances the
    /// matched pool and pins the result in `ctx`; later calls for the same
    /// request return the pinned target, so a request never moves to
    /// another backend.
    pub fn route(&self, path: &str, ctx: &mut Ctx) -> Result<Target> {
        if let Some(target) = &ctx.target {
            return Ok(target.clone());
        }

        let dispatch = self.router.dispatch(path).ok_or_else(|| {
            Error::explain(ErrorType::HTTPStatus(404), format!("no route for path {}", path))
        })?;
        ctx.endpoint = Some(dispatch.endpoint.to_string());

        info!(
            "Received request for {}, forwarding to {}",
            dispatch.endpoint, dispatch.destination
        );

        let target = Target::parse(dispatch.destination)?;
        ctx.target = Some(target.clone());
        Ok(target)
    }

    async fn respond_pong(session: &mut Session) -> Result<()> {
        let mut response = ResponseHeader::build(200, Some(2))?;
        response.insert_header(http::header::CONTENT_TYPE, "text/plain")?;
        response.insert_header(http::header::CONTENT_LENGTH, PONG.len())?;
        session
            .write_response_header(Box::new(response), false)
            .await?;
        session
            .write_response_body(Some(Bytes::from_static(PONG)), true)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProxyHttp for BalancerProxy {
    type CTX = Ctx;

    fn new_ctx(&self) -> Self::CTX {
        Ctx::default()
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        ctx.start = Some(Instant::now());

        if RequestView::new(session.req_header()).path() == PING_PATH {
            Self::respond_pong(session).await?;
            return Ok(true);
        }

        Ok(false)
    }

    async fn upstream_peer(
        &self,
        session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let target = self.route(RequestView::new(session.req_header()).path(), ctx)?;
        let peer = target.peer().await?;
        Ok(Box::new(peer))
    }

    async fn upstream_request_filter(
        &self,
        session: &mut Session,
        upstream_request: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        let (Some(target), Some(endpoint)) = (ctx.target.as_ref(), ctx.endpoint.as_deref()) else {
            return Error::e_explain(
                ErrorType::InternalError,
                "no destination selected for upstream request",
            );
        };

        let view = RequestView::new(session.req_header());
        let client_ip = session
            .client_addr()
            .and_then(|addr| addr.as_inet())
            .map(|addr| addr.ip().to_string());

        rewrite_request(upstream_request, target, endpoint)?;
        self.header_policy.apply_upstream_request_headers(
            upstream_request,
            view.host(),
            client_ip.as_deref(),
            target,
        )?;

        debug!(
            "Redirecting {} request to {}{}",
            view.method(),
            target.address(),
            upstream_request.uri
        );
        Ok(())
    }

    fn fail_to_connect(
        &self,
        _session: &mut Session,
        _peer: &HttpPeer,
        ctx: &mut Self::CTX,
        mut e: Box<Error>,
    ) -> Box<Error> {
        warn!(
            "Upstream {} unavailable for {}: {}",
            ctx.target
                .as_ref()
                .map(|t| t.address())
                .unwrap_or_default(),
            ctx.endpoint.as_deref().unwrap_or("-"),
            e
        );
        // failures go back to the caller, never to another pool member
        e.set_retry(false);
        e
    }

    async fn logging(&self, session: &mut Session, error: Option<&Error>, ctx: &mut Self::CTX) {
        let response_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(0);
        let elapsed_ms = ctx
            .start
            .map(|start| start.elapsed().as_millis())
            .unwrap_or(0);

        if let Some(e) = error {
            if is_caller_disconnect(e) {
                debug!("Caller went away: {}", e);
            } else {
                warn!("Request failed: {}", e);
            }
        }

        info!(
            "{} {} status: {} endpoint: {} destination: {} {}ms",
            session.req_header().method,
            session.req_header().uri,
            response_code,
            ctx.endpoint.as_deref().unwrap_or("-"),
            ctx.target
                .as_ref()
                .map(|t| t.url().as_str())
                .unwrap_or("-"),
            elapsed_ms
        );
    }
}

/// Errors raised on the downstream side are the caller leaving, not a
/// proxy or backend failure.
fn is_caller_disconnect(e: &Error) -> bool {
    matches!(e.esource(), ErrorSource::Downstream)
}
