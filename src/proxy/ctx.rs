use crate::proxy::forward::Target;
use std::time::Instant;

/// Per-request state. Once `target` is set the request is pinned to that
/// destination for its whole lifetime.
#[derive(Debug, Default)]
pub struct Ctx {
    pub endpoint: Option<String>,
    pub target: Option<Target>,
    pub start: Option<Instant>,
}
