use std::sync::Arc;

use async_trait::async_trait;
use pingora::http::ResponseHeader;
use pingora::prelude::*;

use crate::endpoint::SharedEndpoint;
use crate::metric::Metrics;

/// Forwards every incoming request to the currently selected endpoint.
///
/// The target is read once per request; there is no retry and no alternate
/// target. While no endpoint is known yet the request fails with 503.
pub struct PrimaryProxy {
    endpoint: SharedEndpoint,
    metrics: Arc<Metrics>,
}

impl PrimaryProxy {
    pub fn new(endpoint: SharedEndpoint, metrics: Arc<Metrics>) -> Self {
        PrimaryProxy { endpoint, metrics }
    }
}

#[async_trait]
impl ProxyHttp for PrimaryProxy {
    /// The target the request was forwarded to, for response accounting.
    type CTX = Option<String>;

    fn new_ctx(&self) -> Self::CTX {
        None
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let endpoint = self
            .endpoint
            .get()
            .ok_or_else(|| Error::explain(ErrorType::HTTPStatus(503), "no endpoint available"))?;

        let target = endpoint.full_address();
        log::trace!("forwarding to {target}");
        *ctx = Some(target.clone());

        Ok(Box::new(HttpPeer::new(
            target,
            false, // plain HTTP to the upstream
            String::new(),
        )))
    }

    async fn response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()>
    where
        Self::CTX: Send + Sync,
    {
        if let Some(target) = ctx.as_ref() {
            self.metrics
                .record(target, upstream_response.status.as_u16());
        }
        Ok(())
    }
}
