//! Asynchronous GET transport.
//!
//! # Design
//! `Fetcher` is the coordinator's only I/O seam. The production
//! `UreqFetcher` drives ureq's blocking agent on tokio's blocking pool, so the
//! runtime threads stay free while the request is outstanding. Tests plug in
//! their own `Fetcher` to script outcomes and count invocations.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::http::HttpResponse;

/// Performs one GET and returns the response body as text.
///
/// Implementations make a single attempt per call: no retries, no caching.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, TransportError>;
}

/// `Fetcher` backed by a `ureq::Agent`.
#[derive(Clone)]
pub struct UreqFetcher {
    agent: ureq::Agent,
}

impl Default for UreqFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqFetcher {
    pub fn new() -> Self {
        // Statuses are interpreted by `HttpResponse`, not by ureq.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

#[async_trait]
impl Fetcher for UreqFetcher {
    async fn fetch(&self, url: &str) -> Result<String, TransportError> {
        debug!(%url, "UreqFetcher::fetch: called");
        let agent = self.agent.clone();
        let target = url.to_string();
        let response = tokio::task::spawn_blocking(move || execute(&agent, &target))
            .await
            .map_err(|e| TransportError::Aborted(e.to_string()))??;

        debug!(status = response.status, bytes = response.body.len(), "UreqFetcher::fetch: response");
        response.into_body().inspect_err(|e| warn!(error = %e, "UreqFetcher::fetch: rejected"))
    }
}

fn execute(agent: &ureq::Agent, url: &str) -> Result<HttpResponse, TransportError> {
    let mut response = agent.get(url).call()?;
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| TransportError::Body(e.to_string()))?;
    Ok(HttpResponse { status, body })
}
