//! Request lifecycle: one GET at a time, outcome published as text.
//!
//! # Design
//! All mutation of `state` and of the output value happens while holding the
//! `state` mutex: `submit` publishes the busy message, flips to `InFlight`
//! and spawns the fetch under the lock, and the spawned task takes the same
//! lock to record the outcome. The InFlight check and the completion can
//! therefore never interleave, and the busy message is always published
//! before the outcome of the same submit.
//!
//! The fetch runs on the runtime `Handle` captured at construction, so
//! `submit` can be called from threads that are not inside the runtime
//! (such as a host UI thread).

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::{RequestError, TransportError};
use crate::fetch::Fetcher;
use crate::format::pretty_print;
use crate::observable::ObservableValue;

/// Published synchronously by every accepted `submit`.
pub const BUSY_MESSAGE: &str = "Performing GET request ...";

/// Where a coordinator is in its request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    InFlight,
    Succeeded(String),
    Failed(String),
}

impl RequestState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RequestState::InFlight)
    }
}

struct Shared {
    endpoint: Endpoint,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<RequestState>,
    output: ObservableValue<String>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, RequestState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The single write path for terminal transitions.
    fn complete(&self, outcome: Result<String, RequestError>) {
        let mut state = self.lock_state();
        match outcome {
            Ok(formatted) => {
                info!(bytes = formatted.len(), "RequestCoordinator: request succeeded");
                *state = RequestState::Succeeded(formatted.clone());
                self.output.publish(formatted);
            }
            Err(err) => {
                let message = err.to_string();
                warn!(error = %message, "RequestCoordinator: request failed");
                *state = RequestState::Failed(message.clone());
                self.output.publish(message);
            }
        }
    }
}

/// Owns the in-flight state and the published output stream.
///
/// Cloning yields another handle to the same coordinator.
#[derive(Clone)]
pub struct RequestCoordinator {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl RequestCoordinator {
    pub fn new(endpoint: Endpoint, fetcher: Arc<dyn Fetcher>, runtime: Handle) -> Self {
        debug!(url = %endpoint.url(), "RequestCoordinator::new: called");
        Self {
            shared: Arc::new(Shared {
                endpoint,
                fetcher,
                state: Mutex::new(RequestState::Idle),
                output: ObservableValue::new(),
            }),
            runtime,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> RequestState {
        self.shared.lock_state().clone()
    }

    /// Read-only view of the published output.
    pub fn observe(&self) -> ObservableValue<String> {
        self.shared.output.clone()
    }

    /// Start a request unless one is already in flight.
    ///
    /// Returns `true` if a fetch was started, `false` if the call was ignored.
    pub fn submit(&self) -> bool {
        let mut state = self.shared.lock_state();
        if state.is_in_flight() {
            debug!("RequestCoordinator::submit: ignored, request in flight");
            return false;
        }

        self.shared.output.publish(BUSY_MESSAGE.to_string());
        *state = RequestState::InFlight;

        let url = self.shared.endpoint.url();
        info!(%url, "RequestCoordinator::submit: starting request");

        let shared = Arc::clone(&self.shared);
        let task = self.runtime.spawn(async move { run_request(shared.fetcher.as_ref(), &url).await });

        // Watch the task so a panicking fetcher still clears InFlight.
        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(TransportError::Aborted(join_err.to_string()).into()),
            };
            shared.complete(outcome);
        });

        true
    }
}

async fn run_request(fetcher: &dyn Fetcher, url: &str) -> Result<String, RequestError> {
    let raw = fetcher.fetch(url).await?;
    debug!(bytes = raw.len(), "run_request: fetched");
    Ok(pretty_print(&raw)?)
}
