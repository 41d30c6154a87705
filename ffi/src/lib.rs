//! C-ABI wrapper around `quake-core`.
//!
//! # Overview
//! Lets a native host (for example a mobile UI layer) drive a
//! `RequestCoordinator`: create it, forward "submit" clicks, and receive
//! every published string through a callback.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Each coordinator owns a multi-thread tokio runtime; `submit` may be
//!   called from any host thread.
//! - A subscription is a runtime task forwarding from a core `Subscription`
//!   into the host callback. Callbacks run on runtime threads, one message
//!   at a time per subscription, in publish order.
//! - The C caller owns returned pointers and must release them with the
//!   matching `quake_*_free` function.

pub mod types;

use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use quake_core::{Endpoint, RequestCoordinator, UreqFetcher};
use tracing::{debug, warn};

use types::*;

// ---------------------------------------------------------------------------
// Coordinator lifecycle
// ---------------------------------------------------------------------------

/// Create a coordinator.
///
/// `config_json` may be null, in which case the default endpoint is used.
/// Otherwise it is a JSON object such as
/// `{"base_url":"http://api.geonames.org","username":"demo"}`; omitted
/// fields take their defaults.
///
/// Returns null if the config is not valid UTF-8 or JSON, if the runtime
/// cannot be started, or if an internal panic occurs. Free the result with
/// `quake_coordinator_free`.
#[unsafe(no_mangle)]
pub extern "C" fn quake_coordinator_new(config_json: *const c_char) -> *mut FfiCoordinator {
    catch_unwind(AssertUnwindSafe(|| {
        let endpoint = if config_json.is_null() {
            Endpoint::default()
        } else {
            let raw = match unsafe { CStr::from_ptr(config_json) }.to_str() {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "quake_coordinator_new: config is not UTF-8");
                    return std::ptr::null_mut();
                }
            };
            match Endpoint::from_json(raw) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    warn!(error = %e, "quake_coordinator_new: invalid config");
                    return std::ptr::null_mut();
                }
            }
        };

        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("quake-ffi")
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "quake_coordinator_new: runtime failed to start");
                return std::ptr::null_mut();
            }
        };

        let inner = RequestCoordinator::new(endpoint, Arc::new(UreqFetcher::new()), runtime.handle().clone());
        debug!(url = %inner.endpoint().url(), "quake_coordinator_new: created");
        Box::into_raw(Box::new(FfiCoordinator {
            runtime,
            inner,
            forwarders: Mutex::new(HashMap::new()),
        }))
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Free a coordinator created by `quake_coordinator_new`. Safe to call with
/// null. An in-flight request is abandoned. Blocks until any running callback
/// returns; no callback fires after this returns. Must not be called from
/// inside a callback.
#[unsafe(no_mangle)]
pub extern "C" fn quake_coordinator_free(coordinator: *mut FfiCoordinator) {
    if coordinator.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let coordinator = unsafe { Box::from_raw(coordinator) };
        for (_, forwarder) in coordinator.forwarders().drain() {
            forwarder.close();
        }
        let FfiCoordinator { runtime, inner, .. } = *coordinator;
        drop(inner);
        runtime.shutdown_background();
    }));
}

// ---------------------------------------------------------------------------
// Requests and state
// ---------------------------------------------------------------------------

/// Forward a user "submit" event.
///
/// Returns true if a request was started, false if one is already in flight
/// or `coordinator` is null.
#[unsafe(no_mangle)]
pub extern "C" fn quake_coordinator_submit(coordinator: *const FfiCoordinator) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if coordinator.is_null() {
            return false;
        }
        let coordinator = unsafe { &*coordinator };
        coordinator.inner.submit()
    }))
    .unwrap_or(false)
}

/// Current lifecycle state, or `Invalid` if `coordinator` is null.
#[unsafe(no_mangle)]
pub extern "C" fn quake_coordinator_state(coordinator: *const FfiCoordinator) -> FfiRequestState {
    catch_unwind(AssertUnwindSafe(|| {
        if coordinator.is_null() {
            return FfiRequestState::Invalid;
        }
        let coordinator = unsafe { &*coordinator };
        FfiRequestState::from(&coordinator.inner.state())
    }))
    .unwrap_or(FfiRequestState::Invalid)
}

/// Copy of the most recently published string, or null if nothing has been
/// published yet. Free the result with `quake_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn quake_coordinator_latest(coordinator: *const FfiCoordinator) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if coordinator.is_null() {
            return std::ptr::null_mut();
        }
        let coordinator = unsafe { &*coordinator };
        match coordinator.inner.observe().latest() {
            Some(latest) => to_c_string(latest).into_raw(),
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Register `callback` for every published string, starting with the latest
/// one if any. `user_data` is passed back untouched and must stay valid until
/// `quake_coordinator_unsubscribe` or `quake_coordinator_free`.
///
/// Returns a non-zero subscription id, or 0 if `coordinator` or `callback`
/// is null.
#[unsafe(no_mangle)]
pub extern "C" fn quake_coordinator_subscribe(
    coordinator: *const FfiCoordinator,
    callback: Option<FfiPublishCallback>,
    user_data: *mut c_void,
) -> u64 {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(callback) = callback else {
            return 0;
        };
        if coordinator.is_null() {
            return 0;
        }
        let coordinator = unsafe { &*coordinator };
        let mut subscription = coordinator.inner.observe().subscribe();
        let id = subscription.id();
        let user_data = UserData::new(user_data);
        let gate = CallbackGate::open();

        let task_gate = gate.clone();
        let task = coordinator.runtime.spawn(async move {
            while let Some(message) = subscription.recv().await {
                let message = to_c_string(message);
                if !task_gate.run(|| callback(user_data.as_ptr(), message.as_ptr())) {
                    break;
                }
            }
        });
        coordinator.forwarders().insert(id, Forwarder { task, gate });
        debug!(id, "quake_coordinator_subscribe: registered");
        id
    }))
    .unwrap_or(0)
}

/// Stop delivering to the subscription `id`. Blocks until a running callback
/// for it returns; no callback for `id` fires after this returns. Must not be
/// called from inside that subscription's callback.
///
/// Returns false if `coordinator` is null or `id` is unknown.
#[unsafe(no_mangle)]
pub extern "C" fn quake_coordinator_unsubscribe(coordinator: *const FfiCoordinator, id: u64) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if coordinator.is_null() {
            return false;
        }
        let coordinator = unsafe { &*coordinator };
        let Some(forwarder) = coordinator.forwarders().remove(&id) else {
            return false;
        };
        coordinator.inner.observe().unsubscribe(id);
        forwarder.close();
        debug!(id, "quake_coordinator_unsubscribe: removed");
        true
    }))
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a string returned by `quake_coordinator_latest`. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn quake_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        drop(unsafe { std::ffi::CString::from_raw(s) });
    }));
}
