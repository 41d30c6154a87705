//! C-compatible types for the FFI boundary.
//!
//! # Design
//! The coordinator handle is opaque to C; only the state enum and the
//! callback signature are part of the ABI. Strings handed to C are
//! NUL-terminated copies the caller frees with `quake_free_string`, except
//! the callback argument, which is only valid for the duration of the call.

use std::collections::HashMap;
use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::sync::{Arc, Mutex, MutexGuard};

use quake_core::{RequestCoordinator, RequestState, SubscriptionId};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

/// Receives every published string. `message` is borrowed for the call only.
pub type FfiPublishCallback = extern "C" fn(user_data: *mut c_void, message: *const c_char);

/// Opaque handle to a coordinator and the runtime its requests run on.
pub struct FfiCoordinator {
    pub(crate) runtime: Runtime,
    pub(crate) inner: RequestCoordinator,
    pub(crate) forwarders: Mutex<HashMap<SubscriptionId, Forwarder>>,
}

impl FfiCoordinator {
    pub(crate) fn forwarders(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Forwarder>> {
        self.forwarders.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Open/closed flag for one subscription's callback.
///
/// The forwarder holds the lock for the whole callback invocation and only
/// calls while the flag is set, so once `close` has cleared it no callback is
/// running and none will start.
#[derive(Clone)]
pub(crate) struct CallbackGate(Arc<Mutex<bool>>);

impl CallbackGate {
    pub(crate) fn open() -> Self {
        Self(Arc::new(Mutex::new(true)))
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` unless the gate has been closed. Returns false once closed.
    pub(crate) fn run(&self, f: impl FnOnce()) -> bool {
        let open = self.lock();
        if !*open {
            return false;
        }
        f();
        true
    }

    /// Block until any in-progress callback returns, then refuse new ones.
    pub(crate) fn close(&self) {
        *self.lock() = false;
    }
}

/// Runtime task delivering one subscription to the host callback.
pub(crate) struct Forwarder {
    pub(crate) task: JoinHandle<()>,
    pub(crate) gate: CallbackGate,
}

impl Forwarder {
    /// Stop delivery. When this returns the callback is not running and will
    /// not be called again.
    pub(crate) fn close(self) {
        self.gate.close();
        self.task.abort();
    }
}

/// Request lifecycle state as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiRequestState {
    /// Returned when the coordinator pointer is null.
    Invalid = -1,
    Idle = 0,
    InFlight = 1,
    Succeeded = 2,
    Failed = 3,
}

impl From<&RequestState> for FfiRequestState {
    fn from(state: &RequestState) -> Self {
        match state {
            RequestState::Idle => FfiRequestState::Idle,
            RequestState::InFlight => FfiRequestState::InFlight,
            RequestState::Succeeded(_) => FfiRequestState::Succeeded,
            RequestState::Failed(_) => FfiRequestState::Failed,
        }
    }
}

/// Host-owned context pointer passed back to the callback.
///
/// The host promises the pointer is usable from the runtime's threads.
pub(crate) struct UserData(*mut c_void);

unsafe impl Send for UserData {}

impl UserData {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub(crate) fn as_ptr(&self) -> *mut c_void {
        self.0
    }
}

/// Convert to a C string, dropping interior NUL bytes rather than failing.
pub(crate) fn to_c_string(s: String) -> CString {
    CString::new(s).unwrap_or_else(|err| {
        let mut bytes = err.into_vec();
        bytes.retain(|&b| b != 0);
        CString::new(bytes).unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_maps_to_c_discriminants() {
        assert_eq!(FfiRequestState::from(&RequestState::Idle) as i32, 0);
        assert_eq!(FfiRequestState::from(&RequestState::InFlight) as i32, 1);
        assert_eq!(FfiRequestState::from(&RequestState::Succeeded("{}".into())) as i32, 2);
        assert_eq!(FfiRequestState::from(&RequestState::Failed("x".into())) as i32, 3);
        assert_eq!(FfiRequestState::Invalid as i32, -1);
    }

    #[test]
    fn interior_nul_is_stripped() {
        let c = to_c_string("a\0b".to_string());
        assert_eq!(c.to_str().unwrap(), "ab");
    }

    #[test]
    fn closed_gate_refuses_callbacks() {
        let gate = CallbackGate::open();
        let mut calls = 0;
        assert!(gate.run(|| calls += 1));
        gate.close();
        assert!(!gate.clone().run(|| calls += 1));
        assert_eq!(calls, 1);
    }

    #[test]
    fn close_waits_for_running_callback() {
        let gate = CallbackGate::open();
        let finished = Arc::new(Mutex::new(false));
        let (started_tx, started_rx) = std::sync::mpsc::channel();

        let worker = {
            let gate = gate.clone();
            let finished = finished.clone();
            std::thread::spawn(move || {
                gate.run(|| {
                    started_tx.send(()).unwrap();
                    std::thread::sleep(std::time::Duration::from_millis(200));
                    *finished.lock().unwrap() = true;
                });
            })
        };

        started_rx.recv().unwrap();
        gate.close();
        assert!(*finished.lock().unwrap());
        worker.join().unwrap();
    }

    #[test]
    fn plain_string_is_kept() {
        let c = to_c_string("Performing GET request ...".to_string());
        assert_eq!(c.to_str().unwrap(), "Performing GET request ...");
    }
}
