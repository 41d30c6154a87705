//! Fetch-and-publish core for the earthquake GET sample.
//!
//! # Overview
//! A `RequestCoordinator` issues one GET against a fixed `Endpoint`,
//! pretty-prints the JSON body and publishes the result (or a failure
//! message) to an `ObservableValue<String>`. Submissions made while a request
//! is in flight are ignored.
//!
//! # Design
//! - The presentation layer only ever sees strings: a busy message, the
//!   formatted JSON, or a prefixed failure message.
//! - `Fetcher` is the only I/O seam; `UreqFetcher` is the production
//!   implementation and tests substitute their own.
//! - The endpoint is configuration passed to the constructor, never a global.

pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod fetch;
pub mod format;
pub mod http;
pub mod observable;

pub use coordinator::{RequestCoordinator, RequestState, BUSY_MESSAGE};
pub use endpoint::{BoundingBox, Endpoint};
pub use error::{FormatError, RequestError, TransportError};
pub use fetch::{Fetcher, UreqFetcher};
pub use format::pretty_print;
pub use http::HttpResponse;
pub use observable::{ObservableValue, Subscription, SubscriptionId};
