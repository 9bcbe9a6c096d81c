//! Minimal hyper-based HTTP/1.1 + TLS client used as the transport for every exchange.
#![forbid(unsafe_code)]

mod client;
mod error;
mod types;

pub use client::{HttpClient, HttpClientOptions};
pub use error::{Error, HttpTransportErrorKind, Result};
pub use types::{HttpRequest, HttpResponse};
