//! HTTP conversation module
//!
//! Provides the session-bound client, the request and response types
//! it exchanges, and the transport seam underneath it.

mod client;
mod request;
mod response;
pub(crate) mod transport;

pub use client::SessionClient;
pub use request::{BodyEncoding, Method, Request};
pub use response::{extract_title, Response};
pub use transport::{ReqwestTransport, Transport};
