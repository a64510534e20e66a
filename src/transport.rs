//! The single-hop transport seam.
//!
//! Everything above this module is transport-agnostic: [`Transport`] is the
//! only way the client talks to the network.  Implementations perform
//! exactly one request/response exchange and must never follow redirects
//! themselves, or the client's redirect accounting and cookie handling
//! would silently skip hops.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_core::Stream;
use http::{Method, StatusCode};
use url::Url;

/// A type-erased error, the `Err` type of everything crossing this seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A boxed future, `Send` and lifetime-bound.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A boxed stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// Browser TLS/header fingerprint for transports that emulate one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserProfile {
    /// Impersonate a recent Chrome release.
    Chrome,
    /// Impersonate a recent Firefox release.
    Firefox,
}

/// One fully-resolved hop, ready for the wire.
///
/// The client hands the transport everything it needs: URL, method,
/// flattened headers (jar cookies already merged in), the buffered body,
/// and the per-hop connection options from the client configuration.
#[derive(Debug)]
pub struct HopRequest {
    /// Absolute request URL.
    pub url: Url,
    /// Request method, already rewritten per redirect rules if this is a
    /// follow-up hop.
    pub method: Method,
    /// Flattened header list in send order.  Duplicate names are allowed.
    pub headers: Vec<(String, String)>,
    /// Fully-buffered request body, absent for bodiless hops.
    pub body: Option<Bytes>,
    /// Per-hop timeout.  Enforcement is the transport's responsibility.
    pub timeout: Option<Duration>,
    /// Whether the transport may negotiate HTTP/3.
    pub http3: bool,
    /// Whether the transport must use HTTP/3, failing rather than falling
    /// back.
    pub force_http3: bool,
    /// Requested browser fingerprint, if any.
    pub profile: Option<BrowserProfile>,
    /// Whether to proceed past TLS certificate validation failures.
    pub ignore_tls_errors: bool,
}

/// What a transport returns for one hop: status, headers, and a body
/// stream that may still be arriving.
pub struct TransportResponse {
    /// Response status code.
    pub status: StatusCode,
    /// Response headers in wire order, duplicates preserved.
    pub headers: Vec<(String, String)>,
    /// Response body as a chunk stream.
    pub body: ByteStream,
}

impl TransportResponse {
    /// Builds a response with a fully-buffered body.  Mostly useful for
    /// transports over buffering backends and for test doubles.
    pub fn from_bytes(
        status: StatusCode,
        headers: Vec<(String, String)>,
        body: impl Into<Bytes>,
    ) -> Self {
        let body = body.into();
        let chunks: Vec<Result<Bytes, BoxError>> = if body.is_empty() {
            Vec::new()
        } else {
            vec![Ok(body)]
        };
        Self {
            status,
            headers,
            body: Box::pin(futures_util::stream::iter(chunks)),
        }
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Capability to perform exactly one HTTP request/response exchange.
///
/// Implementations must not follow redirects: a `3xx` response is returned
/// to the caller like any other.  Per-hop timeouts are enforced here, not
/// by the client.
pub trait Transport: Send + Sync + 'static {
    /// Performs the exchange described by `hop`.
    ///
    /// Errors are opaque to the client and surface unmodified as the
    /// source of a transport [`Error`](crate::Error).
    fn fetch(&self, hop: HopRequest) -> BoxFuture<'_, Result<TransportResponse, BoxError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn from_bytes_yields_single_chunk() {
        let resp = TransportResponse::from_bytes(StatusCode::OK, vec![], "hello");
        assert_eq!(resp.status, StatusCode::OK);
        let chunks: Vec<_> = resp.body.collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), &Bytes::from("hello"));
    }

    #[tokio::test]
    async fn from_bytes_empty_body_yields_no_chunks() {
        let resp = TransportResponse::from_bytes(StatusCode::NO_CONTENT, vec![], "");
        let chunks: Vec<_> = resp.body.collect().await;
        assert!(chunks.is_empty());
    }

    #[test]
    fn transport_trait_is_object_safe() {
        struct Never;
        impl Transport for Never {
            fn fetch(
                &self,
                _hop: HopRequest,
            ) -> BoxFuture<'_, Result<TransportResponse, BoxError>> {
                Box::pin(async { Err("unreachable".into()) })
            }
        }
        let _object: Box<dyn Transport> = Box::new(Never);
    }
}
