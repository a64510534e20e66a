//! The client: configuration plus the `fetch` entry point.

use std::sync::Arc;
use std::time::Duration;

use http::Method;

use crate::body::Body;
use crate::cookies::{CookieJar, JarHandle};
use crate::error::Error;
use crate::redirect::{self, Policy};
use crate::request::{normalize, FetchInit, IntoResource};
use crate::response::Response;
use crate::transport::{BrowserProfile, Transport};

/// An asynchronous fetch-style HTTP client over a pluggable single-hop
/// transport.
///
/// `Client` is a cheap handle around shared immutable configuration;
/// clone it freely across tasks.  Build one with
/// [`Client::builder`].
///
/// # Example
///
/// ```rust,ignore
/// let client = Client::builder()
///     .transport(Arc::new(my_transport))
///     .max_redirects(5)
///     .build()?;
/// let body = client.get("https://example.com").await?.text().await?;
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) policy: Policy,
    pub(crate) jar: JarHandle,
    pub(crate) profile: Option<BrowserProfile>,
    pub(crate) http3: bool,
    pub(crate) ignore_tls_errors: bool,
    pub(crate) timeout: Option<Duration>,
}

impl Client {
    /// Returns a builder with default configuration.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Performs a fetch: normalizes the arguments, runs the redirect
    /// chain, and returns the terminal response.
    ///
    /// `resource` is a URL string, [`Url`](crate::Url), or
    /// [`Request`](crate::Request); `init` optionally overrides method,
    /// headers, body, timeout, and cancellation, `fetch`-style.
    pub async fn fetch(
        &self,
        resource: impl IntoResource,
        init: impl Into<Option<FetchInit>>,
    ) -> crate::Result<Response> {
        let mut spec = normalize(resource.into_resource()?, init.into()).await?;
        if spec.timeout.is_none() {
            spec.timeout = self.inner.timeout;
        }
        trace!(url = %spec.url, method = %spec.method, "starting fetch");
        redirect::follow(&self.inner, spec).await
    }

    /// Convenience for a `GET` fetch.
    pub async fn get(&self, resource: impl IntoResource) -> crate::Result<Response> {
        self.with_method(Method::GET, resource, None).await
    }

    /// Convenience for a `HEAD` fetch.
    pub async fn head(&self, resource: impl IntoResource) -> crate::Result<Response> {
        self.with_method(Method::HEAD, resource, None).await
    }

    /// Convenience for a `DELETE` fetch.
    pub async fn delete(&self, resource: impl IntoResource) -> crate::Result<Response> {
        self.with_method(Method::DELETE, resource, None).await
    }

    /// Convenience for an `OPTIONS` fetch.
    pub async fn options(&self, resource: impl IntoResource) -> crate::Result<Response> {
        self.with_method(Method::OPTIONS, resource, None).await
    }

    /// Convenience for a `TRACE` fetch.
    pub async fn trace(&self, resource: impl IntoResource) -> crate::Result<Response> {
        self.with_method(Method::TRACE, resource, None).await
    }

    /// Convenience for a `POST` fetch with a body.
    pub async fn post(
        &self,
        resource: impl IntoResource,
        body: impl Into<Body>,
    ) -> crate::Result<Response> {
        self.with_method(Method::POST, resource, Some(body.into())).await
    }

    /// Convenience for a `PUT` fetch with a body.
    pub async fn put(
        &self,
        resource: impl IntoResource,
        body: impl Into<Body>,
    ) -> crate::Result<Response> {
        self.with_method(Method::PUT, resource, Some(body.into())).await
    }

    /// Convenience for a `PATCH` fetch with a body.
    pub async fn patch(
        &self,
        resource: impl IntoResource,
        body: impl Into<Body>,
    ) -> crate::Result<Response> {
        self.with_method(Method::PATCH, resource, Some(body.into())).await
    }

    async fn with_method(
        &self,
        method: Method,
        resource: impl IntoResource,
        body: Option<Body>,
    ) -> crate::Result<Response> {
        let init = FetchInit {
            method: Some(method),
            body,
            ..Default::default()
        };
        self.fetch(resource, init).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("policy", &self.inner.policy)
            .field("http3", &self.inner.http3)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    follow_redirects: bool,
    max_redirects: usize,
    jar: Option<Arc<dyn CookieJar>>,
    profile: Option<BrowserProfile>,
    http3: bool,
    ignore_tls_errors: bool,
    timeout: Option<Duration>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Creates a builder with default configuration: follow up to
    /// [`DEFAULT_MAX_REDIRECTS`](redirect::DEFAULT_MAX_REDIRECTS) hops,
    /// no cookie jar, no browser profile, HTTP/3 disabled, TLS errors
    /// fatal, no default timeout.
    pub fn new() -> Self {
        Self {
            transport: None,
            follow_redirects: true,
            max_redirects: redirect::DEFAULT_MAX_REDIRECTS,
            jar: None,
            profile: None,
            http3: false,
            ignore_tls_errors: false,
            timeout: None,
        }
    }

    /// Sets the single-hop transport.  Required.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Enables or disables redirect following.  When disabled, `3xx`
    /// responses are returned to the caller as-is.
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Sets the maximum number of redirect hops.  Exceeding it fails the
    /// fetch rather than returning the last `3xx` response.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Attaches a cookie jar, shared with any other clients holding the
    /// same `Arc`.
    pub fn cookie_jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.jar = Some(jar);
        self
    }

    /// Asks the transport to impersonate a browser fingerprint.
    pub fn browser_profile(mut self, profile: BrowserProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Allows the transport to negotiate HTTP/3.
    pub fn http3(mut self, enabled: bool) -> Self {
        self.http3 = enabled;
        self
    }

    /// Proceed past TLS certificate validation failures.
    pub fn ignore_tls_errors(mut self, ignore: bool) -> Self {
        self.ignore_tls_errors = ignore;
        self
    }

    /// Default per-hop timeout, used when a request doesn't set its own.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.  Fails if no transport was provided.
    pub fn build(self) -> crate::Result<Client> {
        let Some(transport) = self.transport else {
            return Err(Error::builder("no transport configured"));
        };
        let policy = if self.follow_redirects {
            Policy::limited(self.max_redirects)
        } else {
            Policy::none()
        };
        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                policy,
                jar: JarHandle::new(self.jar),
                profile: self.profile,
                http3: self.http3,
                ignore_tls_errors: self.ignore_tls_errors,
                timeout: self.timeout,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{BoxError, BoxFuture, HopRequest, TransportResponse};
    use http::StatusCode;
    use std::sync::Mutex;

    /// Replies 200 to everything and records each hop's method and URL.
    struct RecordingTransport {
        hops: Mutex<Vec<(Method, String)>>,
    }

    impl RecordingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                hops: Mutex::new(Vec::new()),
            })
        }
    }

    impl Transport for RecordingTransport {
        fn fetch(&self, hop: HopRequest) -> BoxFuture<'_, Result<TransportResponse, BoxError>> {
            self.hops
                .lock()
                .unwrap()
                .push((hop.method.clone(), hop.url.to_string()));
            Box::pin(async { Ok(TransportResponse::from_bytes(StatusCode::OK, vec![], "")) })
        }
    }

    #[test]
    fn build_without_transport_fails() {
        let err = Client::builder().build().unwrap_err();
        assert!(err.is_builder());
    }

    #[test]
    fn build_with_transport_succeeds() {
        let client = Client::builder()
            .transport(RecordingTransport::new())
            .build()
            .unwrap();
        assert_eq!(
            client.inner.policy.max_hops(),
            Some(redirect::DEFAULT_MAX_REDIRECTS)
        );
        assert!(client.inner.timeout.is_none());
    }

    #[test]
    fn follow_redirects_false_means_policy_none() {
        let client = Client::builder()
            .transport(RecordingTransport::new())
            .follow_redirects(false)
            .max_redirects(99)
            .build()
            .unwrap();
        assert_eq!(client.inner.policy.max_hops(), None);
    }

    #[tokio::test]
    async fn verb_helpers_set_the_method() {
        let transport = RecordingTransport::new();
        let client = Client::builder()
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .build()
            .unwrap();

        let base = "https://example.com/";
        client.get(base).await.unwrap();
        client.head(base).await.unwrap();
        client.delete(base).await.unwrap();
        client.options(base).await.unwrap();
        client.trace(base).await.unwrap();
        client.post(base, "p").await.unwrap();
        client.put(base, "p").await.unwrap();
        client.patch(base, "p").await.unwrap();

        let methods: Vec<Method> = transport
            .hops
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect();
        assert_eq!(
            methods,
            vec![
                Method::GET,
                Method::HEAD,
                Method::DELETE,
                Method::OPTIONS,
                Method::TRACE,
                Method::POST,
                Method::PUT,
                Method::PATCH
            ]
        );
    }

    #[tokio::test]
    async fn client_default_timeout_applies_when_request_has_none() {
        struct TimeoutCheck {
            seen: Mutex<Vec<Option<Duration>>>,
        }
        impl Transport for TimeoutCheck {
            fn fetch(&self, hop: HopRequest) -> BoxFuture<'_, Result<TransportResponse, BoxError>> {
                self.seen.lock().unwrap().push(hop.timeout);
                Box::pin(async { Ok(TransportResponse::from_bytes(StatusCode::OK, vec![], "")) })
            }
        }

        let transport = Arc::new(TimeoutCheck {
            seen: Mutex::new(Vec::new()),
        });
        let client = Client::builder()
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .timeout(Duration::from_secs(7))
            .build()
            .unwrap();

        client.get("https://example.com").await.unwrap();
        let init = FetchInit {
            timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        };
        client.fetch("https://example.com", init).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0], Some(Duration::from_secs(7)), "client default");
        assert_eq!(seen[1], Some(Duration::from_secs(2)), "request override");
    }
}
