//! Request types and fetch-argument normalization.
//!
//! `fetch` accepts a resource (URL string, [`Url`], or prebuilt
//! [`Request`]) plus an optional [`FetchInit`], and both collapse here
//! into one canonical [`RequestSpec`] before the redirect engine runs.

use std::time::Duration;

use bytes::Bytes;
use http::Method;
use url::Url;

use crate::body::Body;
use crate::cancel::CancelToken;
use crate::error::Error;
use crate::headers::Headers;

/// A prebuilt request, usable as the resource argument to
/// [`Client::fetch`](crate::Client::fetch).
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Headers,
    body: Option<Body>,
    timeout: Option<Duration>,
    force_http3: bool,
}

impl Request {
    /// Creates a request with the given method and URL and no headers or
    /// body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: None,
            timeout: None,
            force_http3: false,
        }
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// A mutable reference to the method.
    pub fn method_mut(&mut self) -> &mut Method {
        &mut self.method
    }

    /// The request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// A mutable reference to the headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// The request body, if set.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Sets the request body.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = Some(body.into());
    }

    /// The per-hop timeout, if set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sets the per-hop timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Requires HTTP/3 for this request, with no fallback.
    pub fn set_force_http3(&mut self, force: bool) {
        self.force_http3 = force;
    }
}

/// The resource argument to `fetch`: a URL or a full [`Request`].
#[derive(Debug)]
pub enum Resource {
    /// Just a URL; method and headers come from [`FetchInit`] or defaults.
    Url(Url),
    /// A prebuilt request.
    Request(Box<Request>),
}

/// Conversion into a [`Resource`], implemented for URL strings, [`Url`],
/// [`Request`], and [`Resource`] itself.
///
/// This is where unusable resource arguments are rejected: parse
/// failures, non-HTTP schemes, and host-less URLs all produce a builder
/// error before any network activity.
pub trait IntoResource {
    /// Performs the conversion.
    fn into_resource(self) -> Result<Resource, Error>;
}

fn check_url(url: Url) -> Result<Url, Error> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(
                Error::builder(format!("unsupported scheme {other:?}")).with_url(url.clone())
            )
        }
    }
    if url.host_str().is_none() {
        return Err(Error::builder("URL has no host").with_url(url.clone()));
    }
    Ok(url)
}

impl IntoResource for Url {
    fn into_resource(self) -> Result<Resource, Error> {
        Ok(Resource::Url(check_url(self)?))
    }
}

impl IntoResource for &str {
    fn into_resource(self) -> Result<Resource, Error> {
        let url: Url = self
            .parse()
            .map_err(|e: url::ParseError| Error::builder(format!("invalid URL {self:?}: {e}")))?;
        url.into_resource()
    }
}

impl IntoResource for String {
    fn into_resource(self) -> Result<Resource, Error> {
        self.as_str().into_resource()
    }
}

impl IntoResource for Request {
    fn into_resource(self) -> Result<Resource, Error> {
        check_url(self.url.clone())?;
        Ok(Resource::Request(Box::new(self)))
    }
}

impl IntoResource for Resource {
    fn into_resource(self) -> Result<Resource, Error> {
        match self {
            Resource::Url(url) => url.into_resource(),
            Resource::Request(request) => (*request).into_resource(),
        }
    }
}

/// Per-call options, mirroring the second argument of `fetch`.
///
/// Every field is optional.  A set field overrides the corresponding
/// value from the resource wholesale: in particular `headers` replaces
/// the resource's headers rather than merging with them.
#[derive(Debug, Default)]
pub struct FetchInit {
    /// Request method; defaults to the resource's method, or `GET`.
    pub method: Option<Method>,
    /// Request headers, replacing any from the resource.
    pub headers: Option<Headers>,
    /// Request body, replacing any from the resource.
    pub body: Option<Body>,
    /// Per-hop timeout, replacing any from the resource.
    pub timeout: Option<Duration>,
    /// Require HTTP/3 with no fallback.
    pub force_http3: Option<bool>,
    /// Cancellation signal for the whole fetch.
    pub signal: Option<CancelToken>,
}

/// The normalized form every fetch reduces to before the first hop.
#[derive(Debug)]
pub(crate) struct RequestSpec {
    pub(crate) url: Url,
    pub(crate) method: Method,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<Bytes>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) force_http3: bool,
    pub(crate) signal: Option<CancelToken>,
}

/// Collapses resource + init into a [`RequestSpec`].
///
/// Stream bodies are drained here, so a failing body stream rejects the
/// fetch before any hop is attempted.
pub(crate) async fn normalize(
    resource: Resource,
    init: Option<FetchInit>,
) -> Result<RequestSpec, Error> {
    let (url, mut method, mut headers, mut body, mut timeout, mut force_http3) = match resource {
        Resource::Url(url) => (url, Method::GET, Headers::new(), None, None, false),
        Resource::Request(request) => {
            let request = *request;
            (
                request.url,
                request.method,
                request.headers,
                request.body,
                request.timeout,
                request.force_http3,
            )
        }
    };

    let init = init.unwrap_or_default();
    if let Some(m) = init.method {
        method = m;
    }
    if let Some(h) = init.headers {
        headers = h;
    }
    if let Some(b) = init.body {
        body = Some(b);
    }
    if let Some(t) = init.timeout {
        timeout = Some(t);
    }
    if let Some(f) = init.force_http3 {
        force_http3 = f;
    }

    let mut header_list = headers.to_vec();
    let body = match body {
        Some(body) => {
            let (bytes, inferred_type) = body.coerce().await?;
            // The caller's explicit Content-Type always wins over the
            // body's inferred one.
            if let Some(content_type) = inferred_type {
                if !headers.contains("content-type") {
                    header_list.push(("Content-Type".to_owned(), content_type));
                }
            }
            Some(bytes)
        }
        None => None,
    };

    Ok(RequestSpec {
        url,
        method,
        headers: header_list,
        body,
        timeout,
        force_http3,
        signal: init.signal,
    })
}
