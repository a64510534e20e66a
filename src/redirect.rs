//! Redirect policy and the hop-following engine.
//!
//! The engine owns every hop boundary: the cookie jar is consulted before
//! each hop and updated after it, cancellation is checked before each hop
//! and raced against the in-flight transport call, and the method-rewrite
//! rules below are applied between hops.
//!
//! Rewrite rules, matching browser behavior rather than a strict reading
//! of RFC 9110:
//! - `301`/`302` rewrite `POST` to `GET`;
//! - `303` rewrites everything except `HEAD` to `GET`;
//! - `307`/`308` never rewrite.
//!
//! A rewritten-to-`GET` hop (and any `HEAD` hop) is sent without the
//! request body.

use futures_util::future::{select, Either};
use http::{Method, StatusCode};

use crate::client::ClientInner;
use crate::error::Error;
use crate::request::RequestSpec;
use crate::response::Response;
use crate::transport::HopRequest;

/// Default maximum number of redirect hops.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// How many redirect hops a client will follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    inner: PolicyInner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyInner {
    Limited(usize),
    None,
}

impl Policy {
    /// Follow at most `max` redirects; hop `max + 1` fails the fetch with
    /// a redirect error.  `limited(0)` still performs the initial request
    /// but refuses to follow anything.
    pub fn limited(max: usize) -> Self {
        Self {
            inner: PolicyInner::Limited(max),
        }
    }

    /// Never follow redirects: `3xx` responses are returned to the caller
    /// as ordinary responses.
    pub fn none() -> Self {
        Self {
            inner: PolicyInner::None,
        }
    }

    pub(crate) fn max_hops(&self) -> Option<usize> {
        match self.inner {
            PolicyInner::Limited(max) => Some(max),
            PolicyInner::None => None,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::limited(DEFAULT_MAX_REDIRECTS)
    }
}

fn is_redirect_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Applies the method-rewrite rules for one followed redirect.
pub(crate) fn rewrite_method(status: StatusCode, method: Method) -> Method {
    match status.as_u16() {
        301 | 302 if method == Method::POST => Method::GET,
        303 if method != Method::HEAD => Method::GET,
        _ => method,
    }
}

/// Runs the whole redirect chain for one normalized request and returns
/// the terminal response.
pub(crate) async fn follow(inner: &ClientInner, spec: RequestSpec) -> Result<Response, Error> {
    let mut url = spec.url.clone();
    let mut method = spec.method.clone();
    let mut hops = 0usize;
    let max_hops = inner.policy.max_hops();
    // If the caller set a Cookie header themselves, the jar stays out of
    // outgoing headers for the whole chain (it still receives Set-Cookie).
    let caller_has_cookie = spec
        .headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("cookie"));

    loop {
        if let Some(token) = &spec.signal {
            if let Some(reason) = token.reason() {
                return Err(Error::cancelled(reason).with_url(url));
            }
        }

        let mut headers = spec.headers.clone();
        if !caller_has_cookie {
            let cookie = inner.jar.cookie_string(&url).await;
            if !cookie.is_empty() {
                headers.push(("Cookie".to_owned(), cookie));
            }
        }

        let body = if method == Method::GET || method == Method::HEAD {
            None
        } else {
            spec.body.clone()
        };

        let hop = HopRequest {
            url: url.clone(),
            method: method.clone(),
            headers,
            body,
            timeout: spec.timeout,
            http3: inner.http3,
            force_http3: spec.force_http3,
            profile: inner.profile,
            ignore_tls_errors: inner.ignore_tls_errors,
        };
        trace!(%url, method = %method, hop = hops, "sending hop");

        let result = match &spec.signal {
            Some(token) => {
                let transport = std::pin::pin!(inner.transport.fetch(hop));
                let cancelled = std::pin::pin!(token.cancelled());
                match select(transport, cancelled).await {
                    Either::Left((result, _)) => result,
                    Either::Right((reason, _)) => {
                        debug!(%url, "fetch cancelled mid-hop");
                        return Err(Error::cancelled(reason).with_url(url));
                    }
                }
            }
            None => inner.transport.fetch(hop).await,
        };
        let response = result.map_err(|e| Error::transport(e).with_url(url.clone()))?;

        // Forward every Set-Cookie to the jar in wire order, redirect or
        // not, so intermediate hops can establish sessions.
        for (name, value) in &response.headers {
            if name.eq_ignore_ascii_case("set-cookie") {
                inner.jar.store(value, &url).await;
            }
        }

        let location = response
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("location"))
            .map(|(_, value)| value.clone());

        if let (Some(limit), Some(location)) = (max_hops, location) {
            if is_redirect_status(response.status) {
                hops += 1;
                if hops > limit {
                    return Err(Error::too_many_redirects(limit).with_url(url));
                }
                let next = url.join(&location).map_err(|e| {
                    Error::redirect(format!("invalid Location {location:?}: {e}"))
                        .with_url(url.clone())
                })?;
                debug!(from = %url, to = %next, status = %response.status, "following redirect");
                method = rewrite_method(response.status, method);
                url = next;
                continue;
            }
        }

        return Ok(Response::from_hop(response, url, spec.signal.clone()));
    }
}
