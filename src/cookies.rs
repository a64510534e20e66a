//! Cookie jar capability and adapters.
//!
//! The client never parses cookie attributes or applies domain/path
//! matching itself; that policy lives entirely in the jar.  The client
//! only asks the jar for a `Cookie` header value before each hop and hands
//! it every `Set-Cookie` value after each hop, so callers can plug in a
//! full RFC 6265 store, a browser-backed jar, or the bundled
//! [`MemoryCookieJar`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use url::Url;

use crate::transport::{BoxError, BoxFuture};

/// Asynchronous cookie store capability.
///
/// Both operations take the request URL so the jar can apply its own
/// domain, path, and security matching.
pub trait CookieJar: Send + Sync {
    /// Returns the `Cookie` header value for a request to `url`, for
    /// example `"a=1; b=2"`.  An empty string means no cookies apply.
    fn cookie_string<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String, BoxError>>;

    /// Stores one raw `Set-Cookie` header value received from `url`.
    fn set_cookie<'a>(&'a self, raw: &'a str, url: &'a Url) -> BoxFuture<'a, Result<(), BoxError>>;
}

/// Synchronous cookie store capability.
///
/// Any `SyncCookieJar` is automatically a [`CookieJar`] via a blanket
/// impl, so purely in-memory stores don't need to write future plumbing.
pub trait SyncCookieJar: Send + Sync {
    /// Synchronous version of [`CookieJar::cookie_string`].
    fn cookie_string(&self, url: &Url) -> Result<String, BoxError>;

    /// Synchronous version of [`CookieJar::set_cookie`].
    fn set_cookie(&self, raw: &str, url: &Url) -> Result<(), BoxError>;
}

impl<J: SyncCookieJar> CookieJar for J {
    fn cookie_string<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String, BoxError>> {
        Box::pin(std::future::ready(SyncCookieJar::cookie_string(self, url)))
    }

    fn set_cookie<'a>(&'a self, raw: &'a str, url: &'a Url) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(std::future::ready(SyncCookieJar::set_cookie(
            self, raw, url,
        )))
    }
}

/// Client-side wrapper around an optional jar.
///
/// Jar failures must never fail a fetch, so both operations here are
/// infallible: a read error degrades to "no cookies" and a write error to
/// a no-op, each with a warning.
#[derive(Clone, Default)]
pub(crate) struct JarHandle {
    jar: Option<Arc<dyn CookieJar>>,
}

impl JarHandle {
    pub(crate) fn new(jar: Option<Arc<dyn CookieJar>>) -> Self {
        Self { jar }
    }

    /// The `Cookie` header value for `url`, or an empty string when there
    /// is no jar, no applicable cookies, or the jar failed.
    pub(crate) async fn cookie_string(&self, url: &Url) -> String {
        let Some(jar) = &self.jar else {
            return String::new();
        };
        match jar.cookie_string(url).await {
            Ok(value) => value,
            Err(error) => {
                warn!(%url, %error, "cookie jar read failed; sending no cookies");
                String::new()
            }
        }
    }

    /// Forwards one `Set-Cookie` value to the jar, swallowing failures.
    pub(crate) async fn store(&self, raw: &str, url: &Url) {
        let Some(jar) = &self.jar else {
            return;
        };
        if let Err(error) = jar.set_cookie(raw, url).await {
            warn!(%url, %error, "cookie jar write failed; dropping cookie");
        }
    }
}

/// A minimal in-memory jar keyed by host.
///
/// Stores the leading `name=value` of each `Set-Cookie` line and ignores
/// all attributes, so there is no expiry, no path matching, and no
/// cross-subdomain sharing.  Good enough for session-cookie flows and for
/// tests; use a real RFC 6265 jar for anything else.
#[derive(Default)]
pub struct MemoryCookieJar {
    store: Mutex<HashMap<String, Vec<(String, String)>>>,
}

impl MemoryCookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncCookieJar for MemoryCookieJar {
    fn cookie_string(&self, url: &Url) -> Result<String, BoxError> {
        let Some(host) = url.host_str() else {
            return Ok(String::new());
        };
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(cookies) = store.get(host) else {
            return Ok(String::new());
        };
        Ok(cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; "))
    }

    fn set_cookie(&self, raw: &str, url: &Url) -> Result<(), BoxError> {
        let Some(host) = url.host_str() else {
            return Err("cookie origin has no host".into());
        };
        // Attributes after the first ';' are dropped.
        let pair = raw.split(';').next().unwrap_or(raw);
        let Some((name, value)) = pair.split_once('=') else {
            return Err(format!("malformed cookie: {raw:?}").into());
        };
        let (name, value) = (name.trim().to_owned(), value.trim().to_owned());
        if name.is_empty() {
            return Err(format!("malformed cookie: {raw:?}").into());
        }

        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let cookies = store.entry(host.to_owned()).or_default();
        match cookies.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => cookies.push((name, value)),
        }
        Ok(())
    }
}
