//! Error type for hopfetch.
//!
//! Provides [`Error`] with query methods in the style of `reqwest::Error`:
//! [`is_builder()`](Error::is_builder), [`is_redirect()`](Error::is_redirect),
//! [`is_cancelled()`](Error::is_cancelled),
//! [`is_transport()`](Error::is_transport), [`is_body()`](Error::is_body),
//! [`is_decode()`](Error::is_decode), plus
//! [`redirect_limit()`](Error::redirect_limit), [`reason()`](Error::reason),
//! and [`url()`](Error::url).

use std::fmt;
use url::Url;

pub(crate) use crate::transport::BoxError;

/// The error type for hopfetch operations.
///
/// Errors carry a `kind` classification that powers the `is_builder()` /
/// `is_redirect()` / `is_cancelled()` / `is_transport()` / `is_body()` /
/// `is_decode()` query methods.
///
/// When a request URL is available, it is included in the `Display` output
/// for diagnostics and telemetry.
pub struct Error {
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
    pub(crate) source: Option<BoxError>,
    pub(crate) url: Option<Box<Url>>,
    pub(crate) limit: Option<usize>,
}

/// Classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// The request could not be constructed (unusable resource argument,
    /// invalid builder configuration, bad header input).
    Builder,
    /// Redirect-phase error: the hop bound was exceeded, or a redirect
    /// response carried an unresolvable `Location`.
    Redirect,
    /// The caller's cancellation signal fired.  The caller's reason is
    /// forwarded verbatim as the message.
    Cancelled,
    /// Opaque failure from the single-hop transport, passed through
    /// unmodified as the source.
    Transport,
    /// Response body misuse (reading an already-drained stream).
    Body,
    /// Response body decoding error (JSON deserialization, charset issues).
    Decode,
}

impl Error {
    /// Returns `true` if the request could not be constructed.
    pub fn is_builder(&self) -> bool {
        matches!(self.kind, ErrorKind::Builder)
    }

    /// Returns `true` if this is a redirect-phase error.
    ///
    /// Set when the configured redirect limit is exceeded (see
    /// [`redirect_limit()`](Self::redirect_limit)) or when a redirect
    /// response carries a `Location` that cannot be resolved against the
    /// current URL.
    pub fn is_redirect(&self) -> bool {
        matches!(self.kind, ErrorKind::Redirect)
    }

    /// Returns `true` if the fetch was cancelled by the caller's signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns `true` if the underlying transport failed.
    ///
    /// The transport's own error is available unmodified through
    /// [`std::error::Error::source`].
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport)
    }

    /// Returns `true` if this is a body-access error.
    pub fn is_body(&self) -> bool {
        matches!(self.kind, ErrorKind::Body)
    }

    /// Returns `true` if this is a response body decoding error.
    pub fn is_decode(&self) -> bool {
        matches!(self.kind, ErrorKind::Decode)
    }

    /// Returns the configured redirect limit, if this error was produced
    /// by exceeding it.
    pub fn redirect_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns the cancellation reason, if this error was produced by a
    /// fired [`CancelToken`](crate::CancelToken).
    ///
    /// The reason is the caller's own string, forwarded verbatim.
    pub fn reason(&self) -> Option<&str> {
        match self.kind {
            ErrorKind::Cancelled => Some(&self.message),
            _ => None,
        }
    }

    /// Returns the request URL associated with this error, if available.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_deref()
    }

    /// Strips the URL from this error.
    #[must_use]
    pub fn without_url(mut self) -> Self {
        self.url = None;
        self
    }

    /// Attach a request URL to this error (builder pattern).
    #[must_use]
    pub(crate) fn with_url(mut self, url: Url) -> Self {
        self.url = Some(Box::new(url));
        self
    }

    /// Attach a source error (builder pattern).
    ///
    /// Stores the underlying cause so that [`std::error::Error::source`]
    /// returns it, making error chains inspectable by `anyhow`, `eyre`,
    /// and manual walks.
    #[must_use]
    pub(crate) fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    // -- Internal constructors --

    /// Shared constructor for simple error kinds (no source, no URL).
    fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            source: None,
            url: None,
            limit: None,
        }
    }

    /// Create a request-construction error.
    pub(crate) fn builder(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Builder, msg)
    }

    /// Create the terminal error for an exhausted redirect chain.
    pub(crate) fn too_many_redirects(limit: usize) -> Self {
        Self {
            kind: ErrorKind::Redirect,
            message: format!("too many redirects (limit: {limit})"),
            source: None,
            url: None,
            limit: Some(limit),
        }
    }

    /// Create a redirect-phase error that is not a limit violation.
    pub(crate) fn redirect(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Redirect, msg)
    }

    /// Create a cancellation error carrying the caller's reason verbatim.
    pub(crate) fn cancelled(reason: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Cancelled, reason)
    }

    /// Create a transport error wrapping the transport's own failure.
    pub(crate) fn transport(source: BoxError) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: source.to_string(),
            source: Some(source),
            url: None,
            limit: None,
        }
    }

    /// Create a body-access error.
    pub(crate) fn body(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Body, msg)
    }

    /// Create a decode error.
    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Decode, msg)
    }
}

impl fmt::Display for Error {
    /// A kind-based prefix, then ` for url (...)` when the URL is known.
    ///
    /// Cancellation and redirect errors print their message directly: the
    /// former carries the caller's reason verbatim, the latter carries the
    /// limit.  The source error detail is available via
    /// [`std::error::Error::source`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Builder => f.write_str("builder error")?,
            ErrorKind::Redirect => f.write_str(&self.message)?,
            ErrorKind::Cancelled => f.write_str(&self.message)?,
            ErrorKind::Transport => f.write_str("transport error")?,
            ErrorKind::Body => f.write_str("request or response body error")?,
            ErrorKind::Decode => f.write_str("error decoding response body")?,
        }
        if let Some(url) = &self.url {
            write!(f, " for url ({url})")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("url", &self.url)
            .field("source", &self.source)
            .finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}
