//! Request body construction and coercion.

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt;

use crate::error::{BoxError, Error};
use crate::transport::ByteStream;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A request body.
///
/// Bodies carry both bytes and the `Content-Type` implied by how they were
/// constructed; the inferred type is used only when the caller has not set
/// a `Content-Type` header of their own.
pub struct Body {
    inner: BodyInner,
    content_type: Option<String>,
}

enum BodyInner {
    Bytes(Bytes),
    Stream(ByteStream),
}

impl Body {
    /// Builds a `application/x-www-form-urlencoded` body from name/value
    /// pairs.  Names and values are percent-encoded.
    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs {
            serializer.append_pair(k.as_ref(), v.as_ref());
        }
        Self {
            inner: BodyInner::Bytes(Bytes::from(serializer.finish())),
            content_type: Some(FORM_CONTENT_TYPE.to_owned()),
        }
    }

    /// Builds a body from raw bytes with an explicit content type, the
    /// moral equivalent of passing a `Blob` to `fetch`.
    pub fn blob(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            inner: BodyInner::Bytes(data.into()),
            content_type: Some(content_type.into()),
        }
    }

    /// Wraps a chunk stream as a body.
    ///
    /// The transport only accepts buffered bodies, so the stream is drained
    /// to completion before the first hop is sent.  A stream error fails
    /// the fetch with a body error before any bytes reach the wire.
    pub fn wrap_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        Self {
            inner: BodyInner::Stream(Box::pin(stream)),
            content_type: None,
        }
    }

    /// Returns the buffered bytes, or `None` for a not-yet-drained stream
    /// body.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.inner {
            BodyInner::Bytes(bytes) => Some(bytes),
            BodyInner::Stream(_) => None,
        }
    }

    /// The content type this body implies, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Attempts to clone this body.  Stream bodies are single-use and
    /// return `None`.
    pub fn try_clone(&self) -> Option<Self> {
        match &self.inner {
            BodyInner::Bytes(bytes) => Some(Self {
                inner: BodyInner::Bytes(bytes.clone()),
                content_type: self.content_type.clone(),
            }),
            BodyInner::Stream(_) => None,
        }
    }

    /// Resolves the body to buffered bytes plus its inferred content type.
    pub(crate) async fn coerce(self) -> Result<(Bytes, Option<String>), Error> {
        let bytes = match self.inner {
            BodyInner::Bytes(bytes) => bytes,
            BodyInner::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    let chunk =
                        chunk.map_err(|e| Error::body("request body stream failed").with_source(e))?;
                    buf.extend_from_slice(&chunk);
                }
                buf.freeze()
            }
        };
        Ok((bytes, self.content_type))
    }
}

impl From<String> for Body {
    /// Text bodies are sent as their UTF-8 bytes with no inferred content
    /// type; callers that want one set the `Content-Type` header.
    fn from(s: String) -> Self {
        Self {
            inner: BodyInner::Bytes(Bytes::from(s)),
            content_type: None,
        }
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self {
            inner: BodyInner::Bytes(Bytes::from_static(s.as_bytes())),
            content_type: None,
        }
    }
}

impl From<Vec<u8>> for Body {
    /// Raw byte bodies imply no content type.
    fn from(data: Vec<u8>) -> Self {
        Self {
            inner: BodyInner::Bytes(Bytes::from(data)),
            content_type: None,
        }
    }
}

impl From<&'static [u8]> for Body {
    fn from(data: &'static [u8]) -> Self {
        Self {
            inner: BodyInner::Bytes(Bytes::from_static(data)),
            content_type: None,
        }
    }
}

impl From<Bytes> for Body {
    fn from(data: Bytes) -> Self {
        Self {
            inner: BodyInner::Bytes(data),
            content_type: None,
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Body");
        match &self.inner {
            BodyInner::Bytes(bytes) => s.field("len", &bytes.len()),
            BodyInner::Stream(_) => s.field("stream", &".."),
        };
        s.field("content_type", &self.content_type).finish()
    }
}
