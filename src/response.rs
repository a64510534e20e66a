//! The response wrapper: lazy body access over the terminal hop.

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::future::{select, Either};
use futures_util::StreamExt;
use http::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::cancel::CancelToken;
use crate::encoding::{charset_from_content_type, decode_body};
use crate::error::Error;
use crate::headers::Headers;
use crate::transport::{ByteStream, TransportResponse};

/// The terminal response of a fetch.
///
/// Status, headers, and the final URL are available immediately; the body
/// is delivered lazily through [`chunk`](Self::chunk),
/// [`bytes`](Self::bytes), [`text`](Self::text), [`json`](Self::json), or
/// [`bytes_stream`](Self::bytes_stream).  Once collected via `bytes` the
/// body is cached, so `text` and `json` can be called after it (or after
/// each other) without re-reading anything.
pub struct Response {
    status: StatusCode,
    url: Url,
    headers: Headers,
    stream: Option<ByteStream>,
    buffered: Option<Bytes>,
    signal: Option<CancelToken>,
    aborted: bool,
    streamed: bool,
}

impl Response {
    pub(crate) fn from_hop(
        response: TransportResponse,
        url: Url,
        signal: Option<CancelToken>,
    ) -> Self {
        Self {
            status: response.status,
            url,
            headers: Headers::from(response.headers),
            stream: Some(response.body),
            buffered: None,
            signal,
            aborted: false,
            streamed: false,
        }
    }

    /// The response status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// `true` for any `2xx` status.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// The URL the terminal response actually came from, after all
    /// redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// All `Set-Cookie` values in wire order.
    ///
    /// These have already been forwarded to the cookie jar, if one is
    /// configured; this accessor is for callers that inspect cookies
    /// directly.
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers.get_all("set-cookie")
    }

    /// The parsed `Content-Length` header, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.headers.get("content-length")?.trim().parse().ok()
    }

    /// Delivers the next body chunk, or `None` when the body is finished.
    ///
    /// If the fetch's cancellation signal fires, delivery stops: this and
    /// every later call return `None`.  That mirrors an aborted download,
    /// not an error, since the response itself already arrived.
    ///
    /// Chunked iteration and [`bytes`](Self::bytes) are mutually
    /// exclusive: once `chunk` has been called, `bytes` (and therefore
    /// `text`/`json`) fails with a body error rather than buffering a
    /// partial body.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, Error> {
        self.streamed = true;
        self.next_chunk().await
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        if self.aborted {
            return Ok(None);
        }
        if let Some(token) = &self.signal {
            if token.is_cancelled() {
                self.abort();
                return Ok(None);
            }
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::body("response body already consumed").with_url(self.url.clone()));
        };

        let item = match &self.signal {
            Some(token) => {
                let next = std::pin::pin!(stream.next());
                let cancelled = std::pin::pin!(token.cancelled());
                match select(next, cancelled).await {
                    Either::Left((item, _)) => Some(item),
                    Either::Right(_) => None,
                }
            }
            None => Some(stream.next().await),
        };
        let Some(item) = item else {
            self.abort();
            return Ok(None);
        };

        match item {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(Error::transport(e).with_url(self.url.clone())),
            None => {
                self.stream = None;
                Ok(None)
            }
        }
    }

    /// Collects the whole body into one buffer and caches it.
    ///
    /// Later calls return the cached buffer.  Fails with a body error if
    /// chunked iteration was already started via [`chunk`](Self::chunk),
    /// or if delivery was aborted before completion.
    pub async fn bytes(&mut self) -> Result<Bytes, Error> {
        if let Some(buffered) = &self.buffered {
            return Ok(buffered.clone());
        }
        if self.streamed || self.aborted || self.stream.is_none() {
            return Err(Error::body("response body already consumed").with_url(self.url.clone()));
        }

        let mut parts: Vec<Bytes> = Vec::new();
        let mut total = 0usize;
        while let Some(chunk) = self.next_chunk().await? {
            total += chunk.len();
            parts.push(chunk);
        }
        if self.aborted {
            return Err(Error::body("response body aborted").with_url(self.url.clone()));
        }

        let bytes = match parts.len() {
            0 => Bytes::new(),
            1 => parts.remove(0),
            _ => {
                let mut buf = BytesMut::with_capacity(total);
                for part in parts {
                    buf.extend_from_slice(&part);
                }
                buf.freeze()
            }
        };
        self.buffered = Some(bytes.clone());
        Ok(bytes)
    }

    /// Decodes the body as text.
    ///
    /// The charset comes from the `Content-Type` header's `charset`
    /// parameter, defaulting to UTF-8; malformed sequences are replaced,
    /// never rejected.
    pub async fn text(&mut self) -> Result<String, Error> {
        let charset = charset_from_content_type(&self.headers);
        let bytes = self.bytes().await?;
        Ok(decode_body(&bytes, charset.as_deref()))
    }

    /// Deserializes the body as JSON.
    ///
    /// The body is charset-decoded first, so JSON served in a legacy
    /// encoding still parses.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let text = self.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| Error::decode(format!("invalid JSON body: {e}")).with_url(self.url.clone()))
    }

    /// Converts this response into a chunk stream.
    ///
    /// The stream honors the same cancellation semantics as
    /// [`chunk`](Self::chunk): it simply ends when the signal fires.
    pub fn bytes_stream(self) -> impl Stream<Item = Result<Bytes, Error>> {
        futures_util::stream::unfold(self, |mut response| async move {
            match response.chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), response)),
                Ok(None) => None,
                Err(e) => {
                    // Yield the error, then end on the next poll.
                    response.abort();
                    Some((Err(e), response))
                }
            }
        })
    }

    /// Stops body delivery and drops the underlying stream.
    pub fn abort(&mut self) {
        self.stream = None;
        self.aborted = true;
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::BoxError;
    use serde::Deserialize;

    fn response_with(
        status: StatusCode,
        headers: Vec<(&str, &str)>,
        body: &str,
        signal: Option<CancelToken>,
    ) -> Response {
        let headers = headers
            .into_iter()
            .map(|(n, v)| (n.to_owned(), v.to_owned()))
            .collect();
        Response::from_hop(
            TransportResponse::from_bytes(status, headers, body.to_owned()),
            "https://example.com/final".parse().unwrap(),
            signal,
        )
    }

    fn chunked_response(chunks: Vec<Result<Bytes, BoxError>>, signal: Option<CancelToken>) -> Response {
        Response::from_hop(
            TransportResponse {
                status: StatusCode::OK,
                headers: vec![],
                body: Box::pin(futures_util::stream::iter(chunks)),
            },
            "https://example.com/final".parse().unwrap(),
            signal,
        )
    }

    #[test]
    fn metadata_accessors() {
        let response = response_with(
            StatusCode::CREATED,
            vec![("Content-Length", "5"), ("X-Id", "7")],
            "hello",
            None,
        );
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.ok());
        assert_eq!(response.url().as_str(), "https://example.com/final");
        assert_eq!(response.headers().get("x-id"), Some("7"));
        assert_eq!(response.content_length(), Some(5));
    }

    #[test]
    fn ok_is_2xx_only() {
        let cases = [
            (StatusCode::OK, true),
            (StatusCode::NO_CONTENT, true),
            (StatusCode::MOVED_PERMANENTLY, false),
            (StatusCode::NOT_FOUND, false),
            (StatusCode::INTERNAL_SERVER_ERROR, false),
        ];
        for (status, expected) in cases {
            let response = response_with(status, vec![], "", None);
            assert_eq!(response.ok(), expected, "status {status}");
        }
    }

    #[test]
    fn set_cookies_preserves_order() {
        let response = response_with(
            StatusCode::OK,
            vec![("Set-Cookie", "a=1"), ("X-Other", "x"), ("Set-Cookie", "b=2")],
            "",
            None,
        );
        let cookies: Vec<_> = response.set_cookies().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[tokio::test]
    async fn chunk_walks_the_body() {
        let mut response = chunked_response(
            vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))],
            None,
        );
        assert_eq!(response.chunk().await.unwrap(), Some(Bytes::from_static(b"ab")));
        assert_eq!(response.chunk().await.unwrap(), Some(Bytes::from_static(b"cd")));
        assert_eq!(response.chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn bytes_caches_for_repeat_access() {
        let mut response = response_with(StatusCode::OK, vec![], "payload", None);
        assert_eq!(&response.bytes().await.unwrap()[..], b"payload");
        // Second read hits the cache, not the (drained) stream.
        assert_eq!(&response.bytes().await.unwrap()[..], b"payload");
    }

    #[tokio::test]
    async fn bytes_after_chunk_drain_is_a_body_error() {
        let mut response = response_with(StatusCode::OK, vec![], "x", None);
        while response.chunk().await.unwrap().is_some() {}
        let err = response.bytes().await.unwrap_err();
        assert!(err.is_body());
    }

    #[tokio::test]
    async fn bytes_after_partial_chunking_is_a_body_error() {
        let mut response = chunked_response(
            vec![Ok(Bytes::from_static(b"first-")), Ok(Bytes::from_static(b"second"))],
            None,
        );
        assert_eq!(
            response.chunk().await.unwrap(),
            Some(Bytes::from_static(b"first-"))
        );

        // The remainder must not be passed off as the whole body.
        let err = response.bytes().await.unwrap_err();
        assert!(err.is_body());
        let err = response.text().await.unwrap_err();
        assert!(err.is_body());
    }

    #[tokio::test]
    async fn text_decodes_per_content_type_charset() {
        // "Žluťoučký" in windows-1250 is not valid UTF-8.
        let data = vec![0x8e, 0x6c, 0x75, 0xbb, 0x6f, 0x75, 0xe8, 0x6b, 0xfd];
        let mut response = Response::from_hop(
            TransportResponse::from_bytes(
                StatusCode::OK,
                vec![(
                    "Content-Type".to_owned(),
                    "text/html; charset=windows-1250".to_owned(),
                )],
                data,
            ),
            "https://example.com".parse().unwrap(),
            None,
        );
        assert_eq!(response.text().await.unwrap(), "Žluťoučký");
    }

    #[tokio::test]
    async fn json_bytes_text_agree_after_caching() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Payload {
            name: String,
            count: u32,
        }

        let body = r#"{"name":"widget","count":3}"#;
        let mut response = response_with(
            StatusCode::OK,
            vec![("Content-Type", "application/json")],
            body,
            None,
        );
        let bytes = response.bytes().await.unwrap();
        let text = response.text().await.unwrap();
        let parsed: Payload = response.json().await.unwrap();

        assert_eq!(&bytes[..], body.as_bytes());
        assert_eq!(text, body);
        assert_eq!(
            parsed,
            Payload {
                name: "widget".to_owned(),
                count: 3
            }
        );
    }

    #[tokio::test]
    async fn invalid_json_is_a_decode_error() {
        let mut response = response_with(StatusCode::OK, vec![], "not json", None);
        let err = response.json::<serde_json::Value>().await.unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn cancelled_signal_stops_chunk_delivery() {
        let token = CancelToken::new();
        let mut response = chunked_response(
            vec![Ok(Bytes::from_static(b"first")), Ok(Bytes::from_static(b"second"))],
            Some(token.clone()),
        );
        assert_eq!(
            response.chunk().await.unwrap(),
            Some(Bytes::from_static(b"first"))
        );

        token.cancel();
        // Delivery stops without an error.
        assert_eq!(response.chunk().await.unwrap(), None);
        assert_eq!(response.chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn bytes_after_abort_is_a_body_error() {
        let token = CancelToken::new();
        token.cancel();
        let mut response = chunked_response(vec![Ok(Bytes::from_static(b"x"))], Some(token));
        let err = response.bytes().await.unwrap_err();
        assert!(err.is_body());
    }

    #[tokio::test]
    async fn bytes_stream_yields_all_chunks() {
        let response = chunked_response(
            vec![Ok(Bytes::from_static(b"1")), Ok(Bytes::from_static(b"2"))],
            None,
        );
        let chunks: Vec<Bytes> = response
            .bytes_stream()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec![Bytes::from_static(b"1"), Bytes::from_static(b"2")]);
    }

    #[tokio::test]
    async fn mid_body_stream_error_surfaces_as_transport() {
        let mut response = chunked_response(
            vec![Ok(Bytes::from_static(b"start")), Err("connection reset".into())],
            None,
        );
        assert!(response.chunk().await.unwrap().is_some());
        let err = response.chunk().await.unwrap_err();
        assert!(err.is_transport());
    }
}
