#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

#[macro_use]
mod tracing;

mod body;
mod cancel;
mod client;
pub mod cookies;
mod encoding;
mod error;
mod headers;
pub mod redirect;
mod request;
mod response;
pub mod transport;

pub use body::Body;
pub use cancel::CancelToken;
pub use client::{Client, ClientBuilder};
pub use cookies::{CookieJar, MemoryCookieJar, SyncCookieJar};
pub use error::Error;
pub use headers::Headers;
pub use request::{FetchInit, IntoResource, Request, Resource};
pub use response::Response;
pub use transport::{BrowserProfile, HopRequest, Transport, TransportResponse};

pub use http::Method;
pub use http::StatusCode;
pub use url::Url;

pub use bytes::Bytes;
pub use futures_core::Stream;

/// A `Result` alias where the `Err` case is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_re_export() {
        let ok = StatusCode::OK;
        assert_eq!(ok.as_u16(), 200);
        assert!(!ok.is_client_error());
        assert!(StatusCode::NOT_FOUND.is_client_error());
        assert!(StatusCode::INTERNAL_SERVER_ERROR.is_server_error());
    }

    #[test]
    fn method_re_export() {
        assert_eq!(Method::GET.as_str(), "GET");
        assert_eq!(Method::POST.as_str(), "POST");
        assert_eq!(Method::HEAD.as_str(), "HEAD");
        assert_eq!(Method::PATCH.as_str(), "PATCH");
    }

    #[test]
    fn result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
