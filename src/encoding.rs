//! Charset detection and lossy text decoding for response bodies.

use encoding_rs::{Encoding, UTF_8};

use crate::headers::Headers;

/// Extracts the `charset` parameter from the response `Content-Type`
/// header, if present.
pub(crate) fn charset_from_content_type(headers: &Headers) -> Option<String> {
    let content_type = headers.get("content-type")?;
    for param in content_type.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("charset") {
            continue;
        }
        let value = value.trim().trim_matches('"');
        if !value.is_empty() {
            return Some(value.to_owned());
        }
    }
    None
}

/// Decodes `data` using the labeled charset, falling back to UTF-8 when
/// the label is absent or unknown.  Malformed sequences become U+FFFD
/// rather than errors.
pub(crate) fn decode_body(data: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(data);
    text.into_owned()
}
