//! Percent-encoding helpers for building query strings and paths.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except RFC 3986 unreserved characters gets encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode `data`, leaving only unreserved characters as-is.
pub fn escape(data: &str) -> String {
    utf8_percent_encode(data, UNRESERVED).to_string()
}

/// Decode percent escapes. Returns `None` if the result is not valid UTF-8.
pub fn unescape(data: &str) -> Option<String> {
    percent_decode_str(data)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}
