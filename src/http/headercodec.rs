//! Header wire codec.
//!
//! Outgoing headers are serialized into `Key:Value` lines for the transport.
//! Incoming header blocks arrive as raw bytes from the header sink and are
//! decoded into a [`ResponseHead`].

use crate::http::response::ResponseHead;

/// A header map that preserves insertion order and original key casing.
///
/// Keys are compared exactly (case-sensitive), and inserting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    headers: Vec<(String, String)>,
}

impl HeaderFields {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Insert or replace; the last write wins.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        if let Some((_, v)) = self.headers.iter_mut().find(|(n, _)| *n == name) {
            *v = value;
        } else {
            self.headers.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Lookup ignoring ASCII case. Transports may normalize casing on the wire.
    pub fn get_ignore_ascii_case(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.headers.iter().position(|(n, _)| n == name)?;
        Some(self.headers.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = HeaderFields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// Serialize outgoing headers into wire lines.
///
/// The `Content-Type` line always comes first, followed by user headers in
/// insertion order.
pub fn encode_request_header(content_type: &str, headers: &HeaderFields) -> Vec<String> {
    let mut lines = Vec::with_capacity(headers.len() + 1);
    lines.push(format!("Content-Type:{}", content_type));
    for (key, value) in headers.iter() {
        lines.push(format!("{}:{}", key, value));
    }
    lines
}

/// Decode a status line plus header block.
///
/// Never fails: an unparsable status yields 0, lines without a colon are
/// skipped, and running out of input ends the block like a blank line would.
pub fn decode_response_header(raw: &[u8]) -> ResponseHead {
    let text = String::from_utf8_lossy(raw);
    let mut lines = text.lines();

    let mut head = ResponseHead::default();

    if let Some(first) = lines.next() {
        let (version, status, message) = split_status_line(first);
        head.version = version.to_string();
        head.status = status;
        head.message = message.to_string();
        if status == 0 {
            tracing::debug!(line = %first, "malformed status line");
        }
    }

    head.headers = decode_header_lines(lines);
    head
}

/// Parse `key: value` lines until a blank line or the end of input.
pub fn decode_header_lines<'a>(lines: impl Iterator<Item = &'a str>) -> HeaderFields {
    let mut headers = HeaderFields::new();
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        match line.split_once(':') {
            Some((key, value)) => headers.insert(key.trim(), value.trim()),
            None => tracing::trace!(line = %line, "skipping header line without colon"),
        }
    }
    headers
}

/// `<version> <status> <message...>`, split on the first two spaces.
fn split_status_line(line: &str) -> (&str, u16, &str) {
    let line = line.trim_end();
    let Some((version, rest)) = line.split_once(' ') else {
        return (line, 0, "");
    };
    let (code, message) = rest.split_once(' ').unwrap_or((rest, ""));
    let status = code.trim().parse::<u16>().unwrap_or(0);
    (version, status, message)
}
