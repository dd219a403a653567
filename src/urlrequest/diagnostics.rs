//! Human-readable dump of a finished exchange.

use crate::http::headercodec::HeaderFields;
use crate::urlrequest::descriptor::RequestDescriptor;
use std::fmt::Write;

/// Body previews are cut at this many bytes.
pub const BODY_PREVIEW_LIMIT: usize = 0x400;

/// Summarize the last attempt of `req`. Pure read.
pub fn dump(req: &RequestDescriptor) -> String {
    let mut out = String::new();
    let info = req.transfer_info().cloned().unwrap_or_default();
    let effective_url = if info.effective_url.is_empty() {
        req.url()
    } else {
        info.effective_url.as_str()
    };
    let out_len = req.out_data().map_or(0, |d| d.len());
    let in_len = req.in_data().map_or(0, |d| d.len());

    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "{} [ {} ] [ {} {} {} ] [ {}({}) | {}({}) ] [ {} ms ]",
        effective_url,
        req.method().to_uppercase(),
        req.http_version().unwrap_or(""),
        req.status(),
        req.message().unwrap_or(""),
        info.upload_size,
        out_len,
        info.download_size,
        in_len,
        info.total_time.as_millis()
    );

    if let Some(sent) = req.sent_headers() {
        write_headers(&mut out, "Request Headers", sent);
    }
    if let Some(data) = req.out_data().filter(|d| !d.is_empty()) {
        write_body(&mut out, "Request Body", data);
    }
    if let Some(received) = req.response_headers() {
        write_headers(&mut out, "Response Headers", received);
    }
    if let Some(data) = req.in_data().filter(|d| !d.is_empty()) {
        write_body(&mut out, "Response Body", data);
    }
    out
}

fn write_headers(out: &mut String, title: &str, headers: &HeaderFields) {
    let _ = writeln!(out, "{}", title);
    for (key, value) in headers.iter() {
        let _ = writeln!(out, "[{}] {}", key, value);
    }
}

fn write_body(out: &mut String, title: &str, data: &[u8]) {
    let _ = writeln!(out, "{} [ {} ]", title, data.len());
    let preview = &data[..data.len().min(BODY_PREVIEW_LIMIT)];
    let _ = writeln!(out, "{}", String::from_utf8_lossy(preview));
}
