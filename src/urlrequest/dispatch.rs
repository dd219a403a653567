//! Static callbacks the transport invokes while a transfer streams.
//!
//! These are plain functions, registered once with a multiplexer through
//! [`CALLBACKS`]. They carry no per-request state: each one resolves its
//! request from the token through the global registry.

use crate::http::headercodec::{decode_header_lines, HeaderFields};
use crate::urlrequest::registry::{HandleRegistry, Token};

/// What a debug callback invocation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugKind {
    Text,
    HeaderIn,
    HeaderOut,
    DataIn,
    DataOut,
}

/// Returns the number of bytes consumed; anything short of the chunk length aborts the transfer.
pub type HeaderFn = fn(Token, &[u8]) -> usize;
pub type WriteFn = fn(Token, &[u8]) -> usize;
pub type DebugFn = fn(Token, DebugKind, &[u8]);

#[derive(Debug, Clone, Copy)]
pub struct CallbackTable {
    pub header: HeaderFn,
    pub write: WriteFn,
    pub debug: DebugFn,
}

pub const CALLBACKS: CallbackTable = CallbackTable {
    header: header_function,
    write: write_function,
    debug: debug_function,
};

/// Response header bytes for `token`.
pub fn header_function(token: Token, chunk: &[u8]) -> usize {
    let Some(handle) = HandleRegistry::global().resolve(token) else {
        tracing::warn!(?token, "header bytes for unknown token");
        return 0;
    };
    let mut req = handle.lock();
    tracing::trace!(?token, len = chunk.len(), "header chunk");
    match req.header_sink.as_mut() {
        Some(sink) => sink.append(chunk).unwrap_or(0),
        None => 0,
    }
}

/// Response body bytes for `token`.
pub fn write_function(token: Token, chunk: &[u8]) -> usize {
    let Some(handle) = HandleRegistry::global().resolve(token) else {
        tracing::warn!(?token, "body bytes for unknown token");
        return 0;
    };
    let mut req = handle.lock();
    tracing::trace!(?token, len = chunk.len(), "body chunk");
    match req.body_sink.as_mut() {
        Some(sink) => sink.append(chunk).unwrap_or(0),
        None => 0,
    }
}

/// Verbose transport output. Outgoing header blocks are captured on the request.
pub fn debug_function(token: Token, kind: DebugKind, data: &[u8]) {
    if kind != DebugKind::HeaderOut {
        tracing::trace!(?token, ?kind, len = data.len(), "transport debug");
        return;
    }
    let Some(handle) = HandleRegistry::global().resolve(token) else {
        return;
    };

    let text = String::from_utf8_lossy(data);
    // First line is the request line.
    let parsed = decode_header_lines(text.lines().skip(1));

    let mut req = handle.lock();
    let sent = req.sent_headers.get_or_insert_with(HeaderFields::new);
    for (key, value) in parsed.iter() {
        sent.insert(key, value);
    }
}
