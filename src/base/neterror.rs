//! Network error codes.
//!
//! Codes follow the Chromium numbering: -1xx connection, -3xx HTTP. Errors
//! raised by the request engine itself live in the -9xx block.

use thiserror::Error;

/// Declares every variant once, with its code and message, and derives the
/// code conversions in both directions from that list.
macro_rules! net_errors {
    ($( $name:ident = $code:literal => $msg:tt, )*) => {
        #[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
        pub enum NetError {
            $(
                #[error($msg)]
                $name,
            )*
            #[error("Unknown error: {0}")]
            Unknown(i32),
        }

        impl NetError {
            pub fn as_i32(&self) -> i32 {
                match self {
                    $( NetError::$name => $code, )*
                    NetError::Unknown(code) => *code,
                }
            }
        }

        impl From<i32> for NetError {
            fn from(code: i32) -> Self {
                match code {
                    $( $code => NetError::$name, )*
                    _ => NetError::Unknown(code),
                }
            }
        }
    };
}

net_errors! {
    // Connection
    ConnectionClosed = -100 => "Connection closed (TCP FIN)",
    ConnectionReset = -101 => "Connection reset (TCP RST)",
    ConnectionRefused = -102 => "Connection refused",
    ConnectionAborted = -103 => "Connection aborted",
    ConnectionFailed = -104 => "Connection failed",
    NameNotResolved = -105 => "Name not resolved",
    SslProtocolError = -107 => "SSL protocol error",
    ConnectionTimedOut = -118 => "Connection timed out",
    AlpnNegotiationFailed = -122 => "ALPN negotiation failed",

    // HTTP
    InvalidUrl = -300 => "Invalid URL",
    UnknownUrlScheme = -302 => "Unknown URL scheme",
    InvalidResponse = -320 => "Invalid response",
    MethodNotSupported = -322 => "Method not supported",
    EmptyResponse = -324 => "Empty response",
    Http2ProtocolError = -337 => "HTTP/2 protocol error",

    // Engine
    SinkWriteFailed = -910 => "Sink refused streamed bytes",
    FileSinkOpenFailed = -911 => "Output file could not be opened",
    TrustBundleUnavailable = -912 => "Trust bundle unavailable",
    NotInitialized = -913 => "Transport layer not initialized",
    InvalidHeader = -914 => "Invalid header",
}

impl NetError {
    /// Whether the error happened below the HTTP layer (socket, TLS, timeout).
    pub fn is_transport(&self) -> bool {
        (-199..=-100).contains(&self.as_i32())
    }
}
