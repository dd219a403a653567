//! Transport multiplexer interface.
//!
//! The lifecycle controller hands [`PreparedTransfer`]s to a [`Multiplexer`],
//! which executes them concurrently. While a transfer runs, the multiplexer
//! streams bytes back through the static [`CallbackTable`] it was built with,
//! identifying the request only by its [`Token`]. When the transfer ends it
//! sends exactly one [`Completion`].
//!
//! - [`multi`]: default multiplexer on tokio + hyper
//! - [`connectjob`]: DNS → TCP → TLS connection flow
//! - [`client`]: plain or TLS transport stream
//!
//! [`CallbackTable`]: crate::urlrequest::dispatch::CallbackTable

pub mod client;
pub mod connectjob;
pub mod multi;

use crate::base::neterror::NetError;
use crate::urlrequest::registry::Token;
use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

pub use multi::HyperMultiplexer;

/// Everything the transport needs to run one attempt.
#[derive(Debug, Clone)]
pub struct PreparedTransfer {
    pub token: Token,
    pub url: String,
    pub method: String,
    /// `Key:Value` lines, `Content-Type` first.
    pub header_lines: Vec<String>,
    /// Present only when non-empty.
    pub body: Option<Bytes>,
    /// Zero disables the timeout.
    pub timeout: Duration,
    /// Ask for HTTP/2.
    pub http2: bool,
    /// Prefer waiting for a multiplexed connection over opening a new one.
    pub pipewait: bool,
    pub verify_peer: bool,
    pub verify_host: bool,
    /// CA bundle used to verify the peer.
    pub ca_info: PathBuf,
    /// Report outgoing headers through the debug callback.
    pub verbose: bool,
}

/// Measurements of a finished transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferInfo {
    pub effective_url: String,
    pub upload_size: u64,
    pub download_size: u64,
    pub total_time: Duration,
}

/// Terminal notification for one transfer.
#[derive(Debug, Clone)]
pub struct Completion {
    pub token: Token,
    pub result: Result<(), NetError>,
    pub info: TransferInfo,
}

impl Completion {
    /// A transfer that failed before producing any bytes.
    pub fn failed(token: Token, error: NetError, url: &str) -> Self {
        Self {
            token,
            result: Err(error),
            info: TransferInfo {
                effective_url: url.to_string(),
                ..Default::default()
            },
        }
    }
}

pub type CompletionSender = mpsc::UnboundedSender<Completion>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<Completion>;

/// Executes prepared transfers.
///
/// Per transfer, implementations deliver header bytes, then body bytes, then
/// exactly one [`Completion`] on `done`, and nothing for that token afterwards.
pub trait Multiplexer: Send {
    fn add_transfer(&mut self, transfer: PreparedTransfer, done: CompletionSender);
}
