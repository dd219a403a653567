use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::http::headercodec::HeaderFields;
use crate::http::retry::RetryBudget;
use crate::http::sink::StreamSink;
use crate::socket::TransferInfo;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Completion callback, invoked once per submission cycle.
pub type PerformCallback = Box<dyn FnOnce(&RequestHandle) + Send + 'static>;

/// Caller-facing configuration of one logical exchange.
///
/// Frozen while the request is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub url: String,
    pub method: String,
    pub content_type: String,
    /// Stream the response body into this file instead of memory.
    pub output_path: Option<PathBuf>,
    /// Whole-transfer timeout in milliseconds.
    pub timeout_ms: u64,
    /// Extra attempts allowed after the first non-success outcome.
    pub max_retry_count: u32,
    pub use_http2: bool,
    /// Skip peer and host certificate verification.
    pub insecure: bool,
    /// Capture outgoing headers and log a dump after the final attempt.
    pub debug: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "GET".to_string(),
            content_type: "application/text".to_string(),
            output_path: None,
            timeout_ms: 10_000,
            max_retry_count: 5,
            use_http2: false,
            insecure: false,
            debug: false,
        }
    }
}

/// One logical HTTP exchange across all of its attempts.
pub struct RequestDescriptor {
    pub(crate) config: RequestConfig,

    // Outgoing
    pub(crate) out_headers: HeaderFields,
    pub(crate) out_data: Option<Bytes>,

    // Lifecycle
    pub(crate) running: bool,
    pub(crate) retry_budget: RetryBudget,
    pub(crate) state: LoadState,
    pub(crate) attempts: u32,
    pub(crate) callback: Option<PerformCallback>,

    // Incoming, overwritten per attempt
    pub(crate) status: u16,
    pub(crate) message: Option<String>,
    pub(crate) http_version: Option<String>,
    pub(crate) in_headers: Option<HeaderFields>,
    pub(crate) in_data: Option<Bytes>,
    pub(crate) sent_headers: Option<HeaderFields>,
    pub(crate) info: Option<TransferInfo>,
    pub(crate) last_error: Option<NetError>,

    // Live only while an attempt is in flight
    pub(crate) header_sink: Option<StreamSink>,
    pub(crate) body_sink: Option<StreamSink>,
}

impl RequestDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_config(RequestConfig {
            url: url.into(),
            ..Default::default()
        })
    }

    pub fn with_config(config: RequestConfig) -> Self {
        let retry_budget = RetryBudget::new(config.max_retry_count);
        Self {
            config,
            out_headers: HeaderFields::new(),
            out_data: None,
            running: false,
            retry_budget,
            state: LoadState::Idle,
            attempts: 0,
            callback: None,
            status: 0,
            message: None,
            http_version: None,
            in_headers: None,
            in_data: None,
            sent_headers: None,
            info: None,
            last_error: None,
            header_sink: None,
            body_sink: None,
        }
    }

    /// Wrap into a shareable handle for submission.
    pub fn into_handle(self) -> RequestHandle {
        RequestHandle(Arc::new(Mutex::new(self)))
    }

    /// A fresh idle request with the same configuration and outgoing state.
    pub fn duplicate(&self) -> Self {
        let mut copy = Self::with_config(self.config.clone());
        copy.out_headers = self.out_headers.clone();
        copy.out_data = self.out_data.clone();
        copy
    }

    /// Restore defaults. Ignored while running.
    pub fn reset(&mut self) {
        if self.reject_if_running("reset") {
            return;
        }
        *self = Self::with_config(RequestConfig::default());
    }

    fn reject_if_running(&self, what: &str) -> bool {
        if self.running {
            tracing::warn!(url = %self.config.url, what, "request is running, change ignored");
        }
        self.running
    }

    // Configuration

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn method(&self) -> &str {
        &self.config.method
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        if !self.reject_if_running("url") {
            self.config.url = url.into();
        }
    }

    pub fn set_method(&mut self, method: impl Into<String>) {
        if !self.reject_if_running("method") {
            self.config.method = method.into();
        }
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        if !self.reject_if_running("content_type") {
            self.config.content_type = content_type.into();
        }
    }

    pub fn set_output_path(&mut self, path: Option<PathBuf>) {
        if !self.reject_if_running("output_path") {
            self.config.output_path = path;
        }
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        if !self.reject_if_running("timeout_ms") {
            self.config.timeout_ms = timeout_ms;
        }
    }

    pub fn set_max_retry_count(&mut self, count: u32) {
        if !self.reject_if_running("max_retry_count") {
            self.config.max_retry_count = count;
        }
    }

    pub fn set_use_http2(&mut self, enabled: bool) {
        if !self.reject_if_running("use_http2") {
            self.config.use_http2 = enabled;
        }
    }

    pub fn set_insecure(&mut self, insecure: bool) {
        if !self.reject_if_running("insecure") {
            self.config.insecure = insecure;
        }
    }

    pub fn set_debug(&mut self, debug: bool) {
        if !self.reject_if_running("debug") {
            self.config.debug = debug;
        }
    }

    pub fn set_out_data(&mut self, data: impl Into<Bytes>) {
        if !self.reject_if_running("out_data") {
            self.out_data = Some(data.into());
        }
    }

    pub fn clear_out_data(&mut self) {
        if !self.reject_if_running("out_data") {
            self.out_data = None;
        }
    }

    pub fn out_data(&self) -> Option<&Bytes> {
        self.out_data.as_ref()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.config.output_path.as_deref()
    }

    // Headers

    /// Set an outgoing header. Keys are case-sensitive; the last write wins.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        if !self.reject_if_running("header") {
            self.out_headers.insert(key, value);
        }
    }

    pub fn request_header(&self, key: &str) -> Option<&str> {
        self.out_headers.get(key)
    }

    pub fn request_headers(&self) -> &HeaderFields {
        &self.out_headers
    }

    /// Absent until a response header block has been parsed.
    pub fn response_header(&self, key: &str) -> Option<&str> {
        self.in_headers.as_ref()?.get(key)
    }

    /// Like [`response_header`](Self::response_header), ignoring ASCII case.
    /// Transports that normalize header names (hyper lowercases them) need this.
    pub fn response_header_ignore_case(&self, key: &str) -> Option<&str> {
        self.in_headers.as_ref()?.get_ignore_ascii_case(key)
    }

    pub fn response_headers(&self) -> Option<&HeaderFields> {
        self.in_headers.as_ref()
    }

    /// Headers the transport reported sending, captured in debug mode.
    pub fn sent_headers(&self) -> Option<&HeaderFields> {
        self.sent_headers.as_ref()
    }

    // Outcome

    /// In-memory response body. Always `None` when streaming to a file.
    pub fn in_data(&self) -> Option<&Bytes> {
        self.in_data.as_ref()
    }

    /// HTTP status of the last attempt, 0 when none was parsed.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn http_version(&self) -> Option<&str> {
        self.http_version.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn retry_budget(&self) -> i32 {
        self.retry_budget.remaining()
    }

    pub fn load_state(&self) -> LoadState {
        self.state
    }

    /// Attempts made in the current (or last) submission cycle.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn transfer_info(&self) -> Option<&TransferInfo> {
        self.info.as_ref()
    }

    /// Transport error of the final attempt, if it failed below HTTP.
    pub fn last_error(&self) -> Option<NetError> {
        self.last_error
    }
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        Self::with_config(RequestConfig::default())
    }
}

impl std::fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("config", &self.config)
            .field("out_headers", &self.out_headers)
            .field("out_data_len", &self.out_data.as_ref().map(|d| d.len()))
            .field("running", &self.running)
            .field("retry_budget", &self.retry_budget.remaining())
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("status", &self.status)
            .field("message", &self.message)
            .field("in_data_len", &self.in_data.as_ref().map(|d| d.len()))
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Shared handle to a request.
///
/// The caller, the controller and the registry each hold one; the request is
/// freed when the last handle goes away.
#[derive(Debug, Clone)]
pub struct RequestHandle(Arc<Mutex<RequestDescriptor>>);

impl RequestHandle {
    pub fn new(descriptor: RequestDescriptor) -> Self {
        descriptor.into_handle()
    }

    /// Lock the request. A poisoned lock is recovered, the data stays usable.
    pub fn lock(&self) -> MutexGuard<'_, RequestDescriptor> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ptr_eq(&self, other: &RequestHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
