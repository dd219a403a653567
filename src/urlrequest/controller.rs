//! Per-request state machine driving attempts through a multiplexer.
//!
//! ```text
//! Idle → Preparing → InFlight → Completed
//!                        │    → Failed
//!                        ├──→ Redirecting ─┐
//!                        └──→ Retrying ────┴→ Preparing
//! ```
//!
//! Each attempt registers the request under a fresh token, hands a
//! [`PreparedTransfer`] to the multiplexer and waits for its [`Completion`].
//! The token is released as soon as the completion arrives. Failures and
//! redirect hops draw from one shared [`RetryBudget`]; a 200 outcome never
//! does. The stored callback fires exactly once, after the last attempt.
//!
//! The process-wide trust bundle must be provisioned with
//! [`tls::global_init`](crate::tls::global_init) before [`LifecycleController::new`].
//!
//! Cancelling an attempt that is in flight is not supported.

use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::http::headercodec::{decode_response_header, encode_request_header, HeaderFields};
use crate::http::retry::{AttemptOutcome, RetryBudget};
use crate::http::sink::StreamSink;
use crate::socket::{
    Completion, CompletionReceiver, CompletionSender, Multiplexer, PreparedTransfer,
};
use crate::tls;
use crate::urlrequest::descriptor::{PerformCallback, RequestDescriptor, RequestHandle};
use crate::urlrequest::diagnostics;
use crate::urlrequest::registry::{HandleRegistry, Token};
use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// What to do once the descriptor lock is dropped.
enum Next {
    Finish(Option<PerformCallback>),
    Resubmit,
}

pub struct LifecycleController<M: Multiplexer> {
    multiplexer: M,
    ca_info: PathBuf,
    completions_tx: CompletionSender,
    completions_rx: CompletionReceiver,
    in_flight: usize,
}

impl<M: Multiplexer> LifecycleController<M> {
    /// Controller using the globally provisioned trust bundle.
    pub fn new(multiplexer: M) -> Result<Self, NetError> {
        let ca_info = tls::ca_info_path().ok_or(NetError::NotInitialized)?;
        Ok(Self::with_ca_info(multiplexer, ca_info.to_path_buf()))
    }

    pub fn with_ca_info(multiplexer: M, ca_info: PathBuf) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            multiplexer,
            ca_info,
            completions_tx,
            completions_rx,
            in_flight: 0,
        }
    }

    pub fn multiplexer(&self) -> &M {
        &self.multiplexer
    }

    pub fn multiplexer_mut(&mut self) -> &mut M {
        &mut self.multiplexer
    }

    /// Attempts handed out whose completion has not been processed yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Start a submission cycle for `handle`.
    ///
    /// Returns `false` without touching the request if it is already running.
    /// Otherwise `callback` fires exactly once, when the cycle ends.
    pub fn submit<F>(&mut self, handle: &RequestHandle, callback: F) -> bool
    where
        F: FnOnce(&RequestHandle) + Send + 'static,
    {
        {
            let mut req = handle.lock();
            if req.running {
                tracing::warn!(url = %req.url(), "can't perform a running request again");
                return false;
            }
            req.running = true;
            req.retry_budget = RetryBudget::new(req.config.max_retry_count);
            req.attempts = 0;
            req.callback = Some(Box::new(callback));
        }
        self.start_attempt(handle);
        true
    }

    /// Drive completions until nothing is in flight.
    pub async fn perform(&mut self) {
        while self.in_flight > 0 {
            match self.completions_rx.recv().await {
                Some(completion) => self.on_completion(completion),
                None => break,
            }
        }
    }

    /// Process the completions already queued, without waiting.
    /// Returns how many were handled.
    pub fn poll_completions(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.on_completion(completion);
            handled += 1;
        }
        handled
    }

    /// Settle one attempt: classify it, charge the budget, then either
    /// resubmit or finish the cycle.
    pub fn on_completion(&mut self, completion: Completion) {
        let token = completion.token;
        let Some(handle) = HandleRegistry::global().release(token) else {
            tracing::warn!(?token, "completion for unknown token");
            return;
        };
        self.in_flight = self.in_flight.saturating_sub(1);

        let next = {
            let mut guard = handle.lock();
            let req = &mut *guard;
            req.info = Some(completion.info);
            let header_sink = req.header_sink.take();
            let body_sink = req.body_sink.take();

            let outcome = match completion.result {
                Ok(()) => absorb_response(req, header_sink, body_sink),
                Err(error) => {
                    if let Some(Err(e)) = body_sink.map(StreamSink::finalize) {
                        tracing::debug!(?token, error = %e, "partial body not flushed");
                    }
                    req.last_error = Some(error);
                    tracing::warn!(?token, url = %req.config.url, error = %error, "failed to request");
                    AttemptOutcome::TransportFailure(error)
                }
            };

            if let AttemptOutcome::Redirect(location) = &outcome {
                tracing::debug!(?token, from = %req.config.url, to = %location, "redirect");
                req.config.url = location.to_string();
            }

            let state = req.retry_budget.next_state(&outcome);
            req.state = state;
            tracing::debug!(
                ?token,
                ?outcome,
                ?state,
                budget = req.retry_budget.remaining(),
                "attempt settled"
            );

            if state.is_terminal() {
                if req.config.debug {
                    tracing::info!(target: "easynet::diagnostics", "{}", diagnostics::dump(req));
                }
                req.running = false;
                Next::Finish(req.callback.take())
            } else {
                Next::Resubmit
            }
        };

        match next {
            Next::Finish(Some(callback)) => callback(&handle),
            Next::Finish(None) => {}
            Next::Resubmit => self.start_attempt(&handle),
        }
    }

    fn start_attempt(&mut self, handle: &RequestHandle) {
        self.in_flight += 1;
        match self.prepare(handle) {
            Ok(transfer) => {
                tracing::debug!(token = ?transfer.token, url = %transfer.url, "submitting transfer");
                self.multiplexer
                    .add_transfer(transfer, self.completions_tx.clone());
            }
            Err((token, error)) => {
                let url = handle.lock().url().to_string();
                // The receiver lives on self, so this cannot fail.
                let _ = self
                    .completions_tx
                    .send(Completion::failed(token, error, &url));
            }
        }
    }

    /// Wire up one attempt. On error the token is still registered and the
    /// caller must deliver a failed completion for it.
    fn prepare(&self, handle: &RequestHandle) -> Result<PreparedTransfer, (Token, NetError)> {
        let token = HandleRegistry::global().register(handle.clone());
        let mut guard = handle.lock();
        let req = &mut *guard;

        req.state = LoadState::Preparing;
        req.attempts += 1;
        reset_incoming(req);

        req.header_sink = Some(StreamSink::memory());
        let body_sink = StreamSink::for_output(req.config.output_path.as_deref()).map_err(|e| {
            tracing::warn!(?token, error = %e, "could not open output sink");
            (token, e)
        })?;
        req.body_sink = Some(body_sink);

        let config = &req.config;
        let transfer = PreparedTransfer {
            token,
            url: config.url.clone(),
            method: config.method.clone(),
            header_lines: encode_request_header(&config.content_type, &req.out_headers),
            body: req.out_data.clone().filter(|data| !data.is_empty()),
            timeout: Duration::from_millis(config.timeout_ms),
            http2: config.use_http2,
            pipewait: config.use_http2,
            verify_peer: !config.insecure,
            verify_host: !config.insecure,
            ca_info: self.ca_info.clone(),
            verbose: config.debug,
        };

        req.state = LoadState::InFlight;
        tracing::debug!(?token, attempt = req.attempts, "prepared");
        Ok(transfer)
    }
}

fn reset_incoming(req: &mut RequestDescriptor) {
    req.status = 0;
    req.message = None;
    req.http_version = None;
    req.in_headers = None;
    req.in_data = None;
    req.info = None;
    req.last_error = None;
    req.sent_headers = req.config.debug.then(HeaderFields::new);
}

/// Decode the captured header block and body of a finished transfer.
fn absorb_response(
    req: &mut RequestDescriptor,
    header_sink: Option<StreamSink>,
    body_sink: Option<StreamSink>,
) -> AttemptOutcome {
    let raw = match header_sink.map(StreamSink::finalize) {
        Some(Ok(Some(bytes))) => bytes,
        _ => Bytes::new(),
    };
    let head = decode_response_header(&raw);
    let mut outcome = AttemptOutcome::from_response(&head, &req.config.url);

    match body_sink.map(StreamSink::finalize).transpose() {
        Ok(body) => req.in_data = body.flatten(),
        Err(e) => {
            req.last_error = Some(e);
            outcome = AttemptOutcome::TransportFailure(e);
        }
    }

    req.status = head.status;
    req.message = Some(head.message);
    req.http_version = Some(head.version);
    req.in_headers = Some(head.headers);
    outcome
}
