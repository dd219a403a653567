//! Default multiplexer: one tokio task per transfer, hyper for the protocol.

use crate::base::neterror::NetError;
use crate::socket::client::TransportStream;
use crate::socket::connectjob::{ConnectJob, TlsSettings};
use crate::socket::{Completion, CompletionSender, Multiplexer, PreparedTransfer, TransferInfo};
use crate::urlrequest::dispatch::{CallbackTable, DebugKind};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, HOST};
use http::{HeaderMap, Method, Request, Response, Version};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper::ext::ReasonPhrase;
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::time::Instant;
use tokio::runtime::Handle;
use url::Url;

/// Runs transfers on a tokio runtime.
///
/// Transfers for different tokens run concurrently and may interleave their
/// callback deliveries. Connections are not pooled.
///
/// hyper normalizes response header names to lowercase before they reach the
/// header callback, so look them up in lowercase or through
/// [`RequestDescriptor::response_header_ignore_case`].
///
/// [`RequestDescriptor::response_header_ignore_case`]: crate::urlrequest::RequestDescriptor::response_header_ignore_case
pub struct HyperMultiplexer {
    runtime: Handle,
    callbacks: CallbackTable,
}

impl HyperMultiplexer {
    pub fn new(runtime: Handle, callbacks: CallbackTable) -> Self {
        Self { runtime, callbacks }
    }

    /// Bind to the runtime of the calling task.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current(callbacks: CallbackTable) -> Self {
        Self::new(Handle::current(), callbacks)
    }
}

impl Multiplexer for HyperMultiplexer {
    fn add_transfer(&mut self, transfer: PreparedTransfer, done: CompletionSender) {
        let callbacks = self.callbacks;
        self.runtime.spawn(async move {
            let token = transfer.token;
            let started = Instant::now();
            let mut info = TransferInfo {
                effective_url: transfer.url.clone(),
                ..Default::default()
            };

            let run = run_transfer(&transfer, callbacks, &mut info);
            let result = if transfer.timeout.is_zero() {
                run.await
            } else {
                match tokio::time::timeout(transfer.timeout, run).await {
                    Ok(result) => result,
                    Err(_) => Err(NetError::ConnectionTimedOut),
                }
            };
            info.total_time = started.elapsed();

            if done.send(Completion { token, result, info }).is_err() {
                tracing::debug!(?token, "completion receiver dropped");
            }
        });
    }
}

async fn run_transfer(
    transfer: &PreparedTransfer,
    callbacks: CallbackTable,
    info: &mut TransferInfo,
) -> Result<(), NetError> {
    let url = Url::parse(&transfer.url).map_err(|_| NetError::InvalidUrl)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(NetError::UnknownUrlScheme);
    }

    let tls = TlsSettings {
        verify_peer: transfer.verify_peer,
        verify_host: transfer.verify_host,
        ca_info: transfer.ca_info.clone(),
        offer_h2: transfer.http2,
    };
    let socket = ConnectJob::connect(&url, &tls).await?;
    let use_h2 = socket.negotiated_h2();

    let request = build_request(transfer, &url, use_h2)?;
    if transfer.verbose {
        let head = render_request_head(&request);
        (callbacks.debug)(transfer.token, DebugKind::HeaderOut, &head);
    }
    info.upload_size = transfer.body.as_ref().map_or(0, |b| b.len() as u64);

    let response = send_request(socket, use_h2, request).await?;

    let head = render_response_head(&response);
    if (callbacks.header)(transfer.token, &head) != head.len() {
        return Err(NetError::SinkWriteFailed);
    }

    let mut body = response.into_body();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| {
            tracing::debug!(url = %transfer.url, error = %e, "body stream failed");
            NetError::ConnectionClosed
        })?;
        if let Ok(data) = frame.into_data() {
            if data.is_empty() {
                continue;
            }
            if (callbacks.write)(transfer.token, &data) != data.len() {
                return Err(NetError::SinkWriteFailed);
            }
            info.download_size += data.len() as u64;
        }
    }
    Ok(())
}

fn build_request(
    transfer: &PreparedTransfer,
    url: &Url,
    use_h2: bool,
) -> Result<Request<Full<Bytes>>, NetError> {
    let method =
        Method::from_bytes(transfer.method.as_bytes()).map_err(|_| NetError::MethodNotSupported)?;

    // H2 wants the absolute form, H1 the origin form.
    let (version, uri) = if use_h2 {
        (Version::HTTP_2, url.as_str().to_string())
    } else {
        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        (Version::HTTP_11, target)
    };

    let mut headers = header_map_from_lines(&transfer.header_lines)?;
    if !use_h2 && !headers.contains_key(HOST) {
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let value = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        headers.insert(
            HOST,
            HeaderValue::from_str(&value).map_err(|_| NetError::InvalidUrl)?,
        );
    }

    let body = Full::new(transfer.body.clone().unwrap_or_default());
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .version(version)
        .body(body)
        .map_err(|_| NetError::InvalidUrl)?;
    *req.headers_mut() = headers;
    Ok(req)
}

fn header_map_from_lines(lines: &[String]) -> Result<HeaderMap, NetError> {
    let mut map = HeaderMap::with_capacity(lines.len());
    for line in lines {
        let (key, value) = line.split_once(':').ok_or(NetError::InvalidHeader)?;
        let name = HeaderName::from_bytes(key.trim().as_bytes()).map_err(|_| NetError::InvalidHeader)?;
        let value = HeaderValue::from_str(value.trim()).map_err(|_| NetError::InvalidHeader)?;
        map.append(name, value);
    }
    Ok(map)
}

async fn send_request(
    socket: TransportStream,
    use_h2: bool,
    request: Request<Full<Bytes>>,
) -> Result<Response<Incoming>, NetError> {
    let io = TokioIo::new(socket);
    if use_h2 {
        let (mut sender, conn) = http2::handshake(TokioExecutor::new(), io)
            .await
            .map_err(|_| NetError::Http2ProtocolError)?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "h2 connection closed with error");
            }
        });
        sender.send_request(request).await.map_err(|e| {
            tracing::debug!(error = %e, "h2 request failed");
            NetError::Http2ProtocolError
        })
    } else {
        let (mut sender, conn) = http1::handshake(io)
            .await
            .map_err(|_| NetError::ConnectionFailed)?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "h1 connection closed with error");
            }
        });
        sender.send_request(request).await.map_err(|e| {
            tracing::debug!(error = %e, "h1 request failed");
            if e.is_incomplete_message() {
                NetError::EmptyResponse
            } else {
                NetError::ConnectionClosed
            }
        })
    }
}

fn version_token(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
}

/// Status line plus headers, as the native layer would hand them to a header callback.
fn render_response_head<B>(response: &Response<B>) -> Vec<u8> {
    let status = response.status();
    let mut out = format!("{} {} ", version_token(response.version()), status.as_u16()).into_bytes();
    // hyper only keeps the wire phrase when it differs from the canonical one.
    match response.extensions().get::<ReasonPhrase>() {
        Some(reason) => out.extend_from_slice(reason.as_bytes()),
        None => out.extend_from_slice(status.canonical_reason().unwrap_or("").as_bytes()),
    }
    out.extend_from_slice(b"\r\n");
    append_headers(&mut out, response.headers());
    out
}

fn render_request_head<B>(request: &Request<B>) -> Vec<u8> {
    let mut out = format!(
        "{} {} {}\r\n",
        request.method(),
        request.uri(),
        version_token(request.version())
    )
    .into_bytes();
    append_headers(&mut out, request.headers());
    out
}

fn append_headers(out: &mut Vec<u8>, headers: &HeaderMap) {
    for (name, value) in headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}
