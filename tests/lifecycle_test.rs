use easynet::base::loadstate::LoadState;
use easynet::base::neterror::NetError;
use easynet::socket::{Completion, CompletionSender, Multiplexer, PreparedTransfer, TransferInfo};
use easynet::urlrequest::dispatch::{DebugKind, CALLBACKS};
use easynet::urlrequest::{HandleRegistry, LifecycleController, RequestDescriptor, RequestHandle, Token};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the scripted transport does with one attempt.
enum Reply {
    Respond {
        head: String,
        body: Vec<&'static str>,
    },
    Fail(NetError),
}

fn respond(head: &str, body: &[&'static str]) -> Reply {
    Reply::Respond {
        head: head.to_string(),
        body: body.to_vec(),
    }
}

type Script = Box<dyn FnMut(&PreparedTransfer) -> Reply + Send>;

/// Delivers canned replies synchronously through the static callbacks.
struct ScriptedMultiplexer {
    script: Script,
    seen: Arc<Mutex<Vec<PreparedTransfer>>>,
    running_during_attempt: Arc<Mutex<Vec<bool>>>,
}

impl ScriptedMultiplexer {
    fn new(script: impl FnMut(&PreparedTransfer) -> Reply + Send + 'static) -> Self {
        Self {
            script: Box::new(script),
            seen: Arc::new(Mutex::new(Vec::new())),
            running_during_attempt: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Multiplexer for ScriptedMultiplexer {
    fn add_transfer(&mut self, transfer: PreparedTransfer, done: CompletionSender) {
        let token = transfer.token;
        if let Some(handle) = HandleRegistry::global().resolve(token) {
            let running = handle.lock().is_running();
            self.running_during_attempt.lock().unwrap().push(running);
        }

        if transfer.verbose {
            let block = format!(
                "{} / HTTP/1.1\r\nhost: scripted\r\n{}\r\n\r\n",
                transfer.method,
                transfer.header_lines.join("\r\n")
            );
            (CALLBACKS.debug)(token, DebugKind::HeaderOut, block.as_bytes());
        }

        let mut info = TransferInfo {
            effective_url: transfer.url.clone(),
            upload_size: transfer.body.as_ref().map_or(0, |b| b.len() as u64),
            ..Default::default()
        };
        let result = match (self.script)(&transfer) {
            Reply::Respond { head, body } => {
                assert_eq!((CALLBACKS.header)(token, head.as_bytes()), head.len());
                for chunk in body {
                    assert_eq!((CALLBACKS.write)(token, chunk.as_bytes()), chunk.len());
                    info.download_size += chunk.len() as u64;
                }
                Ok(())
            }
            Reply::Fail(error) => Err(error),
        };
        self.seen.lock().unwrap().push(transfer);
        done.send(Completion { token, result, info }).unwrap();
    }
}

fn controller(mux: ScriptedMultiplexer) -> LifecycleController<ScriptedMultiplexer> {
    LifecycleController::with_ca_info(mux, PathBuf::from("/tmp/easynet-test-cacert"))
}

fn counting_callback(fired: &Arc<AtomicUsize>) -> impl FnOnce(&RequestHandle) + Send + 'static {
    let fired = Arc::clone(fired);
    move |_| {
        fired.fetch_add(1, Ordering::SeqCst);
    }
}

fn urls(mux: &ScriptedMultiplexer) -> Vec<String> {
    mux.seen.lock().unwrap().iter().map(|t| t.url.clone()).collect()
}

fn tokens(mux: &ScriptedMultiplexer) -> Vec<Token> {
    mux.seen.lock().unwrap().iter().map(|t| t.token).collect()
}

#[tokio::test]
async fn test_success_fires_callback_once() {
    let mut ctrl = controller(ScriptedMultiplexer::new(|_| {
        respond(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n",
            &["ab", "cd", "ef"],
        )
    }));
    let mut req = RequestDescriptor::new("http://scripted.test/ok");
    req.set_max_retry_count(3);
    let handle = req.into_handle();
    let fired = Arc::new(AtomicUsize::new(0));

    assert!(ctrl.submit(&handle, counting_callback(&fired)));
    ctrl.perform().await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    let req = handle.lock();
    assert_eq!(req.status(), 200);
    assert_eq!(req.message(), Some("OK"));
    assert_eq!(req.http_version(), Some("HTTP/1.1"));
    assert_eq!(req.in_data().map(|b| &b[..]), Some(&b"abcdef"[..]));
    assert_eq!(req.response_header("Content-Type"), Some("text/plain"));
    assert_eq!(req.load_state(), LoadState::Completed);
    assert_eq!(req.attempts(), 1);
    assert!(!req.is_running());
    // Success never draws from the budget.
    assert_eq!(req.retry_budget(), 3);
    assert_eq!(req.transfer_info().unwrap().download_size, 6);
}

#[tokio::test]
async fn test_transport_failure_exhausts_budget() {
    let mux = ScriptedMultiplexer::new(|_| Reply::Fail(NetError::ConnectionRefused));
    let running = Arc::clone(&mux.running_during_attempt);
    let mut ctrl = controller(mux);

    let mut req = RequestDescriptor::new("http://scripted.test/down");
    req.set_max_retry_count(3);
    let handle = req.into_handle();

    let observed = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&observed);
    ctrl.submit(&handle, move |handle| {
        let req = handle.lock();
        *sink.lock().unwrap() = Some((req.is_running(), req.attempts()));
    });
    ctrl.perform().await;

    assert_eq!(ctrl.multiplexer().seen.lock().unwrap().len(), 4);
    assert_eq!(*running.lock().unwrap(), vec![true; 4]);
    assert_eq!(*observed.lock().unwrap(), Some((false, 4)));

    let req = handle.lock();
    assert_eq!(req.load_state(), LoadState::Failed);
    assert_eq!(req.last_error(), Some(NetError::ConnectionRefused));
    assert_eq!(req.status(), 0);
    assert_eq!(req.retry_budget(), -1);
}

#[tokio::test]
async fn test_absolute_redirect_rewrites_url() {
    let mut ctrl = controller(ScriptedMultiplexer::new(|t| {
        if t.url.ends_with("/start") {
            respond(
                "HTTP/1.1 301 Moved Permanently\r\nLocation: https://example.com/next\r\n\r\n",
                &[],
            )
        } else {
            respond("HTTP/1.1 200 OK\r\n\r\n", &["done"])
        }
    }));
    let handle = RequestDescriptor::new("http://scripted.test/start").into_handle();
    let fired = Arc::new(AtomicUsize::new(0));

    ctrl.submit(&handle, counting_callback(&fired));
    ctrl.perform().await;

    assert_eq!(
        urls(ctrl.multiplexer()),
        vec!["http://scripted.test/start", "https://example.com/next"]
    );
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    let req = handle.lock();
    assert_eq!(req.url(), "https://example.com/next");
    assert_eq!(req.retry_budget(), 4);
    assert_eq!(req.status(), 200);
}

#[tokio::test]
async fn test_relative_redirect_resolves_against_current_url() {
    let mut ctrl = controller(ScriptedMultiplexer::new(|t| {
        if t.url.ends_with("/a/start") {
            respond("HTTP/1.1 302 Found\r\nlocation: ../next?x=1\r\n\r\n", &[])
        } else {
            respond("HTTP/1.1 200 OK\r\n\r\n", &[])
        }
    }));
    let handle = RequestDescriptor::new("http://scripted.test/a/start").into_handle();
    ctrl.submit(&handle, |_| {});
    ctrl.perform().await;

    assert_eq!(handle.lock().url(), "http://scripted.test/next?x=1");
}

#[tokio::test]
async fn test_redirect_without_location_retries_same_url() {
    let mut ctrl = controller(ScriptedMultiplexer::new(|_| {
        respond("HTTP/1.1 302 Found\r\nContent-Length: 0\r\n\r\n", &[])
    }));
    let mut req = RequestDescriptor::new("http://scripted.test/nowhere");
    req.set_max_retry_count(1);
    let handle = req.into_handle();
    ctrl.submit(&handle, |_| {});
    ctrl.perform().await;

    assert_eq!(
        urls(ctrl.multiplexer()),
        vec!["http://scripted.test/nowhere"; 2]
    );
    let req = handle.lock();
    assert_eq!(req.status(), 302);
    assert_eq!(req.load_state(), LoadState::Failed);
}

#[tokio::test]
async fn test_redirects_and_failures_share_budget() {
    let hops = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hops);
    let mut ctrl = controller(ScriptedMultiplexer::new(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        if n < 5 {
            respond(
                &format!("HTTP/1.1 302 Found\r\nLocation: /hop{}\r\n\r\n", n + 1),
                &[],
            )
        } else {
            Reply::Fail(NetError::ConnectionReset)
        }
    }));
    let mut req = RequestDescriptor::new("http://scripted.test/hop0");
    req.set_max_retry_count(5);
    let handle = req.into_handle();
    ctrl.submit(&handle, |_| {});
    ctrl.perform().await;

    // Five hops and one failure use up a budget of five.
    assert_eq!(hops.load(Ordering::SeqCst), 6);
    let req = handle.lock();
    assert_eq!(req.url(), "http://scripted.test/hop5");
    assert_eq!(req.load_state(), LoadState::Failed);
}

#[tokio::test]
async fn test_malformed_status_line_is_retried() {
    let mut ctrl = controller(ScriptedMultiplexer::new(|_| {
        respond("GARBAGE\r\nX-Seen: yes\r\n\r\n", &["body"])
    }));
    let mut req = RequestDescriptor::new("http://scripted.test/garbage");
    req.set_max_retry_count(2);
    let handle = req.into_handle();
    ctrl.submit(&handle, |_| {});
    ctrl.perform().await;

    assert_eq!(ctrl.multiplexer().seen.lock().unwrap().len(), 3);
    let req = handle.lock();
    assert_eq!(req.status(), 0);
    assert_eq!(req.response_header("X-Seen"), Some("yes"));
    assert_eq!(req.in_data().map(|b| &b[..]), Some(&b"body"[..]));
}

#[tokio::test]
async fn test_final_attempt_data_is_surfaced() {
    let attempt = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempt);
    let mut ctrl = controller(ScriptedMultiplexer::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            respond("HTTP/1.1 503 Service Unavailable\r\nRetry-After: 1\r\n\r\n", &["busy"])
        } else {
            respond("HTTP/1.1 200 OK\r\n\r\n", &["fine"])
        }
    }));
    let handle = RequestDescriptor::new("http://scripted.test/flaky").into_handle();
    ctrl.submit(&handle, |_| {});
    ctrl.perform().await;

    let req = handle.lock();
    assert_eq!(req.status(), 200);
    assert_eq!(req.in_data().map(|b| &b[..]), Some(&b"fine"[..]));
    assert!(req.response_header("Retry-After").is_none());
    assert_eq!(req.retry_budget(), 4);
    assert_eq!(req.attempts(), 2);
}

#[tokio::test]
async fn test_non_200_success_class_is_not_success() {
    let mut ctrl = controller(ScriptedMultiplexer::new(|_| {
        respond("HTTP/1.1 204 No Content\r\n\r\n", &[])
    }));
    let mut req = RequestDescriptor::new("http://scripted.test/empty");
    req.set_max_retry_count(0);
    let handle = req.into_handle();
    ctrl.submit(&handle, |_| {});
    ctrl.perform().await;

    let req = handle.lock();
    assert_eq!(req.status(), 204);
    assert_eq!(req.message(), Some("No Content"));
    assert_eq!(req.load_state(), LoadState::Failed);
}

#[tokio::test]
async fn test_file_output_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("downloads").join("out.bin");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"stale content that must be truncated").unwrap();

    let mut ctrl = controller(ScriptedMultiplexer::new(|_| {
        respond("HTTP/1.1 200 OK\r\n\r\n", &["ab", "cd", "ef"])
    }));
    let mut req = RequestDescriptor::new("http://scripted.test/file");
    req.set_output_path(Some(path.clone()));
    let handle = req.into_handle();
    ctrl.submit(&handle, |_| {});
    ctrl.perform().await;

    assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
    let req = handle.lock();
    assert_eq!(req.status(), 200);
    assert!(req.in_data().is_none());
}

#[tokio::test]
async fn test_tokens_released_after_each_attempt() {
    let mut ctrl = controller(ScriptedMultiplexer::new(|_| {
        respond("HTTP/1.1 500 Internal Server Error\r\n\r\n", &[])
    }));
    let mut req = RequestDescriptor::new("http://scripted.test/err");
    req.set_max_retry_count(2);
    let handle = req.into_handle();
    ctrl.submit(&handle, |_| {});
    ctrl.perform().await;

    let seen = tokens(ctrl.multiplexer());
    assert_eq!(seen.len(), 3);
    let mut unique = seen.clone();
    unique.dedup();
    assert_eq!(unique.len(), 3);
    for token in seen {
        assert!(!HandleRegistry::global().contains(token));
    }
    assert_eq!(ctrl.in_flight(), 0);
}

#[tokio::test]
async fn test_submit_while_running_is_rejected() {
    struct Parked(Vec<PreparedTransfer>);
    impl Multiplexer for Parked {
        fn add_transfer(&mut self, transfer: PreparedTransfer, _done: CompletionSender) {
            self.0.push(transfer);
        }
    }

    let mut ctrl = LifecycleController::with_ca_info(Parked(Vec::new()), PathBuf::from("cacert"));
    let handle = RequestDescriptor::new("http://scripted.test/slow").into_handle();
    let fired = Arc::new(AtomicUsize::new(0));

    assert!(ctrl.submit(&handle, counting_callback(&fired)));
    assert!(!ctrl.submit(&handle, counting_callback(&fired)));
    assert_eq!(ctrl.multiplexer().0.len(), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert!(handle.lock().is_running());

    // Complete it by hand; the default budget schedules another attempt.
    let token = ctrl.multiplexer().0[0].token;
    ctrl.on_completion(Completion::failed(token, NetError::ConnectionClosed, "http://scripted.test/slow"));
    assert_eq!(ctrl.multiplexer().0.len(), 2);
}

#[tokio::test]
async fn test_resubmit_after_completion() {
    let mut ctrl = controller(ScriptedMultiplexer::new(|_| {
        respond("HTTP/1.1 200 OK\r\n\r\n", &["x"])
    }));
    let handle = RequestDescriptor::new("http://scripted.test/again").into_handle();
    let fired = Arc::new(AtomicUsize::new(0));

    ctrl.submit(&handle, counting_callback(&fired));
    ctrl.perform().await;
    assert!(ctrl.submit(&handle, counting_callback(&fired)));
    ctrl.perform().await;

    assert_eq!(fired.load(Ordering::SeqCst), 2);
    assert_eq!(handle.lock().attempts(), 1);
}

#[tokio::test]
async fn test_debug_mode_captures_sent_headers() {
    let mut ctrl = controller(ScriptedMultiplexer::new(|_| {
        respond("HTTP/1.1 200 OK\r\n\r\n", &[])
    }));
    let mut req = RequestDescriptor::new("http://scripted.test/debug");
    req.set_debug(true);
    req.set_method("POST");
    req.set_content_type("application/json");
    req.set_header("X-Request-Id", "42");
    req.set_out_data("{}");
    let handle = req.into_handle();
    ctrl.submit(&handle, |_| {});
    ctrl.perform().await;

    assert!(ctrl.multiplexer().seen.lock().unwrap()[0].verbose);
    let req = handle.lock();
    let sent = req.sent_headers().unwrap();
    assert_eq!(sent.get("Content-Type"), Some("application/json"));
    assert_eq!(sent.get("X-Request-Id"), Some("42"));
    assert_eq!(sent.get("host"), Some("scripted"));
    assert_eq!(req.transfer_info().unwrap().upload_size, 2);
}

#[tokio::test]
async fn test_request_survives_dropped_caller_handle() {
    struct Parked(Vec<PreparedTransfer>);
    impl Multiplexer for Parked {
        fn add_transfer(&mut self, transfer: PreparedTransfer, _done: CompletionSender) {
            self.0.push(transfer);
        }
    }

    let mut ctrl = LifecycleController::with_ca_info(Parked(Vec::new()), PathBuf::from("cacert"));
    let handle = RequestDescriptor::new("http://scripted.test/orphan").into_handle();
    let status = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&status);
    ctrl.submit(&handle, move |handle| {
        *sink.lock().unwrap() = Some(handle.lock().status());
    });
    drop(handle);

    let token = ctrl.multiplexer().0[0].token;
    let head = b"HTTP/1.1 200 OK\r\n\r\n";
    assert_eq!((CALLBACKS.header)(token, head), head.len());
    ctrl.on_completion(Completion {
        token,
        result: Ok(()),
        info: TransferInfo::default(),
    });
    assert_eq!(*status.lock().unwrap(), Some(200));
}
