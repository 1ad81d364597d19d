use std::collections::VecDeque;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::json;
use tiny_http::{Method, Response, Server};

use netforge::channel::{EventKind, SocketIoChannel};
use netforge::{Channel, ChannelError, EventFilter, ServerEvent};

const RS: char = '\u{1e}';
const WAIT: Duration = Duration::from_secs(3);

#[derive(Default)]
struct Script {
    /// Bodies handed out to successive polls; an empty queue answers noop.
    polls: Mutex<VecDeque<String>>,
    /// Bodies the client posted, in arrival order.
    posts: Mutex<Vec<String>>,
    poll_urls: Mutex<Vec<String>>,
}

/// Minimal Engine.IO v4 polling endpoint.
struct EngineMock {
    url: String,
    script: Arc<Script>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EngineMock {
    fn start() -> EngineMock {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let script = Arc::new(Script::default());
        let stop = Arc::new(AtomicBool::new(false));

        let (s, flag) = (script.clone(), stop.clone());
        let handle = thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                let Ok(Some(mut request)) = server.recv_timeout(Duration::from_millis(20)) else {
                    continue;
                };
                let url = request.url().to_owned();
                let body = if *request.method() == Method::Post {
                    let mut text = String::new();
                    request.as_reader().read_to_string(&mut text).unwrap();
                    s.posts.lock().unwrap().push(text);
                    "ok".to_owned()
                } else if !url.contains("sid=") {
                    r#"0{"sid":"abc","upgrades":[],"pingInterval":300,"pingTimeout":200,"maxPayload":100000}"#
                        .to_owned()
                } else {
                    s.poll_urls.lock().unwrap().push(url);
                    let next = s.polls.lock().unwrap().pop_front();
                    next.unwrap_or_else(|| {
                        thread::sleep(Duration::from_millis(20));
                        "6".to_owned()
                    })
                };
                let _ = request.respond(Response::from_string(body));
            }
        });

        EngineMock { url: format!("http://{addr}"), script, stop, handle: Some(handle) }
    }

    fn queue_poll(&self, body: impl Into<String>) {
        self.script.polls.lock().unwrap().push_back(body.into());
    }

    fn posts(&self) -> Vec<String> {
        self.script.posts.lock().unwrap().clone()
    }

    fn wait_for_post(&self, body: &str) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if self.posts().iter().any(|p| p == body) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

impl Drop for EngineMock {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[test]
fn handshake_joins_the_default_namespace() {
    let mock = EngineMock::start();
    let channel = SocketIoChannel::connect(&mock.url).unwrap();
    let events = channel.subscribe(EventFilter::All);
    assert_eq!(mock.posts().first().map(String::as_str), Some("40"));

    mock.queue_poll(r#"40{"sid":"ns-1"}"#);

    assert_eq!(events.next_timeout(WAIT), Some(ServerEvent::Connected));
    assert!(channel.is_open());
    let urls = mock.script.poll_urls.lock().unwrap().clone();
    assert!(urls[0].starts_with("/socket.io/?EIO=4&transport=polling&sid=abc&t="));
}

#[test]
fn events_are_decoded_and_pings_answered() {
    let mock = EngineMock::start();
    let channel = SocketIoChannel::connect(&mock.url).unwrap();
    let progress = channel.subscribe(EventFilter::Only(EventKind::Progress));

    let event = json!(["trainingProgress", {
        "epoch": 1,
        "progress": 50.0,
        "estimatedTime": "10s",
        "metrics": {"accuracy": 0.5, "precision": 0.4, "recall": 0.3}
    }]);
    mock.queue_poll(format!("2{sep}42{event}{sep}42[\"trainingComplete\"]", sep = RS));

    match progress.next_timeout(WAIT) {
        Some(ServerEvent::Progress(p)) => {
            assert_eq!(p.epoch, 1);
            assert_eq!(p.progress, 50.0);
            assert_eq!(p.estimated_time, "10s");
            assert_eq!(p.metrics.recall, 0.3);
        }
        other => panic!("expected progress, got {other:?}"),
    }
    // The completion event does not pass the progress-only filter.
    assert_eq!(progress.next_timeout(Duration::from_millis(200)), None);
    assert!(mock.wait_for_post("3"), "ping was not answered");
}

#[test]
fn emit_posts_an_event_packet() {
    let mock = EngineMock::start();
    let channel = SocketIoChannel::connect(&mock.url).unwrap();
    channel.emit("startTraining", &json!({"epochs": 3})).unwrap();
    assert!(mock.wait_for_post(r#"42["startTraining",{"epochs":3}]"#));
}

#[test]
fn close_says_goodbye_and_rejects_further_emits() {
    let mock = EngineMock::start();
    let channel = SocketIoChannel::connect(&mock.url).unwrap();
    channel.close();
    channel.close();

    assert!(!channel.is_open());
    let posts = mock.posts();
    assert_eq!(posts.iter().filter(|p| *p == "41").count(), 1);
    assert_eq!(posts.iter().filter(|p| *p == "1").count(), 1);
    assert!(matches!(channel.emit("startTraining", &json!({})), Err(ChannelError::Closed)));
}

#[test]
fn server_close_is_reported_as_disconnect() {
    let mock = EngineMock::start();
    let channel = SocketIoChannel::connect(&mock.url).unwrap();
    let events = channel.subscribe(EventFilter::Only(EventKind::Disconnected));

    mock.queue_poll("1");
    assert_eq!(
        events.next_timeout(WAIT),
        Some(ServerEvent::Disconnected { reason: "server closed the session".into() })
    );
    assert!(!channel.is_open());
}

#[test]
fn unreachable_server_fails_the_handshake() {
    match SocketIoChannel::connect("http://127.0.0.1:9") {
        Err(ChannelError::Handshake(_)) => {}
        Err(other) => panic!("expected a handshake error, got {other}"),
        Ok(_) => panic!("connected to nothing"),
    }
}
