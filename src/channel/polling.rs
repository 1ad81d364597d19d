use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;

use crate::channel::event::ServerEvent;
use crate::channel::hub::{EventFilter, EventHub, Subscription};
use crate::channel::packet::{decode_payload, EnginePacket, Handshake, SocketPacket};
use crate::channel::{Channel, Connector};
use crate::error::ChannelError;

const ENGINE_PATH: &str = "/socket.io/";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

struct Shared {
    agent: ureq::Agent,
    endpoint: String,
    sid: String,
    poll_timeout: Duration,
    hub: EventHub,
    open: AtomicBool,
}

impl Shared {
    fn url(&self) -> String {
        format!("{}?EIO=4&transport=polling&sid={}&t={}", self.endpoint, self.sid, cache_buster())
    }

    fn post(&self, body: String) -> Result<(), ChannelError> {
        log::trace!("-> {body:?}");
        self.agent
            .post(&self.url())
            .set("Content-Type", "text/plain;charset=UTF-8")
            .send_string(&body)
            .map_err(transport_error)?;
        Ok(())
    }

    fn poll(&self) -> Result<Vec<EnginePacket>, ChannelError> {
        let body = self
            .agent
            .get(&self.url())
            .timeout(self.poll_timeout)
            .call()
            .map_err(transport_error)?
            .into_string()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        log::trace!("<- {body:?}");
        decode_payload(&body)
    }

    /// Marks the channel closed and tells subscribers why. Returns false when
    /// it was already closed.
    fn shut(&self, reason: impl Into<String>) -> bool {
        if !self.open.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.hub.dispatch(ServerEvent::Disconnected { reason: reason.into() });
        true
    }
}

/// Socket.IO client over the Engine.IO HTTP long-polling transport.
///
/// A background reader thread keeps one poll request outstanding, answers
/// pings, and dispatches decoded events through the channel's `EventHub`.
pub struct SocketIoChannel {
    shared: Arc<Shared>,
}

impl SocketIoChannel {
    /// Performs the Engine.IO handshake against `base_url`, joins the default
    /// namespace and starts the reader thread.
    ///
    /// The namespace acknowledgement arrives later as `ServerEvent::Connected`.
    pub fn connect(base_url: &str) -> Result<SocketIoChannel, ChannelError> {
        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), ENGINE_PATH);
        let agent = ureq::AgentBuilder::new().timeout_connect(CONNECT_TIMEOUT).build();

        let open_url = format!("{endpoint}?EIO=4&transport=polling&t={}", cache_buster());
        let body = agent
            .get(&open_url)
            .call()
            .map_err(|e| ChannelError::Handshake(e.to_string()))?
            .into_string()
            .map_err(|e| ChannelError::Handshake(e.to_string()))?;

        let mut packets = decode_payload(&body)?.into_iter();
        let handshake = match packets.next() {
            Some(EnginePacket::Open(json)) => Handshake::parse(&json)?,
            other => {
                return Err(ChannelError::Handshake(format!("expected open packet, got {other:?}")))
            }
        };
        log::info!(
            "engine.io session {} opened (ping every {} ms)",
            handshake.sid,
            handshake.ping_interval
        );

        let shared = Arc::new(Shared {
            agent,
            endpoint,
            sid: handshake.sid.clone(),
            poll_timeout: Duration::from_millis(handshake.ping_interval + handshake.ping_timeout),
            hub: EventHub::new(),
            open: AtomicBool::new(true),
        });

        shared.post(SocketPacket::Connect(None).into_engine().encode())?;

        let reader = shared.clone();
        thread::Builder::new()
            .name(format!("socketio-{}", handshake.sid))
            .spawn(move || read_loop(reader))
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        Ok(SocketIoChannel { shared })
    }
}

impl Channel for SocketIoChannel {
    fn emit(&self, event: &str, payload: &Value) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }
        let packet = SocketPacket::event(event, payload.clone());
        self.shared.post(packet.into_engine().encode())
    }

    fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.shared.hub.subscribe(filter)
    }

    fn close(&self) {
        if !self.shared.open.swap(false, Ordering::SeqCst) {
            return;
        }
        // Best effort: the reader thread exits after its pending poll returns.
        let goodbye = [SocketPacket::Disconnect.into_engine(), EnginePacket::Close];
        for packet in goodbye {
            if let Err(e) = self.shared.post(packet.encode()) {
                log::debug!("closing engine.io session {}: {e}", self.shared.sid);
                break;
            }
        }
        log::info!("engine.io session {} closed", self.shared.sid);
    }

    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }
}

impl Drop for SocketIoChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop(shared: Arc<Shared>) {
    while shared.open.load(Ordering::SeqCst) {
        let packets = match shared.poll() {
            Ok(packets) => packets,
            Err(e) => {
                if shared.shut(e.to_string()) {
                    log::warn!("engine.io session {} lost: {e}", shared.sid);
                }
                return;
            }
        };
        for packet in packets {
            if !handle_packet(&shared, packet) {
                return;
            }
        }
    }
}

/// Returns false once the session is over.
fn handle_packet(shared: &Shared, packet: EnginePacket) -> bool {
    match packet {
        EnginePacket::Ping => {
            if let Err(e) = shared.post(EnginePacket::Pong.encode()) {
                log::warn!("failed to answer ping: {e}");
            }
        }
        EnginePacket::Message(text) => match SocketPacket::decode(&text) {
            Ok(SocketPacket::Connect(_)) => shared.hub.dispatch(ServerEvent::Connected),
            Ok(SocketPacket::Event { name, mut args, .. }) => {
                let payload = if args.is_empty() { Value::Null } else { args.swap_remove(0) };
                match ServerEvent::from_named(&name, payload) {
                    Ok(event) => shared.hub.dispatch(event),
                    Err(e) => log::warn!("dropping event: {e}"),
                }
            }
            Ok(SocketPacket::Disconnect) => {
                shared.shut("server closed the namespace");
                return false;
            }
            Ok(SocketPacket::ConnectError(data)) => {
                shared.shut(format!("connection refused: {data}"));
                return false;
            }
            Ok(SocketPacket::Ack { id, .. }) => log::debug!("ignoring ack {id}"),
            Err(e) => log::warn!("dropping packet {text:?}: {e}"),
        },
        EnginePacket::Close => {
            shared.shut("server closed the session");
            return false;
        }
        EnginePacket::Open(_) | EnginePacket::Pong | EnginePacket::Upgrade | EnginePacket::Noop => {}
    }
    true
}

fn transport_error(err: ureq::Error) -> ChannelError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            ChannelError::Transport(format!("HTTP {code}: {body}"))
        }
        ureq::Error::Transport(t) => ChannelError::Transport(t.to_string()),
    }
}

fn cache_buster() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}

/// Opens `SocketIoChannel`s against a fixed backend address.
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    pub url: String,
}

impl SocketIoConnector {
    pub fn new(url: impl Into<String>) -> Self {
        SocketIoConnector { url: url.into() }
    }
}

impl Connector for SocketIoConnector {
    fn connect(&self) -> Result<Box<dyn Channel>, ChannelError> {
        Ok(Box::new(SocketIoChannel::connect(&self.url)?))
    }
}
