use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::action::{Action, Handshake, Ping, PlayerProfile};
use super::frame::{Notice, PlayerStats, StatsMessage, ViewportFrame};
use super::metrics::{NetStatsSnapshot, TrafficCounters, TrafficRates};
use super::socket::{Connector, ReadyState, Socket, SocketEvent, TransportError};
use super::wire::{encode_message, InboundMessage, Reply, RequestId};
use crate::activity_log::{ActivityLog, LogLevel, DEFAULT_LOG_LIMIT};
use crate::map_store::MapStore;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

pub type ReplyHandler = Box<dyn FnOnce(&Reply)>;
pub type EventHandler = Box<dyn FnMut(&Event)>;

#[derive(Debug, Clone)]
pub struct RpcOptions {
    pub heartbeat_interval: Duration,
    pub log_limit: usize,
}

impl Default for RpcOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            log_limit: DEFAULT_LOG_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Lifecycle callbacks for whoever drives the UI around the connection.
pub trait ConnectionListener {
    fn on_connected(&mut self) {}
    fn on_disconnected(&mut self) {}
    fn on_error(&mut self, _error: &TransportError) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Frame,
    Notice,
    Stats,
    /// Raised locally whenever the activity log gains an entry.
    Log,
}

impl EventKind {
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "frame" => Some(Self::Frame),
            "notice" => Some(Self::Notice),
            "stats" => Some(Self::Stats),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Frame(Rc<ViewportFrame>),
    Notice(Notice),
    Stats(PlayerStats),
    LogUpdated { revision: u64 },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Frame(_) => EventKind::Frame,
            Self::Notice(_) => EventKind::Notice,
            Self::Stats(_) => EventKind::Stats,
            Self::LogUpdated { .. } => EventKind::Log,
        }
    }
}

enum PendingReply {
    Heartbeat {
        sent_at: Instant,
        rates: TrafficRates,
    },
    Callback(ReplyHandler),
}

/// Multiplexes correlated requests, pushed events and the heartbeat over a
/// single socket. Everything runs on the caller's thread from [`RpcClient::poll`].
pub struct RpcClient {
    socket_url: String,
    options: RpcOptions,
    connector: Box<dyn Connector>,
    socket: Option<Box<dyn Socket>>,
    state: ConnectionState,
    listener: Option<Box<dyn ConnectionListener>>,
    profile: Option<PlayerProfile>,
    last_request_id: u64,
    pending: HashMap<RequestId, PendingReply>,
    subscriptions: HashMap<EventKind, EventHandler>,
    heartbeat_due: Option<Instant>,
    traffic: TrafficCounters,
    maps: MapStore,
    log: ActivityLog,
}

impl RpcClient {
    pub fn new(
        socket_url: impl Into<String>,
        connector: Box<dyn Connector>,
        options: RpcOptions,
    ) -> Self {
        let log = ActivityLog::new(options.log_limit);
        Self {
            socket_url: socket_url.into(),
            options,
            connector,
            socket: None,
            state: ConnectionState::Disconnected,
            listener: None,
            profile: None,
            last_request_id: 0,
            pending: HashMap::new(),
            subscriptions: HashMap::new(),
            heartbeat_due: None,
            traffic: TrafficCounters::new(Instant::now()),
            maps: MapStore::new(),
            log,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn map_store(&self) -> &MapStore {
        &self.maps
    }

    pub fn activity_log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Opens a new socket. Any previous socket is closed without notifying the
    /// old listener, and its pending requests are dropped.
    pub fn connect(&mut self, profile: PlayerProfile, listener: Box<dyn ConnectionListener>) {
        if let Some(mut previous) = self.socket.take() {
            previous.close();
        }
        self.pending.clear();
        self.heartbeat_due = None;
        self.profile = Some(profile);
        self.listener = Some(listener);
        self.state = ConnectionState::Connecting;

        info!(url = %self.socket_url, "socket_connecting");
        match self.connector.open(&self.socket_url) {
            Ok(socket) => self.socket = Some(socket),
            Err(error) => {
                warn!(url = %self.socket_url, error = %error, "socket_connect_failed");
                self.teardown(ConnectionState::Error);
                if let Some(listener) = self.listener.as_mut() {
                    listener.on_error(&error);
                }
            }
        }
    }

    pub fn disconnect(&mut self) {
        let Some(mut socket) = self.socket.take() else {
            return;
        };
        socket.close();
        self.teardown(ConnectionState::Disconnected);
        info!("socket_disconnected_by_client");
        if let Some(listener) = self.listener.as_mut() {
            listener.on_disconnected();
        }
    }

    /// Registers the handler for `kind`, replacing any previous one.
    pub fn subscribe(&mut self, kind: EventKind, handler: impl FnMut(&Event) + 'static) {
        if self.subscriptions.insert(kind, Box::new(handler)).is_some() {
            debug!(kind = ?kind, "event_handler_replaced");
        }
    }

    /// Encodes and transmits `message`. With a reply handler the message is
    /// tagged with a fresh correlation id, returned here. Sending while the
    /// socket is not open is a silent no-op.
    pub fn send<M>(&mut self, message: &M, reply: Option<ReplyHandler>) -> Option<RequestId>
    where
        M: Serialize + ?Sized,
    {
        self.transmit(message, reply.map(PendingReply::Callback))
    }

    pub fn send_action(&mut self, action: &Action) {
        self.transmit(action, None);
    }

    pub fn request(
        &mut self,
        action: &Action,
        on_reply: impl FnOnce(&Reply) + 'static,
    ) -> Option<RequestId> {
        self.transmit(action, Some(PendingReply::Callback(Box::new(on_reply))))
    }

    fn transmit<M>(&mut self, message: &M, pending: Option<PendingReply>) -> Option<RequestId>
    where
        M: Serialize + ?Sized,
    {
        let Some(socket) = self
            .socket
            .as_mut()
            .filter(|socket| socket.ready_state() == ReadyState::Open)
        else {
            debug!("send_dropped_socket_not_open");
            return None;
        };

        let id = pending.as_ref().map(|_| {
            self.last_request_id += 1;
            RequestId(self.last_request_id)
        });
        let bytes = match encode_message(message, id) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(error = %error, "outbound_encode_failed");
                return None;
            }
        };
        if let Err(error) = socket.send_binary(bytes) {
            warn!(error = %error, "outbound_send_failed");
            return None;
        }

        if let (Some(id), Some(pending)) = (id, pending) {
            self.pending.insert(id, pending);
        }
        id
    }

    /// Drains socket events and fires the heartbeat when due.
    pub fn poll(&mut self, now: Instant) {
        while let Some(event) = self.socket.as_mut().and_then(|socket| socket.poll_event()) {
            match event {
                SocketEvent::Opened => self.handle_open(now),
                SocketEvent::Binary(payload) => self.handle_payload(payload, now),
                SocketEvent::Closed => {
                    info!("socket_closed");
                    self.teardown(ConnectionState::Disconnected);
                    self.push_log(LogLevel::Info, "Disconnected.");
                    if let Some(listener) = self.listener.as_mut() {
                        listener.on_disconnected();
                    }
                }
                SocketEvent::Error(reason) => {
                    warn!(reason = %reason, "socket_error");
                    self.teardown(ConnectionState::Error);
                    self.push_log(LogLevel::Info, &format!("Connection error: {reason}"));
                    if let Some(listener) = self.listener.as_mut() {
                        listener.on_error(&TransportError::Link(reason));
                    }
                }
            }
        }

        self.maybe_send_heartbeat(now);
    }

    fn handle_open(&mut self, now: Instant) {
        self.state = ConnectionState::Connected;
        self.traffic.restart(now);
        self.heartbeat_due = Some(now + self.options.heartbeat_interval);

        if let Some(profile) = self.profile.clone() {
            self.transmit(&Handshake { profile: &profile }, None);
        }
        info!(url = %self.socket_url, "socket_connected");
        self.push_log(LogLevel::Info, "Connected.");
        if let Some(listener) = self.listener.as_mut() {
            listener.on_connected();
        }
    }

    /// Socket lifetime ended: stop the heartbeat and forget per-socket tables.
    fn teardown(&mut self, state: ConnectionState) {
        self.socket = None;
        self.state = state;
        self.heartbeat_due = None;
        self.pending.clear();
        self.subscriptions.clear();
    }

    fn handle_payload(&mut self, payload: Vec<u8>, now: Instant) {
        self.traffic.record_bytes(payload.len());
        let message = match InboundMessage::decode(payload) {
            Ok(message) => message,
            Err(error) => {
                warn!(error = %error, "inbound_decode_failed");
                return;
            }
        };

        if let Some(pending) = message.id().and_then(|id| self.pending.remove(&id)) {
            self.resolve_reply(pending, &message, now);
            return;
        }

        let Some(name) = message.event() else {
            trace!(id = ?message.id(), "unroutable_message_dropped");
            return;
        };
        let Some(kind) = EventKind::from_wire(name) else {
            debug!(event = name, "unknown_event_dropped");
            return;
        };
        if !self.subscriptions.contains_key(&kind) {
            trace!(event = name, "unsubscribed_event_dropped");
            return;
        }

        let event = match self.decode_event(kind, &message) {
            Ok(event) => event,
            Err(error) => {
                warn!(event = name, error = %error, "event_decode_failed");
                return;
            }
        };
        self.dispatch(&event);
    }

    fn decode_event(
        &mut self,
        kind: EventKind,
        message: &InboundMessage,
    ) -> Result<Event, super::WireError> {
        match kind {
            EventKind::Frame => {
                let frame: ViewportFrame = message.payload_as()?;
                frame.check_bounds()?;
                self.traffic.record_frame();
                let summary = self.maps.patch(&frame);
                trace!(
                    room = %frame.room,
                    cells_written = summary.cells_written,
                    "map_patched"
                );
                Ok(Event::Frame(Rc::new(frame)))
            }
            EventKind::Notice => {
                let notice: Notice = message.payload_as()?;
                if let Some(text) = notice.notice.as_deref() {
                    self.push_log(LogLevel::Notice, text);
                }
                Ok(Event::Notice(notice))
            }
            EventKind::Stats => {
                let StatsMessage { stats } = message.payload_as()?;
                Ok(Event::Stats(stats))
            }
            EventKind::Log => Ok(Event::LogUpdated {
                revision: self.log.revision(),
            }),
        }
    }

    fn dispatch(&mut self, event: &Event) {
        if let Some(handler) = self.subscriptions.get_mut(&event.kind()) {
            handler(event);
        }
    }

    fn push_log(&mut self, level: LogLevel, text: &str) {
        info!(level = ?level, text, "activity_log_entry");
        self.log.push(level, text);
        let revision = self.log.revision();
        self.dispatch(&Event::LogUpdated { revision });
    }

    fn resolve_reply(&mut self, pending: PendingReply, reply: &Reply, now: Instant) {
        match pending {
            PendingReply::Heartbeat { sent_at, rates } => {
                let snapshot = NetStatsSnapshot {
                    frames_per_sec: rates.frames_per_sec,
                    kib_per_sec: rates.kib_per_sec,
                    latency: now.saturating_duration_since(sent_at),
                };
                info!(stats = %snapshot, "net_stats");
                self.push_log(LogLevel::Debug, &snapshot.to_string());
            }
            PendingReply::Callback(handler) => handler(reply),
        }
    }

    fn maybe_send_heartbeat(&mut self, now: Instant) {
        let Some(due) = self.heartbeat_due else {
            return;
        };
        if now < due {
            return;
        }

        let interval = self.options.heartbeat_interval;
        let next = due + interval;
        self.heartbeat_due = Some(if next > now { next } else { now + interval });

        let rates = self.traffic.take_rates(now);
        let ping = Ping { ping: unix_millis() };
        self.transmit(&ping, Some(PendingReply::Heartbeat { sent_at: now, rates }));
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
