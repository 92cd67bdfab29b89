mod action;
mod client;
mod frame;
mod metrics;
mod socket;
mod wire;


pub use action::{Action, ItemId, PlayerProfile};
pub use client::{
    ConnectionListener, ConnectionState, Event, EventHandler, EventKind, ReplyHandler, RpcClient,
    RpcOptions, DEFAULT_HEARTBEAT_INTERVAL,
};
pub use frame::{Cell, FrameBoundsError, Notice, PlayerStats, RoomId, ViewportFrame};
pub use metrics::NetStatsSnapshot;
pub use socket::{Connector, ReadyState, Socket, SocketEvent, TransportError, WsConnector};
pub use wire::{encode_message, InboundMessage, Reply, RequestId, WireError};
