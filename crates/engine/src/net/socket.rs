use std::io;
use std::net::TcpStream;

use thiserror::Error;
use tracing::{debug, info, warn};
use tungstenite::http::Uri;
use tungstenite::{Message, WebSocket};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid socket url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to reach {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("websocket handshake with {url} failed: {reason}")]
    Handshake { url: String, reason: String },
    #[error("failed to configure socket: {0}")]
    Configure(#[source] io::Error),
    #[error("websocket send failed: {0}")]
    Send(#[source] tungstenite::Error),
    #[error("socket is not open")]
    NotOpen,
    #[error("connection failed: {0}")]
    Link(String),
}

/// Mirrors the browser socket ready states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Binary(Vec<u8>),
    Closed,
    Error(String),
}

/// A message-oriented duplex link polled from the client loop.
pub trait Socket {
    fn ready_state(&self) -> ReadyState;
    fn send_binary(&mut self, payload: Vec<u8>) -> Result<(), TransportError>;
    /// Next pending event, or `None` when nothing is ready yet.
    fn poll_event(&mut self) -> Option<SocketEvent>;
    fn close(&mut self);
}

pub trait Connector {
    fn open(&mut self, url: &str) -> Result<Box<dyn Socket>, TransportError>;
}

/// Opens plain `ws://` links over a blocking handshake, then switches the
/// stream to non-blocking for polling.
#[derive(Debug, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&mut self, url: &str) -> Result<Box<dyn Socket>, TransportError> {
        let (host, port) = parse_ws_url(url)?;
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect((host.as_str(), port)).map_err(|source| {
            TransportError::Connect {
                addr: addr.clone(),
                source,
            }
        })?;
        if let Err(error) = stream.set_nodelay(true) {
            debug!(error = %error, "socket_nodelay_unavailable");
        }

        let (socket, _response) =
            tungstenite::client(url, stream).map_err(|error| TransportError::Handshake {
                url: url.to_owned(),
                reason: error.to_string(),
            })?;
        socket
            .get_ref()
            .set_nonblocking(true)
            .map_err(TransportError::Configure)?;

        info!(addr = %addr, "socket_handshake_complete");
        Ok(Box::new(WsSocket {
            socket,
            state: ReadyState::Open,
            open_reported: false,
        }))
    }
}

fn parse_ws_url(url: &str) -> Result<(String, u16), TransportError> {
    let invalid = |reason: &str| TransportError::InvalidUrl {
        url: url.to_owned(),
        reason: reason.to_owned(),
    };
    let uri: Uri = url.parse().map_err(|_| invalid("not a valid uri"))?;
    match uri.scheme_str() {
        Some("ws") => {}
        Some("wss") => return Err(invalid("secure websockets are not supported")),
        _ => return Err(invalid("expected a ws:// url")),
    }
    let host = uri.host().ok_or_else(|| invalid("missing host"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']').to_owned();
    Ok((host, uri.port_u16().unwrap_or(80)))
}

struct WsSocket {
    socket: WebSocket<TcpStream>,
    state: ReadyState,
    open_reported: bool,
}

impl WsSocket {
    fn fail(&mut self, error: tungstenite::Error) -> SocketEvent {
        self.state = ReadyState::Closed;
        match error {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                SocketEvent::Closed
            }
            other => SocketEvent::Error(other.to_string()),
        }
    }
}

fn is_would_block(error: &tungstenite::Error) -> bool {
    matches!(error, tungstenite::Error::Io(io) if io.kind() == io::ErrorKind::WouldBlock)
}

impl Socket for WsSocket {
    fn ready_state(&self) -> ReadyState {
        self.state
    }

    fn send_binary(&mut self, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.state != ReadyState::Open {
            return Err(TransportError::NotOpen);
        }
        match self.socket.send(Message::Binary(payload)) {
            Ok(()) => Ok(()),
            // Queued in the write buffer; flushed on the next poll.
            Err(error) if is_would_block(&error) => Ok(()),
            Err(error) => {
                warn!(error = %error, "socket_send_failed");
                Err(TransportError::Send(error))
            }
        }
    }

    fn poll_event(&mut self) -> Option<SocketEvent> {
        if !self.open_reported {
            self.open_reported = true;
            return Some(SocketEvent::Opened);
        }
        if self.state == ReadyState::Closed {
            return None;
        }

        match self.socket.flush() {
            Ok(()) => {}
            Err(error) if is_would_block(&error) => {}
            Err(error) => return Some(self.fail(error)),
        }

        loop {
            match self.socket.read() {
                Ok(Message::Binary(payload)) => return Some(SocketEvent::Binary(payload)),
                Ok(Message::Text(text)) => {
                    debug!(len = text.len(), "socket_text_message_ignored");
                }
                Ok(Message::Close(_)) => {
                    self.state = ReadyState::Closing;
                }
                Ok(_) => {}
                Err(error) if is_would_block(&error) => return None,
                Err(error) => return Some(self.fail(error)),
            }
        }
    }

    fn close(&mut self) {
        if matches!(self.state, ReadyState::Closed) {
            return;
        }
        self.state = ReadyState::Closing;
        if let Err(error) = self.socket.close(None) {
            if !is_would_block(&error) {
                debug!(error = %error, "socket_close_failed");
                self.state = ReadyState::Closed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_resolves_host_and_default_port() {
        assert_eq!(
            parse_ws_url("ws://play.example.net/socket").expect("url"),
            ("play.example.net".to_owned(), 80)
        );
        assert_eq!(
            parse_ws_url("ws://127.0.0.1:8765").expect("url"),
            ("127.0.0.1".to_owned(), 8765)
        );
    }

    #[test]
    fn secure_and_foreign_schemes_are_rejected() {
        assert!(matches!(
            parse_ws_url("wss://play.example.net"),
            Err(TransportError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_ws_url("http://play.example.net"),
            Err(TransportError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn unreachable_host_reports_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let result = WsConnector.open(&format!("ws://127.0.0.1:{port}/"));
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
