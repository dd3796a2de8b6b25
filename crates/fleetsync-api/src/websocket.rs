//! Push socket: connection, subscription announcement, and frame parsing.
//!
//! The backend pushes partial vehicle records over a WebSocket as JSON
//! text frames shaped `{ "event": <name>, "data": <payload> }`. This is a
//! plain WebSocket endpoint (`{base}/ws` by default), not socket.io: a
//! backend that only speaks the socket.io handshake and packet framing
//! needs a bridge in front of it, or a `PushConnector` that speaks it. After each
//! successful connect the client announces interest with a single
//! `subscribe_updates` frame; from then on the socket is receive-only.
//!
//! Connection lifecycle (retry, backoff, teardown) lives one layer up in
//! `fleetsync-core`. This module only knows how to open one session and
//! read frames from it, behind the [`PushConnector`] / [`PushSession`]
//! traits so the lifecycle can be driven by scripted sessions in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetsync_api::websocket::{PushConnector, PushSession, WebSocketConnector};
//!
//! let connector = WebSocketConnector::new(Url::parse("ws://localhost:5000/ws")?);
//! let mut session = connector.connect().await?;
//! session.announce().await?;
//!
//! while let Some(frame) = session.next_frame().await {
//!     println!("{:?}", frame?);
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::models::BusPayload;

// ── Event names ──────────────────────────────────────────────────────

/// Outbound subscription intent, sent once per session.
pub const SUBSCRIBE_EVENT: &str = "subscribe_updates";
/// Inbound partial vehicle record.
pub const UPDATE_EVENT: &str = "bus_update";
/// Inbound server greeting, informational only.
pub const GREETING_EVENT: &str = "connected";

// ── ReconnectPolicy ──────────────────────────────────────────────────

/// Bounded, fixed-delay reconnection policy.
///
/// `max_attempts` counts every connect attempt within one outage,
/// including the first. Once exhausted the channel gives up for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts per outage before entering the terminal state. Default: 5.
    pub max_attempts: u32,

    /// Fixed delay between attempts. Default: 1s.
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

// ── PushFrame ────────────────────────────────────────────────────────

/// One decoded frame from the push socket.
#[derive(Debug, Clone, PartialEq)]
pub enum PushFrame {
    /// A partial vehicle record (`bus_update`).
    Update(BusPayload),
    /// Server greeting (`connected`), carrying an optional message.
    Greeting { message: Option<String> },
    /// Any other event name. Ignored by consumers.
    Other { event: String },
    /// The frame could not be decoded. The session stays usable.
    Malformed { reason: String },
}

/// Raw envelope every push frame arrives in.
#[derive(Debug, Deserialize)]
struct PushEnvelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode a push text frame.
///
/// Never fails: undecodable input becomes [`PushFrame::Malformed`] so a
/// single bad frame does not cost the whole session.
pub fn parse_frame(text: &str) -> PushFrame {
    let envelope: PushEnvelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            return PushFrame::Malformed {
                reason: format!("invalid envelope: {e}"),
            };
        }
    };

    match envelope.event.as_str() {
        UPDATE_EVENT => match serde_json::from_value::<BusPayload>(envelope.data) {
            Ok(payload) => PushFrame::Update(payload),
            Err(e) => PushFrame::Malformed {
                reason: format!("invalid {UPDATE_EVENT} payload: {e}"),
            },
        },
        GREETING_EVENT => PushFrame::Greeting {
            message: envelope.data["message"].as_str().map(String::from),
        },
        _ => PushFrame::Other {
            event: envelope.event,
        },
    }
}

/// The subscription-intent frame.
pub fn subscribe_message() -> String {
    serde_json::json!({ "event": SUBSCRIBE_EVENT }).to_string()
}

/// Derive the push socket URL from the REST base URL.
///
/// `http` becomes `ws`, `https` becomes `wss`, and `ws` is appended to
/// the base path, the same way REST paths are.
pub fn push_url_from(base: &Url) -> Result<Url, Error> {
    let mut url = crate::transport::base_url(base).join("ws")?;
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|()| Error::WebSocketConnect(format!("cannot use {scheme} for {base}")))?;
    Ok(url)
}

// ── Session traits ───────────────────────────────────────────────────

/// An open push session.
pub trait PushSession: Send + 'static {
    /// Send the subscription intent.
    fn announce(&mut self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Read the next frame. `None` means the remote closed the session.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<PushFrame, Error>>> + Send;

    /// Close the session from our side.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Something that can open push sessions.
pub trait PushConnector: Send + Sync + 'static {
    type Session: PushSession;

    /// Open one session. Retrying is the caller's business.
    fn connect(&self) -> impl Future<Output = Result<Self::Session, Error>> + Send;
}

// ── WebSocket implementation ─────────────────────────────────────────

/// [`PushConnector`] over a real WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: Url,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            connect_timeout: crate::transport::DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Override how long a single connect attempt may take.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl PushConnector for WebSocketConnector {
    type Session = WebSocketSession;

    async fn connect(&self) -> Result<WebSocketSession, Error> {
        tracing::info!(url = %self.url, "Connecting to push socket");

        let attempt = tokio_tungstenite::connect_async(self.url.as_str());
        let (stream, _response) = tokio::time::timeout(self.connect_timeout, attempt)
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: self.connect_timeout.as_secs(),
            })?
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!("Push socket connected");
        Ok(WebSocketSession { stream })
    }
}

/// A live WebSocket push session.
pub struct WebSocketSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PushSession for WebSocketSession {
    async fn announce(&mut self) -> Result<(), Error> {
        self.stream
            .send(tungstenite::Message::Text(subscribe_message().into()))
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<PushFrame, Error>> {
        loop {
            match self.stream.next().await? {
                Ok(tungstenite::Message::Text(text)) => return Some(Ok(parse_frame(&text))),
                Ok(tungstenite::Message::Ping(_)) => {
                    // tungstenite queues the pong reply itself
                    tracing::trace!("Push socket ping");
                }
                Ok(tungstenite::Message::Close(frame)) => {
                    if let Some(ref cf) = frame {
                        tracing::info!(
                            code = %cf.code,
                            reason = %cf.reason,
                            "Push socket close frame received"
                        );
                    } else {
                        tracing::info!("Push socket close frame received (no payload)");
                    }
                    return None;
                }
                Ok(_) => {
                    // Binary, Pong, Frame -- ignore
                }
                Err(e) => return Some(Err(Error::WebSocketConnect(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "Push socket close failed");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
