// fleetsync-api: Async Rust client for the fleet telemetry backend (REST + push socket)

pub mod error;
pub mod models;
pub mod rest;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use rest::FleetClient;
pub use transport::TransportConfig;
pub use websocket::{
    PushConnector, PushFrame, PushSession, ReconnectPolicy, WebSocketConnector, WebSocketSession,
};
