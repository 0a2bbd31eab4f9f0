pub mod api;
pub mod client;
pub mod protocol;
pub mod session;
pub mod transport;

pub use api::{ChatApi, HttpChatApi};
pub use client::ChatClient;
pub use session::{EmitOutcome, EmitPolicy, SessionConfig, SessionState, TransportSession};
pub use transport::{Connector, NetworkConnector, TransportKind};
