use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::protocol::Frame;

const REALTIME_PATH: &str = "/realtime";
const POLL_PATH: &str = "/realtime/poll";
/// Pause before polling again after the server answered with no frames.
const POLL_IDLE_DELAY: Duration = Duration::from_millis(250);

/// Realtime transport mechanisms, in the order a session may try them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[serde(alias = "ws")]
    WebSocket,
    Polling,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::WebSocket => f.write_str("websocket"),
            TransportKind::Polling => f.write_str("polling"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportFailure {
    #[error("invalid server url `{0}`")]
    InvalidUrl(String),
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("frame encoding: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("connection closed")]
    Closed,
}

/// An open realtime link. Implementations must keep `recv` cancel-safe.
#[async_trait]
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    async fn send(&mut self, frame: &Frame) -> Result<(), TransportFailure>;

    /// Next inbound frame; `Ok(None)` once the peer closed the link.
    async fn recv(&mut self) -> Result<Option<Frame>, TransportFailure>;

    async fn close(&mut self);
}

/// Opens transports of a given kind against a server.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        kind: TransportKind,
        server_url: &str,
    ) -> Result<Box<dyn Transport>, TransportFailure>;
}

/// Connector backed by real sockets and HTTP.
#[derive(Debug, Clone, Default)]
pub struct NetworkConnector {
    http: reqwest::Client,
}

impl NetworkConnector {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Connector for NetworkConnector {
    async fn open(
        &self,
        kind: TransportKind,
        server_url: &str,
    ) -> Result<Box<dyn Transport>, TransportFailure> {
        match kind {
            TransportKind::WebSocket => Ok(Box::new(WebSocketTransport::open(server_url).await?)),
            TransportKind::Polling => Ok(Box::new(
                PollingTransport::open(self.http.clone(), server_url).await?,
            )),
        }
    }
}

/// Builds the endpoint for a transport from the HTTP base url of the server.
pub fn realtime_url(server_url: &str, kind: TransportKind) -> Result<Url, TransportFailure> {
    let invalid = || TransportFailure::InvalidUrl(server_url.to_string());
    let mut url = Url::parse(server_url).map_err(|_| invalid())?;

    let scheme = match (kind, url.scheme()) {
        (TransportKind::WebSocket, "http" | "ws") => "ws",
        (TransportKind::WebSocket, "https" | "wss") => "wss",
        (TransportKind::Polling, "http" | "ws") => "http",
        (TransportKind::Polling, "https" | "wss") => "https",
        _ => return Err(invalid()),
    };
    url.set_scheme(scheme).map_err(|_| invalid())?;

    let base = url.path().trim_end_matches('/').to_string();
    let suffix = match kind {
        TransportKind::WebSocket => REALTIME_PATH,
        TransportKind::Polling => POLL_PATH,
    };
    url.set_path(&format!("{base}{suffix}"));
    Ok(url)
}

fn decode_frame(raw: &str) -> Option<Frame> {
    match serde_json::from_str::<Frame>(raw) {
        Ok(frame) => Some(frame),
        Err(err) => {
            log::warn!("Ignoring malformed frame: {err}");
            None
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Persistent bidirectional stream; one JSON text message per frame.
pub struct WebSocketTransport {
    stream: WsStream,
}

impl WebSocketTransport {
    pub async fn open(server_url: &str) -> Result<Self, TransportFailure> {
        let url = realtime_url(server_url, TransportKind::WebSocket)?;
        log::debug!("Opening websocket {url}");
        let (stream, _) = connect_async(url.as_str()).await?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn send(&mut self, frame: &Frame) -> Result<(), TransportFailure> {
        let text = serde_json::to_string(frame)?;
        self.stream.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Frame>, TransportFailure> {
        while let Some(message) = self.stream.next().await {
            match message? {
                WsMessage::Text(text) => {
                    if let Some(frame) = decode_frame(&text) {
                        return Ok(Some(frame));
                    }
                }
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            log::debug!("Websocket close failed: {err}");
        }
    }
}

#[derive(Debug, Deserialize)]
struct PollHandshake {
    sid: String,
}

/// Repeated short-lived HTTP requests.
///
/// A background task long-polls the server and hands frames over a channel
/// so that `recv` stays cancel-safe.
pub struct PollingTransport {
    http: reqwest::Client,
    endpoint: Url,
    sid: String,
    frames: mpsc::Receiver<Result<Frame, TransportFailure>>,
    poller: JoinHandle<()>,
}

impl PollingTransport {
    pub async fn open(http: reqwest::Client, server_url: &str) -> Result<Self, TransportFailure> {
        let endpoint = realtime_url(server_url, TransportKind::Polling)?;
        let handshake: PollHandshake = http
            .post(endpoint.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        log::debug!("Polling session {} opened at {endpoint}", handshake.sid);

        let (tx, frames) = mpsc::channel(100);
        let poller = tokio::spawn(poll_loop(
            http.clone(),
            endpoint.clone(),
            handshake.sid.clone(),
            tx,
        ));

        Ok(Self {
            http,
            endpoint,
            sid: handshake.sid,
            frames,
            poller,
        })
    }
}

async fn poll_loop(
    http: reqwest::Client,
    endpoint: Url,
    sid: String,
    tx: mpsc::Sender<Result<Frame, TransportFailure>>,
) {
    loop {
        let response = match http
            .get(endpoint.clone())
            .query(&[("sid", sid.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let _ = tx.send(Err(err.into())).await;
                return;
            }
        };

        if matches!(
            response.status(),
            reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::GONE
        ) {
            log::info!("Polling session {sid} closed by server");
            return;
        }

        let batch = match response.error_for_status() {
            Ok(response) => response.json::<Vec<Value>>().await,
            Err(err) => Err(err),
        };
        let batch = match batch {
            Ok(batch) => batch,
            Err(err) => {
                let _ = tx.send(Err(err.into())).await;
                return;
            }
        };

        if batch.is_empty() {
            tokio::time::sleep(POLL_IDLE_DELAY).await;
            continue;
        }

        for raw in batch {
            let frame = match serde_json::from_value::<Frame>(raw) {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("Ignoring malformed frame: {err}");
                    continue;
                }
            };
            if tx.send(Ok(frame)).await.is_err() {
                return;
            }
        }
    }
}

#[async_trait]
impl Transport for PollingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    async fn send(&mut self, frame: &Frame) -> Result<(), TransportFailure> {
        self.http
            .post(self.endpoint.clone())
            .query(&[("sid", self.sid.as_str())])
            .json(frame)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Frame>, TransportFailure> {
        match self.frames.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.poller.abort();
        let result = self
            .http
            .delete(self.endpoint.clone())
            .query(&[("sid", self.sid.as_str())])
            .send()
            .await;
        if let Err(err) = result {
            log::debug!("Polling close failed: {err}");
        }
    }
}

impl Drop for PollingTransport {
    fn drop(&mut self) {
        self.poller.abort();
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Json, Response};
    use axum::routing::post;
    use serde_json::json;

    use super::*;

    /// Scripted polling endpoint: one batch, one empty answer, then 410.
    #[derive(Default)]
    struct PollServer {
        received: Vec<Value>,
        polls: usize,
        closed: bool,
    }

    type Shared = Arc<Mutex<PollServer>>;

    async fn poll_post(
        State(server): State<Shared>,
        Query(query): Query<HashMap<String, String>>,
        body: String,
    ) -> Json<Value> {
        if query.get("sid").map(String::as_str) == Some("s1") {
            let frame = serde_json::from_str(&body).unwrap();
            server.lock().unwrap().received.push(frame);
            Json(json!({ "ok": true }))
        } else {
            Json(json!({ "sid": "s1" }))
        }
    }

    async fn poll_get(State(server): State<Shared>) -> Response {
        let mut server = server.lock().unwrap();
        server.polls += 1;
        match server.polls {
            1 => Json(json!([
                { "event": "new_message", "data": { "id": 1 } },
                { "bogus": true },
                { "event": "user_typing", "data": { "user_id": 2, "is_typing": true } }
            ]))
            .into_response(),
            2 => Json(json!([])).into_response(),
            _ => StatusCode::GONE.into_response(),
        }
    }

    async fn poll_delete(State(server): State<Shared>) -> StatusCode {
        server.lock().unwrap().closed = true;
        StatusCode::NO_CONTENT
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn poll_server() -> (String, Shared) {
        let shared = Shared::default();
        let router = Router::new()
            .route(
                POLL_PATH,
                post(poll_post).get(poll_get).delete(poll_delete),
            )
            .with_state(Arc::clone(&shared));
        (serve(router).await, shared)
    }

    #[tokio::test]
    async fn polling_delivers_batches_until_server_closes() {
        let (url, shared) = poll_server().await;
        let mut transport = PollingTransport::open(reqwest::Client::new(), &url)
            .await
            .unwrap();

        transport
            .send(&Frame::new("join_chat", json!({ "chat_id": 1, "user_id": 2 })))
            .await
            .unwrap();

        let first = transport.recv().await.unwrap().unwrap();
        assert_eq!(first.event, "new_message");
        let second = transport.recv().await.unwrap().unwrap();
        assert_eq!(second.event, "user_typing");
        assert!(transport.recv().await.unwrap().is_none());

        let server = shared.lock().unwrap();
        assert_eq!(server.polls, 3);
        assert_eq!(
            server.received,
            vec![json!({ "event": "join_chat", "data": { "chat_id": 1, "user_id": 2 } })]
        );
    }

    #[tokio::test]
    async fn polling_close_ends_the_server_session() {
        let (url, shared) = poll_server().await;
        let mut transport = PollingTransport::open(reqwest::Client::new(), &url)
            .await
            .unwrap();

        transport.close().await;
        assert!(shared.lock().unwrap().closed);
    }

    #[tokio::test]
    async fn polling_handshake_failure_is_reported() {
        let url = serve(Router::new()).await;

        let opened = PollingTransport::open(reqwest::Client::new(), &url).await;
        assert!(matches!(opened, Err(TransportFailure::Http(_))));
    }

    #[test]
    fn websocket_url_follows_http_scheme() {
        let url = realtime_url("https://chat.example.org/app/", TransportKind::WebSocket).unwrap();
        assert_eq!(url.as_str(), "wss://chat.example.org/app/realtime");

        let url = realtime_url("http://localhost:5000", TransportKind::WebSocket).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:5000/realtime");
    }

    #[test]
    fn polling_url_stays_on_http() {
        let url = realtime_url("http://localhost:5000", TransportKind::Polling).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/realtime/poll");
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        assert!(matches!(
            realtime_url("ftp://localhost", TransportKind::WebSocket),
            Err(TransportFailure::InvalidUrl(_))
        ));
        assert!(realtime_url("not a url", TransportKind::Polling).is_err());
    }

    #[test]
    fn transport_kind_reads_config_names() {
        let kinds: Vec<TransportKind> = serde_json::from_str(r#"["websocket", "ws", "polling"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![TransportKind::WebSocket, TransportKind::WebSocket, TransportKind::Polling]
        );
    }
}
