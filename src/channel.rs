//! Websocket channel adapter.
//!
//! Owns the single connection to the interview service: one task
//! drains outbound envelopes into the socket, one task decodes inbound
//! frames and forwards them to the session event queue. Transport and
//! decode failures are reported as events, never as panics, so the
//! session state machine stays the only place that decides what a
//! failure means.

use futures_util::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use codesage_types::{ClientMessage, ServerMessage};

use crate::config::{Config, AUTHORIZATION_HEADER};
use crate::error::SessionError;
use crate::session::SessionEvent;

/// What the channel reports into the session event queue.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A well-formed envelope from the service.
    Message(ServerMessage),
    /// The peer closed the connection (close frame or clean EOF).
    Closed,
    /// The socket died underneath us.
    TransportError(String),
    /// An inbound frame that does not decode as a known envelope.
    ProtocolError(String),
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn build_request(config: &Config) -> Result<Request<()>, SessionError> {
    let mut request = config
        .server_url()
        .into_client_request()
        .map_err(|e| SessionError::Connection(format!("invalid server url: {e}")))?;
    if let Some(token) = config.auth_token() {
        let value = format!("Bearer {}", token.expose_secret())
            .parse()
            .map_err(|_| SessionError::Connection("auth token is not a valid header value".into()))?;
        request.headers_mut().insert(AUTHORIZATION_HEADER, value);
    }
    Ok(request)
}

/// Live connection to the interview service.
pub struct ChannelAdapter {
    out_tx: Option<mpsc::Sender<ClientMessage>>,
    send_handle: JoinHandle<()>,
    recv_handle: JoinHandle<()>,
}

impl ChannelAdapter {
    /// Opens the websocket within the configured timeout and starts
    /// the pump tasks. A single attempt; callers treat failure as
    /// terminal for the session.
    pub async fn connect(
        config: &Config,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        let request = build_request(config)?;
        info!("Connecting to {}", config.server_url());

        let connect = connect_async(request);
        let (ws_stream, response) = tokio::time::timeout(config.connect_timeout(), connect)
            .await
            .map_err(|_| {
                SessionError::Connection(format!(
                    "timed out after {:?} connecting to {}",
                    config.connect_timeout(),
                    config.server_url()
                ))
            })?
            .map_err(|e| SessionError::Connection(e.to_string()))?;
        debug!("Websocket established, HTTP status {}", response.status());

        let (write, read) = ws_stream.split();
        let (out_tx, out_rx) = mpsc::channel::<ClientMessage>(32);

        let send_handle = tokio::spawn(run_send(write, out_rx));
        let recv_handle = tokio::spawn(run_recv(read, events));

        Ok(Self {
            out_tx: Some(out_tx),
            send_handle,
            recv_handle,
        })
    }

    /// Handle the session uses to enqueue outbound envelopes.
    pub fn sender(&self) -> Result<mpsc::Sender<ClientMessage>, SessionError> {
        self.out_tx.clone().ok_or(SessionError::NotConnected)
    }

    /// Releases the connection. Dropping the outbound queue lets the
    /// send task flush and close the socket; the receive task is cut
    /// off so a late close frame cannot re-enter the session.
    /// Idempotent.
    pub fn close(&mut self) {
        if self.out_tx.take().is_some() {
            debug!("Closing channel");
        }
        self.recv_handle.abort();
    }
}

impl Drop for ChannelAdapter {
    fn drop(&mut self) {
        self.close();
        self.send_handle.abort();
    }
}

async fn run_send(
    mut write: futures_util::stream::SplitSink<WsStream, Message>,
    mut out_rx: mpsc::Receiver<ClientMessage>,
) {
    while let Some(envelope) = out_rx.recv().await {
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize outbound envelope: {e}");
                continue;
            }
        };
        debug!("-> {text}");
        if let Err(e) = write.send(Message::Text(text)).await {
            error!("Failed to send over websocket: {e}");
            break;
        }
    }
    let _ = write.close().await;
}

async fn run_recv(
    mut read: futures_util::stream::SplitStream<WsStream>,
    events: mpsc::Sender<SessionEvent>,
) {
    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                debug!("<- {text}");
                match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => {
                        if events
                            .send(SessionEvent::Channel(ChannelEvent::Message(message)))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Undecodable frame from service: {e}");
                        let _ = events
                            .send(SessionEvent::Channel(ChannelEvent::ProtocolError(
                                e.to_string(),
                            )))
                            .await;
                        return;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                debug!("Received close frame");
                break;
            }
            // Pings are answered by tungstenite itself; binary frames
            // are not part of this protocol.
            Ok(_) => {}
            Err(e) => {
                warn!("Websocket transport error: {e}");
                let _ = events
                    .send(SessionEvent::Channel(ChannelEvent::TransportError(
                        e.to_string(),
                    )))
                    .await;
                return;
            }
        }
    }
    let _ = events.send(SessionEvent::Channel(ChannelEvent::Closed)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn request_carries_bearer_token_when_configured() {
        let config = Config::builder()
            .with_server_url("ws://127.0.0.1:9/ws")
            .with_auth_token("sekrit")
            .build();
        let request = build_request(&config).unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION_HEADER).unwrap(),
            "Bearer sekrit"
        );
    }

    #[test]
    fn request_omits_authorization_without_a_token() {
        let config = Config::default();
        let request = build_request(&config).unwrap();
        assert!(request.headers().get(AUTHORIZATION_HEADER).is_none());
    }

    #[test]
    fn invalid_url_is_a_connection_error() {
        let config = Config::builder().with_server_url("not a url").build();
        assert!(matches!(
            build_request(&config),
            Err(SessionError::Connection(_))
        ));
        // SecretString never leaks through Debug.
        let token = SecretString::from("sekrit");
        assert!(!format!("{token:?}").contains("sekrit"));
    }

    #[tokio::test]
    async fn connect_to_unreachable_host_fails_within_the_timeout() {
        let config = Config::builder()
            .with_server_url("ws://192.0.2.1:9/ws")
            .with_connect_timeout(std::time::Duration::from_millis(50))
            .build();
        let (events, _rx) = mpsc::channel(8);
        let started = std::time::Instant::now();
        let result = ChannelAdapter::connect(&config, events).await;
        assert!(matches!(result, Err(SessionError::Connection(_))));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}
