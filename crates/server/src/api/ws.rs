//! WebSocket transport for search sessions.
//!
//! Every connection gets its own search session. The client sends the
//! current search box contents; the server pushes the query state whenever
//! it changes and the trending list whenever it reloads.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::Utc;
use cinetrend_core::{QueryState, SearchSession, TrendingEntry};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::metrics::{
    WS_CONNECTIONS_TOTAL, WS_MESSAGES_RECEIVED, WS_MESSAGES_SENT, WS_SESSIONS_ACTIVE,
};
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Reply to a client message that could not be parsed.
pub const INVALID_MESSAGE: &str = "Invalid message";

/// WebSocket message sent to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// The session's query state changed.
    State { state: QueryState },
    /// The trending list was (re)loaded.
    Trending { entries: Vec<TrendingEntry> },
    /// A client message could not be understood.
    Error { message: String },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn kind(&self) -> &'static str {
        match self {
            WsMessage::State { .. } => "state",
            WsMessage::Trending { .. } => "trending",
            WsMessage::Error { .. } => "error",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Message received from clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// New contents of the search box.
    Input { value: String },
    /// Reload the trending list now.
    ReloadTrending,
}

impl ClientMessage {
    fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Input { .. } => "input",
            ClientMessage::ReloadTrending => "reload_trending",
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let session = state.start_session();
    let mut state_rx = session.subscribe_state();
    let mut trending_rx = session.subscribe_trending();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<WsMessage>();

    // Track connection metrics
    WS_CONNECTIONS_TOTAL.inc();
    WS_SESSIONS_ACTIVE.inc();

    info!("WebSocket client connected, search session started");

    // Spawn task to push session updates to this client
    let send_task = tokio::spawn(async move {
        let initial = [state_message(&mut state_rx), trending_message(&mut trending_rx)];
        for msg in &initial {
            if send(&mut sender, msg).await.is_err() {
                return;
            }
        }

        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
            HEARTBEAT_INTERVAL,
        );
        loop {
            let msg = tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        debug!("Query state channel closed");
                        break;
                    }
                    state_message(&mut state_rx)
                }
                changed = trending_rx.changed() => {
                    if changed.is_err() {
                        debug!("Trending channel closed");
                        break;
                    }
                    trending_message(&mut trending_rx)
                }
                Some(reply) = reply_rx.recv() => reply,
                _ = heartbeat.tick() => WsMessage::Heartbeat {
                    timestamp: Utc::now().timestamp(),
                },
            };
            if send(&mut sender, &msg).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    // Handle incoming messages from client
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Some(reply) = handle_client_text(&session, text.as_str()).await {
                    if reply_tx.send(reply).is_err() {
                        debug!("Send task gone, dropping reply");
                    }
                }
            }
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by axum
                debug!("Received ping: {:?}", data);
            }
            Ok(_) => {
                // Ignore other message types
            }
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // Clean up
    send_task.abort();
    session.shutdown().await;
    WS_SESSIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

/// Apply a text frame to the session, returning the reply owed to the
/// client, if any.
pub(crate) async fn handle_client_text(session: &SearchSession, text: &str) -> Option<WsMessage> {
    match apply_client_message(session, text).await {
        Ok(()) => None,
        Err(e) => {
            WS_MESSAGES_RECEIVED.with_label_values(&["invalid"]).inc();
            warn!("Rejecting malformed client message: {}", e);
            Some(WsMessage::Error {
                message: INVALID_MESSAGE.to_string(),
            })
        }
    }
}

/// Parse a client message and apply it to the session.
pub(crate) async fn apply_client_message(
    session: &SearchSession,
    text: &str,
) -> Result<(), serde_json::Error> {
    let msg: ClientMessage = serde_json::from_str(text)?;
    WS_MESSAGES_RECEIVED.with_label_values(&[msg.kind()]).inc();

    match msg {
        ClientMessage::Input { value } => {
            debug!("Search input: {:?}", value);
            session.input(&value);
        }
        ClientMessage::ReloadTrending => {
            session.reload_trending().await;
        }
    }
    Ok(())
}

fn state_message(rx: &mut watch::Receiver<QueryState>) -> WsMessage {
    WsMessage::State {
        state: rx.borrow_and_update().clone(),
    }
}

fn trending_message(rx: &mut watch::Receiver<Vec<TrendingEntry>>) -> WsMessage {
    WsMessage::Trending {
        entries: rx.borrow_and_update().clone(),
    }
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &WsMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize WsMessage: {}", e);
            return Ok(());
        }
    };
    WS_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinetrend_core::{
        testing::{fixtures, MockDocumentStore, MockMovieCatalog},
        CatalogQuery, SearchAnalytics, SessionConfig,
    };
    use tokio::time::sleep;
    use tokio_test::{assert_err, assert_ok};

    async fn start_session() -> (SearchSession, Arc<MockMovieCatalog>, Arc<MockDocumentStore>) {
        let catalog = Arc::new(MockMovieCatalog::new());
        catalog.set_movies(fixtures::popular_movies()).await;
        let store = Arc::new(MockDocumentStore::new());
        let session = SearchSession::start(
            catalog.clone(),
            SearchAnalytics::new(store.clone()),
            SessionConfig::default(),
        );
        (session, catalog, store)
    }

    #[test]
    fn test_client_message_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"input","value":"dune"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Input {
                value: "dune".to_string()
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"reload_trending"}"#).unwrap();
        assert_eq!(msg, ClientMessage::ReloadTrending);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"search"}"#).is_err());
    }

    #[test]
    fn test_state_message_format() {
        let msg = WsMessage::State {
            state: QueryState {
                raw_input: "dun".to_string(),
                ..QueryState::default()
            },
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "state");
        assert_eq!(json["state"]["raw_input"], "dun");
        assert_eq!(json["state"]["is_loading"], false);
        assert!(json["state"]["error_message"].is_null());
    }

    #[test]
    fn test_trending_message_format() {
        let msg = WsMessage::Trending {
            entries: vec![TrendingEntry {
                rank: 1,
                search_term: "dune".to_string(),
                count: 3,
                movie_id: 438631,
                poster_url: "https://image.tmdb.org/t/p/w500/d5NXSklXo0qyIYkgV94XAgMIckC.jpg"
                    .to_string(),
            }],
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "trending");
        assert_eq!(json["entries"][0]["search_term"], "dune");
        assert_eq!(json["entries"][0]["count"], 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_message_drives_session() {
        let (session, catalog, store) = start_session().await;

        assert_ok!(apply_client_message(&session, r#"{"type":"input","value":"heat"}"#).await);
        assert_eq!(session.state().raw_input, "heat");
        sleep(Duration::from_secs(1)).await;

        assert_eq!(
            catalog.recorded_queries().await.last(),
            Some(&CatalogQuery::Keyword("heat".to_string()))
        );
        assert_eq!(session.state().results[0].title, "Heat");

        session.shutdown().await;
        assert!(store.find_by_term("heat").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_trending_message() {
        let (session, _, store) = start_session().await;
        sleep(Duration::from_millis(10)).await;
        assert!(session.trending().is_empty());

        store.insert_raw("x", "alien", 5).await;
        assert_ok!(apply_client_message(&session, r#"{"type":"reload_trending"}"#).await);
        assert_eq!(session.trending()[0].search_term, "alien");

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_message_gets_error_reply() {
        let (session, _, _) = start_session().await;

        match handle_client_text(&session, r#"{"type":"serach"}"#).await {
            Some(WsMessage::Error { message }) => assert_eq!(message, INVALID_MESSAGE),
            other => panic!("Expected error reply, got {:?}", other),
        }
        assert!(handle_client_text(&session, r#"{"type":"input","value":"d"}"#)
            .await
            .is_none());

        let reply = WsMessage::Error {
            message: INVALID_MESSAGE.to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "Invalid message");

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_message_is_rejected() {
        let (session, catalog, _) = start_session().await;

        assert_err!(apply_client_message(&session, "not json").await);
        assert_err!(apply_client_message(&session, r#"{"type":"input"}"#).await);
        assert_eq!(session.state().raw_input, "");

        session.shutdown().await;
        assert_eq!(
            catalog.recorded_queries().await,
            vec![CatalogQuery::Popular]
        );
    }
}
