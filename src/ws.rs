//! WebSocket transport for the live topology stream.

use crate::streaming::{StreamingServer, Subscription};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

pub fn router(server: Arc<StreamingServer>) -> Router {
    Router::new()
        .route("/ws", get(ws_topology))
        .route("/health", get(health))
        .with_state(server)
}

/// Serve the router on `bind_address` until `shutdown` flips to `true`.
pub async fn serve(
    server: Arc<StreamingServer>,
    bind_address: &str,
    mut shutdown: watch::Receiver<bool>,
) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("Listening for subscribers on ws://{}/ws", listener.local_addr()?);

    axum::serve(listener, router(server))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;
    Ok(())
}

async fn health(State(server): State<Arc<StreamingServer>>) -> impl IntoResponse {
    let graph = server.graph();
    let graph = graph.read();
    Json(serde_json::json!({
        "status": "ok",
        "services": graph.node_count(),
        "dependencies": graph.edge_count(),
        "subscribers": server.subscriber_count(),
    }))
}

async fn ws_topology(ws: WebSocketUpgrade, State(server): State<Arc<StreamingServer>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, server))
}

async fn handle_socket(socket: WebSocket, server: Arc<StreamingServer>) {
    let Subscription { id, mut receiver } = server.connect();
    let (mut sender, mut incoming) = socket.split();

    loop {
        tokio::select! {
            outbound = receiver.recv() => {
                // `None` means the broadcaster already dropped this subscriber.
                let Some(message) = outbound else { break };
                let payload = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(err) => {
                        error!("Failed to serialise topology event: {}", err);
                        continue;
                    }
                };
                if sender.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            inbound = incoming.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let reply = server.handle_client_text(&text);
                        let Ok(payload) = serde_json::to_string(&reply) else { continue };
                        if sender.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Pings are answered by axum itself.
                    Some(Ok(_)) => debug!(subscriber = %id, "Ignoring non-text frame"),
                    Some(Err(err)) => {
                        debug!(subscriber = %id, %err, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    server.disconnect(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, streaming::SharedGraph};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn server() -> Arc<StreamingServer> {
        Arc::new(StreamingServer::new(SharedGraph::default(), &Config::default()).unwrap())
    }

    #[tokio::test]
    async fn health_reports_graph_size() {
        let server = server();
        server.ingest_line("A -> B 1ms");

        let response = router(server)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["services"], 2);
        assert_eq!(json["dependencies"], 1);
        assert_eq!(json["subscribers"], 0);
    }

    #[tokio::test]
    async fn plain_request_to_ws_is_not_subscribed() {
        let server = server();
        let response = router(Arc::clone(&server))
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert_eq!(server.subscriber_count(), 0);
    }
}
