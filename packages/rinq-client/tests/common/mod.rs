//! Shared utilities for connection integration tests.

use std::future::Future;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

/// How the mock peer answers the handshake
#[derive(Debug, Clone, Copy)]
pub enum Selection {
    /// Complete the upgrade, optionally naming a subprotocol
    Accept(Option<&'static str>),
    /// Reject the upgrade with an HTTP status
    Refuse(u16),
}

/// A running single-connection peer
pub struct MockPeer {
    pub url: String,
    /// The `Sec-WebSocket-Protocol` header the client offered
    pub offered: oneshot::Receiver<Option<String>>,
}

/// Start a peer that accepts one connection, answers the handshake per
/// `selection` and then hands the socket to `script`.
pub async fn start_peer<F, Fut>(selection: Selection, script: F) -> MockPeer
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (offered_tx, offered_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();

        let callback = move |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
            let offered = request
                .headers()
                .get(SEC_WEBSOCKET_PROTOCOL)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let _ = offered_tx.send(offered);

            match selection {
                Selection::Accept(Some(name)) => {
                    response
                        .headers_mut()
                        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(name));
                    Ok(response)
                }
                Selection::Accept(None) => Ok(response),
                Selection::Refuse(status) => Err(Response::builder()
                    .status(status)
                    .body(Some("handshake refused".to_string()))
                    .unwrap()),
            }
        };

        if let Ok(ws) = accept_hdr_async(stream, callback).await {
            script(ws).await;
        }
    });

    MockPeer {
        url: format!("ws://{}", addr),
        offered: offered_rx,
    }
}

/// Start a peer that accepts TCP connections but never answers the handshake
pub async fn start_silent_peer() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    format!("ws://{}", addr)
}
