//! Websocket transport over tokio-tungstenite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use huddle_chats::{Actor, ChatError, ChatResult, ClientFrame, ServerEvent, Transport};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

enum Outgoing {
    Frame(ClientFrame),
    Close,
}

/// Sending half of a live gateway connection.
///
/// Frames are queued and written by a background task, so `send` never
/// waits on the network.
#[derive(Clone)]
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Outgoing>,
    connected: Arc<AtomicBool>,
}

impl WsTransport {
    /// Close the connection. Inbound events stop once the gateway answers.
    pub fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.outbound.send(Outgoing::Close);
        }
    }
}

impl Transport for WsTransport {
    fn send(&self, frame: ClientFrame) -> ChatResult<()> {
        if !self.is_connected() {
            return Err(ChatError::transport("not connected"));
        }
        self.outbound
            .send(Outgoing::Frame(frame))
            .map_err(|_| ChatError::transport("connection closed"))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Websocket URL for the gateway at `base_url`, carrying the actor's identity.
pub fn websocket_url(base_url: &str, actor: &Actor) -> ChatResult<Url> {
    let mut url = Url::parse(base_url)
        .and_then(|base| base.join("ws"))
        .map_err(|err| ChatError::validation(format!("invalid gateway url {}: {}", base_url, err)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ChatError::validation(format!(
                "unsupported gateway scheme {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ChatError::validation("cannot build websocket url"))?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("tenant", &actor.tenant_id)
            .append_pair("user", &actor.user_id);
        if let Some(name) = &actor.display_name {
            query.append_pair("name", name);
        }
    }
    Ok(url)
}

/// Open a websocket to the gateway.
///
/// Returns the transport and the stream of inbound events; the stream ends
/// when the connection drops, which is the caller's disconnect signal.
pub async fn connect(
    base_url: &str,
    actor: &Actor,
) -> ChatResult<(WsTransport, mpsc::Receiver<ServerEvent>)> {
    let url = websocket_url(base_url, actor)?;
    let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|err| ChatError::transport(format!("websocket connect failed: {}", err)))?;
    info!(url = %url.path(), user_id = %actor.user_id, "connected to gateway");

    let (mut sink, mut source) = stream.split();
    let connected = Arc::new(AtomicBool::new(true));
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outgoing>();
    let (inbound_tx, inbound_rx) = mpsc::channel::<ServerEvent>(256);

    let writer_connected = connected.clone();
    tokio::spawn(async move {
        while let Some(outgoing) = outbound_rx.recv().await {
            let message = match outgoing {
                Outgoing::Frame(frame) => match serde_json::to_string(&frame) {
                    Ok(text) => Message::Text(text),
                    Err(err) => {
                        warn!(error = %err, "failed to encode client frame");
                        continue;
                    }
                },
                Outgoing::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
        writer_connected.store(false, Ordering::SeqCst);
    });

    let reader_connected = connected.clone();
    tokio::spawn(async move {
        while let Some(message) = source.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            match serde_json::from_str::<ServerEvent>(&text) {
                Ok(event) => {
                    if inbound_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(err) => debug!(error = %err, "ignoring undecodable server frame"),
            }
        }
        reader_connected.store(false, Ordering::SeqCst);
        debug!("gateway connection closed");
    });

    Ok((
        WsTransport {
            outbound: outbound_tx,
            connected,
        },
        inbound_rx,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_carries_identity() {
        let actor = Actor::new("t1", "alice").with_display_name("Alice Liddell");
        let url = websocket_url("http://127.0.0.1:7070/", &actor).unwrap();

        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.path(), "/ws");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("tenant".to_string(), "t1".to_string())));
        assert!(pairs.contains(&("name".to_string(), "Alice Liddell".to_string())));
    }

    #[test]
    fn secure_gateways_use_wss() {
        let url = websocket_url("https://chat.example.com", &Actor::new("t1", "bob")).unwrap();
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(websocket_url("ftp://example.com", &Actor::new("t1", "bob")).is_err());
    }
}
