use futures::StreamExt;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{
    common::{
        backoff::Backoff,
        types::{AnyResult, UserId},
    },
    configs::NodeConfig,
    node::SessionSlot,
    protocol::{NodeEvent, NodeMessage},
};

const BACKOFF_BASE_MS: u64 = 1_000;
const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// WebSocket listener for the node's event stream.
///
/// Owns the reconnect loop; parsed events are forwarded to the main
/// dispatch loop over an unbounded channel.
pub struct NodeSocket {
    config: NodeConfig,
    user_id: UserId,
    session: SessionSlot,
    events: tokio::sync::mpsc::UnboundedSender<NodeEvent>,
    cancel_token: CancellationToken,
}

impl NodeSocket {
    pub fn new(
        config: NodeConfig,
        user_id: UserId,
        session: SessionSlot,
        events: tokio::sync::mpsc::UnboundedSender<NodeEvent>,
    ) -> Self {
        Self {
            config,
            user_id,
            session,
            events,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub async fn run(self) {
        let mut backoff = Backoff::new(BACKOFF_BASE_MS, MAX_RECONNECT_ATTEMPTS);

        loop {
            if self.cancel_token.is_cancelled() {
                return;
            }

            match self.connect(&mut backoff).await {
                Ok(true) => return, // cancelled mid-session
                Ok(false) => {}
                Err(e) => warn!("Node socket error: {}", e),
            }

            if backoff.is_exhausted() {
                error!("Node unreachable after max attempts; giving up");
                return;
            }
            let delay = backoff.next();
            debug!("Reconnecting to node in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Run one WS session to completion. Returns `true` on cancellation.
    async fn connect(&self, backoff: &mut Backoff) -> AnyResult<bool> {
        let url = self.config.ws_url();
        debug!("Connecting to node: {}", url);

        let mut request = url.into_client_request()?;
        let headers = request.headers_mut();
        headers.insert("Authorization", HeaderValue::from_str(&self.config.password)?);
        headers.insert(
            "User-Id",
            HeaderValue::from_str(&self.user_id.to_string())?,
        );
        headers.insert(
            "Client-Name",
            HeaderValue::from_static(concat!("groovelink/", env!("CARGO_PKG_VERSION"))),
        );

        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        let (_, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    return Ok(true);
                }
                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => {
                            warn!("Node WS read error: {}", e);
                            return Ok(false);
                        }
                        None => {
                            debug!("Node WS stream ended");
                            return Ok(false);
                        }
                    };

                    match msg {
                        Message::Text(text) => self.handle_text(text.as_str(), backoff),
                        Message::Close(frame) => {
                            let reason = frame
                                .map(|cf| format!("code={}, reason='{}'", u16::from(cf.code), cf.reason))
                                .unwrap_or_else(|| "no close frame".into());
                            info!("Node WS closed: {}", reason);
                            return Ok(false);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn handle_text(&self, text: &str, backoff: &mut Backoff) {
        let msg: NodeMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Unparseable node message: {} ({})", e, text);
                return;
            }
        };

        match msg {
            NodeMessage::Ready { resumed, session_id } => {
                info!("Node session ready: {} (resumed={})", session_id, resumed);
                self.session.set(session_id);
                backoff.reset();
            }
            NodeMessage::PlayerUpdate { guild_id, state } => {
                trace!(
                    "[{}] position={}ms connected={}",
                    guild_id, state.position, state.connected
                );
            }
            NodeMessage::Stats {} => {}
            NodeMessage::Event { event } => {
                if self.events.send(event).is_err() {
                    warn!("Event channel closed; dropping node event");
                }
            }
        }
    }
}
