//! WebSocket transport for observers.
//!
//! Each accepted socket becomes one [`ChannelObserver`]. The hub never writes
//! to a socket directly: it pushes [`StageMessage`]s into an unbounded
//! channel, and a writer task per connection encodes them as text frames.
//! When the writer stops (socket closed or broken) the channel closes, the
//! next send fails, and the hub drops the observer.
//!
//! Inbound text is handed to the hub on a spawned task, so a long protocol
//! run never stalls the reader of the connection that requested it.

use std::{future::Future, sync::Arc};

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use qkd_core::Environment;
use qkd_proto::StageMessage;
use tokio::sync::mpsc;

use crate::{
    AppState,
    hub::{ServerEvent, SessionHub},
    hub_error::TransportError,
    registry::{Observer, ObserverId},
    storage::Storage,
};

/// Observer backed by a connection's outbound queue.
#[derive(Clone, Debug)]
pub struct ChannelObserver {
    outbound: mpsc::UnboundedSender<StageMessage>,
}

impl ChannelObserver {
    /// Create an observer and the queue its connection drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StageMessage>) {
        let (outbound, queue) = mpsc::unbounded_channel();
        (Self { outbound }, queue)
    }
}

impl Observer for ChannelObserver {
    fn send(
        &self,
        message: &StageMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = self.outbound.send(message.clone()).map_err(|_| TransportError::Closed);
        std::future::ready(result)
    }
}

/// WebSocket upgrade handler for `GET /ws`.
pub(crate) async fn ws_handler<E, S>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<E, S>>,
) -> impl IntoResponse
where
    E: Environment,
    S: Storage,
{
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Drive one observer connection until it closes.
async fn handle_socket<E: Environment>(
    socket: WebSocket,
    hub: Arc<SessionHub<E, ChannelObserver>>,
) {
    let observer_id = ObserverId::new(hub.env().random_u64());
    let (observer, mut queue) = ChannelObserver::channel();
    let (mut ws_tx, mut ws_rx) = socket.split();

    if let Err(e) = hub.process_event(ServerEvent::ObserverConnected { observer_id, observer }).await
    {
        tracing::warn!(%observer_id, error = %e, "failed to register observer");
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(%observer_id, error = %e, "failed to encode stage message");
                    continue;
                },
            };

            if let Err(e) = ws_tx.send(Message::Text(text)).await {
                tracing::debug!(%observer_id, error = %e, "write failed");
                break;
            }
        }
    });

    let reason = loop {
        match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => {
                let hub = Arc::clone(&hub);
                tokio::spawn(async move {
                    let event = ServerEvent::TextReceived { observer_id, text };
                    if let Err(e) = hub.process_event(event).await {
                        tracing::debug!(%observer_id, error = %e, "text dropped");
                    }
                });
            },
            Some(Ok(Message::Close(_))) | None => break "closed by peer".to_string(),
            // Ping/pong are answered by axum; binary frames carry nothing for us
            Some(Ok(_)) => {},
            Some(Err(e)) => break e.to_string(),
        }
    };

    if let Err(e) =
        hub.process_event(ServerEvent::ObserverDisconnected { observer_id, reason }).await
    {
        tracing::debug!(%observer_id, error = %e, "disconnect after removal");
    }

    writer.abort();
}
