use crate::agent::PortfolioAgent;
use crate::models::chat::{ ChatMessage, Conversation };
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::widget::{ ChatWidget, SubmitOutcome };
use futures::{ SinkExt, StreamExt };
use log::{ info, warn, error };
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::sync::mpsc::{ self, UnboundedSender };
use tokio_tungstenite::{ tungstenite::protocol::Message, WebSocketStream };

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

type Outbox = UnboundedSender<ServerMessage>;

fn push(outbox: &Outbox, msg: ServerMessage) {
    // The writer only goes away once the socket is closed.
    let _ = outbox.send(msg);
}

fn transcript(conversation: &Conversation) -> ServerMessage {
    ServerMessage::Transcript {
        messages: conversation.messages().to_vec(),
    }
}

fn response(reply: &ChatMessage) -> ServerMessage {
    ServerMessage::Response {
        content: reply.content.clone(),
        timestamp: reply.timestamp,
    }
}

fn millis(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)
}

async fn run_submission(widget: Arc<ChatWidget>, content: String, outbox: Outbox) {
    let processing = outbox.clone();
    let outcome = widget.submit_with(&content, move || {
        push(&processing, ServerMessage::Processing);
    }).await;

    match outcome {
        SubmitOutcome::Busy => push(&outbox, ServerMessage::Busy),
        SubmitOutcome::Ignored => {}
        SubmitOutcome::Replied(reply) => {
            push(&outbox, response(&reply));
            push(&outbox, ServerMessage::Idle);
        }
        SubmitOutcome::Failed { reply, error } => {
            push(&outbox, response(&reply));
            push(&outbox, ServerMessage::Notice {
                message: error.to_string(),
                dismiss_after_ms: millis(widget.notice_ttl()),
            });
            push(&outbox, ServerMessage::Idle);
        }
        SubmitOutcome::Discarded => push(&outbox, ServerMessage::Idle),
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<PortfolioAgent>
)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    info!("New WebSocket connection: {}", peer);

    let widget = Arc::new(agent.open_widget().await);
    info!("Assigned widget {} to {}", widget.id(), peer);

    let (mut tx, mut rx) = websocket.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<ServerMessage>();

    tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message for {}: {}", peer, e);
                    continue;
                }
            };
            if let Err(e) = tx.send(Message::Text(json)).await {
                error!("Error sending message to {}: {}", peer, e);
                break;
            }
        }
        let _ = tx.close().await;
    });

    push(&outbox, transcript(&widget.conversation()));

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    push(&outbox, ServerMessage::Error {
                        message: "Message too large".to_string(),
                    });
                    break;
                }

                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Chat { content }) => {
                                tokio::spawn(
                                    run_submission(widget.clone(), content, outbox.clone())
                                );
                            }
                            Ok(ClientMessage::Reset) => {
                                let fresh = widget.reset();
                                push(&outbox, transcript(&fresh));
                            }
                            Err(e) => {
                                error!("Failed to parse message from {}: {}", peer, e);
                                push(&outbox, ServerMessage::Error {
                                    message: format!("Failed to parse message: {}", e),
                                });
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {/* tungstenite queues the pong itself */}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {/* Usually ignore raw frames */}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    tokio_tungstenite::tungstenite::Error::Capacity(ref cap_err) => {
                        error!("WebSocket capacity error for {}: {}", peer, cap_err);
                        push(&outbox, ServerMessage::Error {
                            message: "Server capacity error".to_string(),
                        });
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }

    widget.reset();
    drop(outbox);
    info!("WebSocket connection closed for {} (Widget ID: {})", peer, widget.id());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dismiss_interval_saturates_instead_of_wrapping() {
        assert_eq!(millis(Duration::from_secs(5)), 5000);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
