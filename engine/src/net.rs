//! The persistent bidirectional channel.
//!
//! LIFECYCLE
//! =========
//! One task owns the WebSocket: it drains the outbox into the socket,
//! decodes inbound binary frames and hands them to the application, and
//! fires two independent heartbeats — a channel keepalive (`ping`) and a
//! presence report (`user_online`) — with no acknowledgment requirement.
//!
//! On unexpected closure the client retries after a short, capped delay:
//! faster while a call is active, slower otherwise. This is deliberately
//! not exponential; the peer that matters most is a human mid-call.
//!
//! ERROR HANDLING
//! ==============
//! A malformed inbound frame is logged and dropped; it never reaches the
//! dispatch loop and never kills the connection.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use wire::{Envelope, ParticipantRef, Payload, decode_envelope, encode_envelope};

use crate::config::EngineConfig;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket transport failed: {0}")]
    Transport(Box<tokio_tungstenite::tungstenite::Error>),
}

/// Runs the WebSocket connection for one session channel.
pub struct ChannelClient {
    url: String,
    local: ParticipantRef,
    config: EngineConfig,
    outbox_rx: mpsc::UnboundedReceiver<Envelope>,
    inbound_tx: mpsc::UnboundedSender<Envelope>,
    in_call: watch::Receiver<bool>,
}

impl ChannelClient {
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        local: ParticipantRef,
        config: EngineConfig,
        outbox_rx: mpsc::UnboundedReceiver<Envelope>,
        inbound_tx: mpsc::UnboundedSender<Envelope>,
        in_call: watch::Receiver<bool>,
    ) -> Self {
        Self { url: url.into(), local, config, outbox_rx, inbound_tx, in_call }
    }

    /// Connection loop with capped reconnect backoff. Returns when the
    /// application drops its side of either channel.
    pub async fn run(mut self) {
        loop {
            match self.connect_once().await {
                Ok(ConnectionEnd::LocalShutdown) => {
                    info!("channel client shutting down");
                    return;
                }
                Ok(ConnectionEnd::RemoteClosed) => {
                    info!("channel closed by remote");
                }
                Err(e) => {
                    warn!(error = %e, "channel error");
                }
            }
            if self.inbound_tx.is_closed() {
                return;
            }

            let delay = if *self.in_call.borrow() {
                self.config.reconnect_delay_in_call
            } else {
                self.config.reconnect_delay_idle
            };
            debug!(?delay, "reconnecting after delay");
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect_once(&mut self) -> Result<ConnectionEnd, NetError> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| NetError::Connect(Box::new(e)))?;
        info!(url = %self.url, "channel connected");
        let (mut sink, mut source) = stream.split();

        let mut keepalive = tokio::time::interval(self.config.channel_heartbeat);
        let mut presence = tokio::time::interval(self.config.presence_heartbeat);

        loop {
            tokio::select! {
                out = self.outbox_rx.recv() => {
                    let Some(env) = out else {
                        return Ok(ConnectionEnd::LocalShutdown);
                    };
                    sink.send(Message::Binary(encode_envelope(&env).into()))
                        .await
                        .map_err(|e| NetError::Transport(Box::new(e)))?;
                }
                msg = source.next() => {
                    match msg {
                        None => return Ok(ConnectionEnd::RemoteClosed),
                        Some(Ok(Message::Binary(bytes))) => {
                            match decode_envelope(&bytes) {
                                Ok(env) => {
                                    if self.inbound_tx.send(env).is_err() {
                                        return Ok(ConnectionEnd::LocalShutdown);
                                    }
                                }
                                Err(e) => warn!(error = %e, "malformed inbound message dropped"),
                            }
                        }
                        Some(Ok(Message::Close(_))) => return Ok(ConnectionEnd::RemoteClosed),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(NetError::Transport(Box::new(e))),
                    }
                }
                _ = keepalive.tick() => {
                    let ping = Envelope::channel(self.local, Payload::Ping);
                    sink.send(Message::Binary(encode_envelope(&ping).into()))
                        .await
                        .map_err(|e| NetError::Transport(Box::new(e)))?;
                }
                _ = presence.tick() => {
                    let beat = Envelope::channel(self.local, Payload::UserOnline { who: self.local });
                    sink.send(Message::Binary(encode_envelope(&beat).into()))
                        .await
                        .map_err(|e| NetError::Transport(Box::new(e)))?;
                }
            }
        }
    }
}

enum ConnectionEnd {
    /// The application dropped its channel handles.
    LocalShutdown,
    /// The socket closed from the far side.
    RemoteClosed,
}
