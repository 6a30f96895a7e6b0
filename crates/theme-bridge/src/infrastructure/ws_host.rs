//! Host relay: a WebSocket server that plays the parent window.
//!
//! Each connected guest is one session.  The relay behaves like a browser
//! parent window with a `postMessage` listener:
//!
//! 1. Frames from a guest are [`Envelope`]s.  Anything not addressed to the
//!    host origin is dropped, just as the browser would never deliver it.
//! 2. A `loading` status from a guest is logged and published as a
//!    [`HostEvent`]; it also tells the relay which origin the guest page is
//!    served from.
//! 3. Theme ids pushed through [`HostServer::requester`] are sent to every
//!    guest that has announced itself, as `theme-changed` messages stamped
//!    with the host origin and targeted at that guest's origin.
//!
//! # Shutdown
//!
//! The accept loop checks the shared `running` flag every 200 ms, so clearing
//! it stops new connections promptly.  Open sessions end when their guest
//! disconnects or the request channel closes.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use theme_core::{
    decode_envelope, decode_message, encode_envelope, encode_message, Envelope, InboundMessage,
    Origin, ProtocolError, ThemeMessage,
};

use crate::domain::config::HostConfig;

/// Pending theme requests buffered per session.
const REQUEST_CHANNEL_CAPACITY: usize = 16;

/// How often the accept loop re-checks the `running` flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Something the host application may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A guest completed the WebSocket handshake.
    GuestConnected { session: Uuid, peer: SocketAddr },
    /// The guest's connection ended.
    GuestDisconnected { session: Uuid },
    /// The guest reported its loading state (`true` = show the loader).
    LoadingStatus {
        session: Uuid,
        guest_origin: Origin,
        loading: bool,
    },
}

/// A bound, not yet running host relay.
pub struct HostServer {
    listener: TcpListener,
    origin: Origin,
    requests: broadcast::Sender<String>,
}

impl HostServer {
    /// Binds the WebSocket listener on `config.bind_addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (port in use,
    /// insufficient permission).
    pub async fn bind(config: HostConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind host relay on {}", config.bind_addr))?;
        let (requests, _) = broadcast::channel(REQUEST_CHANNEL_CAPACITY);

        Ok(Self {
            listener,
            origin: config.origin,
            requests,
        })
    }

    /// The address actually bound (useful with port 0).
    ///
    /// # Errors
    ///
    /// Propagates the OS error if the socket address cannot be queried.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle for pushing theme ids to connected guests.
    pub fn requester(&self) -> broadcast::Sender<String> {
        self.requests.clone()
    }

    /// Accepts guest connections until `running` is cleared.
    ///
    /// # Errors
    ///
    /// Currently only returns `Ok`; per-connection failures are logged.
    pub async fn run(
        self,
        events: mpsc::UnboundedSender<HostEvent>,
        running: Arc<AtomicBool>,
    ) -> anyhow::Result<()> {
        info!(
            origin = %self.origin,
            "host relay listening on {}",
            self.listener.local_addr()?
        );
        let origin = Arc::new(self.origin);

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            match timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    info!("new guest connection from {peer}");
                    let session = Session {
                        id: Uuid::new_v4(),
                        peer,
                        host_origin: Arc::clone(&origin),
                        events: events.clone(),
                    };
                    // Subscribe now so requests sent during the handshake are kept.
                    let requests = self.requests.subscribe();
                    tokio::spawn(session.handle(stream, requests));
                }
                Ok(Err(e)) => error!("accept error: {e}"),
                Err(_) => {
                    // No connection within the poll interval; re-check the flag.
                }
            }
        }

        Ok(())
    }
}

// ── Per-session handling ──────────────────────────────────────────────────────

struct Session {
    id: Uuid,
    peer: SocketAddr,
    host_origin: Arc<Origin>,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl Session {
    async fn handle(self, stream: TcpStream, requests: broadcast::Receiver<String>) {
        let id = self.id;
        match self.run(stream, requests).await {
            Ok(()) => info!("session {id} closed normally"),
            Err(e) => warn!("session {id} closed with error: {e:#}"),
        }
        let _ = self.events.send(HostEvent::GuestDisconnected { session: id });
    }

    async fn run(
        &self,
        stream: TcpStream,
        mut requests: broadcast::Receiver<String>,
    ) -> anyhow::Result<()> {
        let ws_stream = accept_async(stream)
            .await
            .with_context(|| format!("WebSocket handshake failed with {}", self.peer))?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let _ = self.events.send(HostEvent::GuestConnected {
            session: self.id,
            peer: self.peer,
        });

        // Learned from the guest's first status message.
        let mut guest_origin: Option<Origin> = None;

        loop {
            tokio::select! {
                frame = ws_rx.next() => {
                    let text = match frame {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(_))) | None => {
                            debug!("session {}: guest closed the connection", self.id);
                            break;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                            debug!("session {}: guest WebSocket closed", self.id);
                            break;
                        }
                        Some(Err(e)) => {
                            return Err(e).context("reading guest frame");
                        }
                    };

                    if let Some((origin, loading)) = read_status(&self.host_origin, &text) {
                        info!(session = %self.id, guest = %origin, loading, "guest loading status");
                        let _ = self.events.send(HostEvent::LoadingStatus {
                            session: self.id,
                            guest_origin: origin.clone(),
                            loading,
                        });
                        guest_origin = Some(origin);
                    }
                }

                request = requests.recv() => {
                    let theme_id = match request {
                        Ok(theme_id) => theme_id,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("session {}: {skipped} theme requests dropped", self.id);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };

                    let Some(target) = &guest_origin else {
                        debug!(
                            "session {}: guest has not announced itself; request skipped",
                            self.id
                        );
                        continue;
                    };

                    let frame = theme_request_frame(&self.host_origin, target, &theme_id)
                        .context("encoding theme request")?;
                    ws_tx
                        .send(WsMessage::Text(frame))
                        .await
                        .context("sending theme request")?;
                    info!(session = %self.id, %theme_id, "theme change requested");
                }
            }
        }

        Ok(())
    }
}

// ── Frame helpers ─────────────────────────────────────────────────────────────

/// Extracts `(guest origin, loading)` from a guest frame addressed to `host`.
///
/// Frames addressed elsewhere, frames with an unusable sender origin, and
/// messages other than `loading` yield `None`.
fn read_status(host: &Origin, text: &str) -> Option<(Origin, bool)> {
    let envelope = match decode_envelope(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("dropping undecodable guest frame: {e}");
            return None;
        }
    };

    if !host.matches(&envelope.target_origin) {
        debug!(
            target_origin = %envelope.target_origin,
            "dropping frame addressed to another origin"
        );
        return None;
    }

    match decode_message(&envelope.data) {
        Ok(InboundMessage::Known(ThemeMessage::Loading { loading })) => {
            let origin = Origin::parse(&envelope.origin).ok()?;
            Some((origin, loading))
        }
        Ok(other) => {
            debug!(?other, "ignoring guest message");
            None
        }
        Err(e) => {
            debug!("dropping malformed guest message: {e}");
            None
        }
    }
}

/// Builds the text frame asking `guest` to switch to `theme_id`.
fn theme_request_frame(
    host: &Origin,
    guest: &Origin,
    theme_id: &str,
) -> Result<String, ProtocolError> {
    let data = encode_message(&ThemeMessage::theme_changed(theme_id))?;
    encode_envelope(&Envelope {
        origin: host.to_string(),
        target_origin: guest.to_string(),
        data,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
