//! Guest window over a WebSocket connection to the host relay.
//!
//! The connection stands in for the iframe boundary.  Outgoing messages are
//! wrapped in an [`Envelope`] carrying the guest origin and the requested
//! target origin; the relay enforces the target on its side.  Incoming
//! envelopes are delivered as [`MessageEvent`]s only when they are addressed
//! to this guest's origin (or to `"*"`), mirroring `postMessage`.
//!
//! Location and reloads are in-memory: `reload()` wakes the page runtime,
//! which starts the next page load on the same connection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, info, warn};
use url::Url;

use theme_core::{decode_envelope, encode_envelope, Envelope, MessageEvent, Origin};

use crate::application::guest_page::PageSignals;
use crate::application::messenger::{GuestWindow, WindowError};

/// Buffered inbound messages per listener.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A [`GuestWindow`] whose parent is a remote host relay.
pub struct WsGuestWindow {
    origin: Origin,
    location: Mutex<Url>,
    reloads: AtomicUsize,
    outgoing: mpsc::UnboundedSender<String>,
    events: broadcast::Sender<MessageEvent>,
    reload_signal: Notify,
    closed: AtomicBool,
    close_signal: Notify,
}

impl WsGuestWindow {
    /// Connects to the relay at `host_url` as a page served from `location`.
    ///
    /// Spawns one reader and one writer task for the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if `location` has an opaque origin or the WebSocket
    /// handshake fails.
    pub async fn connect(host_url: &Url, location: Url) -> anyhow::Result<Arc<Self>> {
        let origin = Origin::from_url(&location)
            .with_context(|| format!("guest location {location} cannot be trusted"))?;

        let (ws_stream, _) = connect_async(host_url.as_str())
            .await
            .with_context(|| format!("failed to connect to host relay at {host_url}"))?;
        info!(%origin, "connected to host relay at {host_url}");

        let (mut ws_tx, ws_rx) = ws_stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let window = Arc::new(Self {
            origin,
            location: Mutex::new(location),
            reloads: AtomicUsize::new(0),
            outgoing,
            events,
            reload_signal: Notify::new(),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        });

        tokio::spawn(async move {
            while let Some(text) = outgoing_rx.recv().await {
                if let Err(e) = ws_tx.send(WsMessage::Text(text)).await {
                    debug!("relay write failed: {e}");
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        let reader = Arc::clone(&window);
        tokio::spawn(async move {
            reader.read_frames(ws_rx).await;
            reader.close();
        });

        Ok(window)
    }

    /// Number of reloads requested so far.
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    async fn read_frames<S>(&self, mut frames: S)
    where
        S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
    {
        while let Some(frame) = frames.next().await {
            let text = match frame {
                Ok(WsMessage::Text(text)) => text,
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => continue,
                Err(WsError::ConnectionClosed | WsError::Protocol(_)) => break,
                Err(e) => {
                    warn!("relay connection error: {e}");
                    break;
                }
            };

            let envelope = match decode_envelope(&text) {
                Ok(envelope) => envelope,
                Err(e) => {
                    debug!("dropping undecodable frame: {e}");
                    continue;
                }
            };
            if envelope.target_origin != "*" && !self.origin.matches(&envelope.target_origin) {
                debug!(
                    target_origin = %envelope.target_origin,
                    "dropping frame addressed to another origin"
                );
                continue;
            }
            // No listener attached means the message is lost, as in a browser.
            let _ = self.events.send(envelope.into_event());
        }
        debug!("relay connection closed");
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_signal.notify_waiters();
    }
}

#[async_trait]
impl GuestWindow for WsGuestWindow {
    fn origin(&self) -> Origin {
        self.origin.clone()
    }

    async fn post_to_parent(
        &self,
        data: Value,
        target_origin: &Origin,
    ) -> Result<(), WindowError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WindowError::Closed);
        }
        let text = encode_envelope(&Envelope {
            origin: self.origin.to_string(),
            target_origin: target_origin.to_string(),
            data,
        })
        .map_err(|e| WindowError::Transport(e.to_string()))?;
        self.outgoing.send(text).map_err(|_| WindowError::Closed)
    }

    fn location(&self) -> Url {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_location(&self, location: Url) {
        debug!(%location, "location replaced");
        *self.location.lock().unwrap_or_else(PoisonError::into_inner) = location;
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        self.reload_signal.notify_one();
    }

    fn message_events(&self) -> broadcast::Receiver<MessageEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl PageSignals for WsGuestWindow {
    async fn reload_requested(&self) {
        self.reload_signal.notified().await;
    }

    async fn disconnected(&self) {
        let notified = self.close_signal.notified();
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}
