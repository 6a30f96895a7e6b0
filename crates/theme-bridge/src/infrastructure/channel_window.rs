//! In-process host/guest window pair built on Tokio channels.
//!
//! This is the embedding-friendly transport: a host application and a guest
//! page that live in the same process talk through a [`WindowPair`] exactly
//! the way a parent window and an iframe talk through `postMessage`.  The
//! browser's delivery rule is reproduced on both sides: a message is only
//! delivered if the receiver's origin equals the `target_origin` the sender
//! named (`"*"` is accepted from the host side only).
//!
//! The guest half also records every location replacement and reload, which
//! is what the integration tests assert on.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, Notify};
use tracing::debug;
use url::Url;

use theme_core::{MessageEvent, Origin, OriginError};

use crate::application::guest_page::PageSignals;
use crate::application::messenger::{GuestWindow, WindowError};

/// Buffered inbound messages per guest listener.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Target origin that matches any receiver.
const WILDCARD_TARGET: &str = "*";

/// Both ends of an in-process window relationship.
pub struct WindowPair {
    pub host: HostEnd,
    pub guest: Arc<ChannelGuestWindow>,
}

/// Creates a connected host/guest pair.
///
/// The guest origin is derived from `guest_location`.
///
/// # Errors
///
/// Returns [`OriginError::Opaque`] if `guest_location` has no tuple origin
/// (e.g. a `data:` URL).
pub fn window_pair(host_origin: Origin, guest_location: Url) -> Result<WindowPair, OriginError> {
    let guest_origin = Origin::from_url(&guest_location)?;
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let (to_host, inbox) = mpsc::unbounded_channel();

    let guest = Arc::new(ChannelGuestWindow {
        origin: guest_origin,
        parent_origin: host_origin.clone(),
        location: Mutex::new(guest_location),
        replaced: Mutex::new(Vec::new()),
        reloads: AtomicUsize::new(0),
        events: events.clone(),
        to_host,
        reload_signal: Notify::new(),
        closed: AtomicBool::new(false),
        close_signal: Notify::new(),
    });

    Ok(WindowPair {
        host: HostEnd {
            origin: host_origin,
            events,
            inbox,
            guest: Arc::clone(&guest),
        },
        guest,
    })
}

// ── Guest end ─────────────────────────────────────────────────────────────────

/// The guest page's side of a [`WindowPair`].
pub struct ChannelGuestWindow {
    origin: Origin,
    parent_origin: Origin,
    location: Mutex<Url>,
    replaced: Mutex<Vec<Url>>,
    reloads: AtomicUsize,
    events: broadcast::Sender<MessageEvent>,
    to_host: mpsc::UnboundedSender<MessageEvent>,
    reload_signal: Notify,
    closed: AtomicBool,
    close_signal: Notify,
}

impl ChannelGuestWindow {
    /// Every location passed to `replace_location`, oldest first.
    pub fn replaced_locations(&self) -> Vec<Url> {
        self.replaced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of reloads requested so far.
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Number of listeners currently subscribed to inbound messages.
    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_signal.notify_waiters();
    }
}

#[async_trait]
impl GuestWindow for ChannelGuestWindow {
    fn origin(&self) -> Origin {
        self.origin.clone()
    }

    async fn post_to_parent(
        &self,
        data: Value,
        target_origin: &Origin,
    ) -> Result<(), WindowError> {
        if target_origin != &self.parent_origin {
            // The browser drops these without telling the sender.
            debug!(
                %target_origin,
                parent = %self.parent_origin,
                "message not delivered: target origin mismatch"
            );
            return Ok(());
        }
        self.to_host
            .send(MessageEvent::new(self.origin.as_str(), data))
            .map_err(|_| WindowError::Closed)
    }

    fn location(&self) -> Url {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_location(&self, location: Url) {
        self.replaced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(location.clone());
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
impl PageSignals for ChannelGuestWindow {
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

// ── Host end ──────────────────────────────────────────────────────────────────

/// The host window's side of a [`WindowPair`].
///
/// Dropping it disconnects the guest.
pub struct HostEnd {
    origin: Origin,
    events: broadcast::Sender<MessageEvent>,
    inbox: mpsc::UnboundedReceiver<MessageEvent>,
    guest: Arc<ChannelGuestWindow>,
}

impl HostEnd {
    /// Origin the host stamps on everything it posts.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Posts `data` to the guest, stamped with the host origin.
    ///
    /// Returns `true` if at least one guest listener received it.  Nothing is
    /// delivered when `target_origin` is neither `"*"` nor the guest origin.
    pub fn post_to_guest(&self, data: Value, target_origin: &str) -> bool {
        if target_origin != WILDCARD_TARGET && !self.guest.origin.matches(target_origin) {
            debug!(target_origin, "message not delivered: target origin mismatch");
            return false;
        }
        self.deliver_raw(MessageEvent::new(self.origin.as_str(), data))
    }

    /// Delivers `event` to the guest as-is, with whatever origin it carries.
    ///
    /// Stands in for a message from some other window (a different frame, a
    /// malicious opener, ...).
    pub fn deliver_raw(&self, event: MessageEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Waits for the next message the guest posted to the host.
    pub async fn recv(&mut self) -> Option<MessageEvent> {
        self.inbox.recv().await
    }

    /// Returns the next already-posted message, if any.
    pub fn try_recv(&mut self) -> Option<MessageEvent> {
        self.inbox.try_recv().ok()
    }
}

impl Drop for HostEnd {
    fn drop(&mut self) {
        self.guest.close();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
