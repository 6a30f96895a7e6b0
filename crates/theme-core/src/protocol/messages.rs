//! Message types exchanged between the host page and the embedded guest page.
//!
//! # Message flow
//!
//! ```text
//! Guest → Host:  {"type":"loading","loading":false}      guest finished loading
//! Host  → Guest: {"type":"theme-changed","themeId":"x"}  please switch theme
//! Guest → Host:  {"type":"loading","loading":true}       guest is about to reload
//! ```
//!
//! # JSON discriminant
//!
//! Every message is a JSON object with a `"type"` field that identifies the
//! variant.  Serde's `#[serde(tag = "type")]` attribute handles this
//! automatically, exactly like the browser-side object literals.
//!
//! Messages are immutable values: they are built, posted, and dropped.  There
//! is no identity or sequence number beyond the moment of transmission.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire value of the `"type"` field for [`ThemeMessage::Loading`].
pub const LOADING_TYPE: &str = "loading";

/// Wire value of the `"type"` field for [`ThemeMessage::ThemeChanged`].
pub const THEME_CHANGED_TYPE: &str = "theme-changed";

// ── Theme messages ────────────────────────────────────────────────────────────

/// All messages understood by the theme messenger.
///
/// # Serde representation
///
/// ```json
/// {"type":"loading","loading":true}
/// {"type":"theme-changed","themeId":"dark"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ThemeMessage {
    /// Guest → Host loading status.
    ///
    /// `loading == false` announces that the guest finished its initial load
    /// (the host hides its loader).  `loading == true` announces that the guest
    /// is about to reload to apply a new theme (the host shows its loader).
    #[serde(rename = "loading")]
    Loading {
        /// Whether the host should show its loading indicator.
        loading: bool,
    },

    /// Host → Guest request to switch to another theme.
    #[serde(rename = "theme-changed")]
    ThemeChanged {
        /// Identifier of the requested theme, e.g. `"dark"`.
        #[serde(rename = "themeId")]
        theme_id: String,
    },
}

impl ThemeMessage {
    /// Builds a [`ThemeMessage::Loading`] message.
    pub fn loading(loading: bool) -> Self {
        Self::Loading { loading }
    }

    /// Builds a [`ThemeMessage::ThemeChanged`] message.
    pub fn theme_changed(theme_id: impl Into<String>) -> Self {
        Self::ThemeChanged {
            theme_id: theme_id.into(),
        }
    }

    /// Returns the wire `"type"` value of this message.
    ///
    /// Used in log lines so that payload values never end up in the logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Loading { .. } => LOADING_TYPE,
            Self::ThemeChanged { .. } => THEME_CHANGED_TYPE,
        }
    }
}

// ── Decoded inbound payloads ──────────────────────────────────────────────────

/// Result of decoding an arbitrary posted payload.
///
/// Anything can be posted across a window boundary, so decoding distinguishes
/// between messages this crate understands and everything else.  Unknown
/// payloads are not errors: newer hosts may send message types that older
/// guests simply ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// A recognised message.
    Known(ThemeMessage),
    /// A payload with an unrecognised (or missing / non-string) `"type"`.
    Unknown {
        /// The `"type"` string, when the payload carried one.
        message_type: Option<String>,
    },
}

// ── Delivered events ──────────────────────────────────────────────────────────

/// One cross-window message as seen by the receiving window.
///
/// `origin` is the origin of the *sender* as reported by the delivery
/// mechanism; it is a raw string because receivers must be able to inspect
/// (and reject) values that are not valid origins, such as `"null"`.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Origin of the window that posted the message.
    pub origin: String,
    /// The posted payload, untouched.
    pub data: Value,
}

impl MessageEvent {
    /// Creates a message event.
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

// ── Transport envelope ────────────────────────────────────────────────────────

/// A posted message wrapped for transports that do not track origins
/// themselves (for example a WebSocket connection between host and guest).
///
/// # Serde representation
///
/// ```json
/// {
///   "origin": "http://localhost:8000",
///   "targetOrigin": "https://localhost:7170",
///   "data": {"type": "theme-changed", "themeId": "dark"}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Origin of the sending window.
    pub origin: String,
    /// Origin the sender requires the receiver to have.  Receivers with a
    /// different origin must drop the envelope undelivered.
    pub target_origin: String,
    /// The posted payload.
    pub data: Value,
}

impl Envelope {
    /// Converts the envelope into the event the receiving window observes.
    pub fn into_event(self) -> MessageEvent {
        MessageEvent {
            origin: self.origin,
            data: self.data,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
