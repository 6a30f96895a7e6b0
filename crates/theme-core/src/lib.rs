//! # theme-core
//!
//! Shared library for the cross-window theme messenger containing the wire
//! message types, the JSON codec, the origin trust policy, and the guest
//! lifecycle state machine.
//!
//! This crate is used by the host and guest sides of `theme-bridge`.  It has
//! zero dependencies on async runtimes, sockets, or windowing APIs.
//!
//! # Architecture overview (for beginners)
//!
//! A *guest* page is embedded inside a *host* page.  The host asks the guest to
//! switch its visual theme; the guest tells the host when it is busy
//! re-theming and when it has finished loading.  The two sides only talk via
//! small JSON messages posted across the window boundary, and every message is
//! checked against a fixed table of trusted origins.
//!
//! - **`protocol`** – What travels across the boundary: the
//!   [`ThemeMessage`] enum, the [`MessageEvent`] a receiver sees, and the
//!   [`Envelope`] used when the boundary is a WebSocket.
//!
//! - **`domain`** – Pure business rules: [`Origin`] parsing, the
//!   [`OriginRegistry`] trust table, the `theme` query-parameter rewrite, and
//!   the [`Lifecycle`] state machine of a guest page.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `theme_core::Origin` instead of `theme_core::domain::origin::Origin`.
pub use domain::lifecycle::{Lifecycle, LifecycleError, LifecycleEvent, MessengerState};
pub use domain::location::{theme_from_location, with_theme, THEME_PARAM};
pub use domain::origin::{Origin, OriginError};
pub use domain::registry::{OriginRegistry, OriginVerdict};
pub use protocol::codec::{
    decode_envelope, decode_message, encode_envelope, encode_message, ProtocolError,
};
pub use protocol::messages::{Envelope, InboundMessage, MessageEvent, ThemeMessage};
