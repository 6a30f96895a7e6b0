//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is built from defaults, optionally overlaid with a TOML file (see
//! `infrastructure::config_file`) and finally with CLI flags.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! reads inside the domain) lets tests and embedders construct a messenger
//! with exactly the trust table they need.

use std::net::SocketAddr;
use std::time::Duration;

use theme_core::{Origin, OriginRegistry};
use url::Url;

/// Default upper bound for one theme application.
pub const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings consumed by the messenger itself.
#[derive(Debug, Clone)]
pub struct MessengerConfig {
    /// Guest origin → trusted host origin table.
    pub origins: OriginRegistry,

    /// Maximum time the theme backend may take before the request is treated
    /// as failed and the reload is abandoned.
    pub apply_timeout: Duration,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            origins: OriginRegistry::with_defaults(),
            apply_timeout: DEFAULT_APPLY_TIMEOUT,
        }
    }
}

/// Settings of the host relay (`theme-bridge host`).
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Origin the host stamps on every message it posts, and the only
    /// `targetOrigin` it accepts from guests.
    pub origin: Origin,
}

impl Default for HostConfig {
    /// | Field     | Default                 |
    /// |-----------|-------------------------|
    /// | bind_addr | `127.0.0.1:8000`        |
    /// | origin    | `http://localhost:8000` |
    fn default() -> Self {
        Self {
            // These `.parse().expect()` calls are safe because the inputs are
            // compile-time-known valid literals.
            bind_addr: "127.0.0.1:8000".parse().expect("valid socket address"),
            origin: Origin::parse("http://localhost:8000").expect("valid origin"),
        }
    }
}

/// Settings of the guest page runtime (`theme-bridge guest`).
#[derive(Debug, Clone)]
pub struct GuestConfig {
    /// Initial navigable location of the guest page.  Its origin is the
    /// guest origin looked up in the registry.
    pub url: Url,

    /// WebSocket URL of the host relay.
    pub host_url: Url,
}

impl Default for GuestConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("https://localhost:7170/").expect("valid guest url"),
            host_url: Url::parse("ws://127.0.0.1:8000").expect("valid host url"),
        }
    }
}

/// All runtime configuration for the bridge binary.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    pub messenger: MessengerConfig,
    pub host: HostConfig,
    pub guest: GuestConfig,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_apply_timeout_is_30s() {
        let cfg = MessengerConfig::default();
        assert_eq!(cfg.apply_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_default_registry_trusts_local_host_for_local_guest() {
        let cfg = MessengerConfig::default();
        let guest = Origin::parse("https://localhost:7170").unwrap();
        assert_eq!(
            cfg.origins.trusted_host_for(&guest).map(Origin::as_str),
            Some("http://localhost:8000")
        );
    }

    #[test]
    fn test_default_host_binds_port_8000_on_loopback() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.bind_addr.port(), 8000);
        assert!(cfg.bind_addr.ip().is_loopback());
    }

    #[test]
    fn test_default_host_origin_matches_registry_entry() {
        // The out-of-the-box host and guest must trust each other.
        let cfg = BridgeConfig::default();
        let guest = Origin::from_url(&cfg.guest.url).unwrap();
        assert_eq!(
            cfg.messenger.origins.trusted_host_for(&guest),
            Some(&cfg.host.origin)
        );
    }

    #[test]
    fn test_default_guest_connects_to_default_host() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.guest.host_url.scheme(), "ws");
        assert_eq!(cfg.guest.host_url.port(), Some(cfg.host.bind_addr.port()));
    }

    #[test]
    fn test_config_can_be_cloned() {
        let cfg = BridgeConfig::default();
        let cloned = cfg.clone();
        assert_eq!(cfg.host.bind_addr, cloned.host.bind_addr);
        assert_eq!(cfg.messenger.origins, cloned.messenger.origins);
    }
}
