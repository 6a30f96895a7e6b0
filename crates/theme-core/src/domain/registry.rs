//! Fixed trust table mapping a guest origin to its single trusted host origin.
//!
//! The guest only ever exchanges messages with one counterpart: the host
//! origin listed for the guest's *own* origin.  A guest served from an origin
//! that is not in the table has no trusted counterpart at all, so every
//! inbound message is rejected and every outbound message is withheld.

use std::collections::BTreeMap;

use crate::domain::origin::Origin;

/// Guest → host origin pairs of the public demo deployments plus local
/// development.
pub const DEFAULT_ORIGIN_PAIRS: &[(&str, &str)] = &[
    ("https://demos.telerik.com", "https://www.telerik.com"),
    ("https://sitdemos.telerik.com", "https://wwwsit.telerik.com"),
    ("https://localhost:7170", "http://localhost:8000"),
];

/// Outcome of checking an inbound message origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginVerdict {
    /// The sender is the trusted host for this guest.
    Trusted,
    /// The guest has a trusted host, but the sender is someone else.
    Mismatch,
    /// The guest origin has no entry; nobody is trusted.
    Unmapped,
}

/// One-to-one mapping `guest origin → trusted host origin`.
///
/// Inserting a second host for the same guest replaces the first, so the
/// "exactly one counterpart" invariant holds by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginRegistry {
    entries: BTreeMap<Origin, Origin>,
}

impl OriginRegistry {
    /// Creates an empty registry (every guest is unmapped).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with [`DEFAULT_ORIGIN_PAIRS`].
    pub fn with_defaults() -> Self {
        DEFAULT_ORIGIN_PAIRS
            .iter()
            .map(|(guest, host)| {
                // The pairs are compile-time constants that are known to be
                // valid tuple origins, so parsing cannot fail.
                (
                    Origin::parse(guest).expect("default guest origin is valid"),
                    Origin::parse(host).expect("default host origin is valid"),
                )
            })
            .collect()
    }

    /// Registers `host` as the trusted counterpart of `guest`.
    ///
    /// Returns the previously trusted host, if any.
    pub fn insert(&mut self, guest: Origin, host: Origin) -> Option<Origin> {
        self.entries.insert(guest, host)
    }

    /// Returns the trusted host origin for `guest`, if the guest is known.
    pub fn trusted_host_for(&self, guest: &Origin) -> Option<&Origin> {
        self.entries.get(guest)
    }

    /// Decides whether a message reported as coming from `sender` may be
    /// processed by a guest served from `guest`.
    ///
    /// `sender` must be exactly the trusted host's canonical origin string.
    pub fn verify(&self, guest: &Origin, sender: &str) -> OriginVerdict {
        match self.trusted_host_for(guest) {
            None => OriginVerdict::Unmapped,
            Some(trusted) if trusted.matches(sender) => OriginVerdict::Trusted,
            Some(_) => OriginVerdict::Mismatch,
        }
    }

    /// Number of known guest origins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no guest origin is known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(guest, host)` pairs in guest-origin order.
    pub fn iter(&self) -> impl Iterator<Item = (&Origin, &Origin)> {
        self.entries.iter()
    }
}

impl FromIterator<(Origin, Origin)> for OriginRegistry {
    fn from_iter<I: IntoIterator<Item = (Origin, Origin)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (guest, host) in iter {
            registry.insert(guest, host);
        }
        registry
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
