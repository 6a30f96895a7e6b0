//! Web origins: the scheme + host + port triple that identifies a trust domain.
//!
//! # Why parse instead of comparing strings?
//!
//! Browsers serialize origins canonically: lower-case host, no path, no
//! trailing slash, default ports omitted.  Configuration files and CLI flags
//! are written by humans, so `https://Demos.Telerik.com/` and
//! `https://demos.telerik.com` must be the same origin.  Parsing both sides
//! through the `url` crate and comparing the canonical ASCII serialization
//! gives exactly the browser's notion of equality.
//!
//! Inbound senders are the exception: a browser reports them already in
//! canonical form, so [`Origin::matches`] compares strings exactly and never
//! canonicalises untrusted input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors produced when a string cannot be turned into an [`Origin`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OriginError {
    /// The input is not an absolute URL.
    #[error("invalid origin '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    /// The URL has an opaque origin (`data:`, `file:`, `about:blank`, ...),
    /// which can never be trusted.
    #[error("'{0}' has an opaque origin")]
    Opaque(String),
}

/// A canonical, tuple (non-opaque) web origin such as `https://localhost:7170`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Origin(String);

impl Origin {
    /// Parses `input` (any absolute URL) and keeps only its origin.
    ///
    /// # Errors
    ///
    /// Returns [`OriginError::InvalidUrl`] for relative or malformed input and
    /// [`OriginError::Opaque`] for URLs without a tuple origin.
    ///
    /// # Example
    ///
    /// ```rust
    /// use theme_core::Origin;
    ///
    /// let origin = Origin::parse("https://Demos.Telerik.com/blazor-ui/?theme=x").unwrap();
    /// assert_eq!(origin.as_str(), "https://demos.telerik.com");
    /// ```
    pub fn parse(input: &str) -> Result<Self, OriginError> {
        let url = Url::parse(input).map_err(|e| OriginError::InvalidUrl {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_url(&url)
    }

    /// Extracts the origin of an already parsed URL.
    ///
    /// # Errors
    ///
    /// Returns [`OriginError::Opaque`] for URLs without a tuple origin.
    pub fn from_url(url: &Url) -> Result<Self, OriginError> {
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(OriginError::Opaque(url.to_string()));
        }
        Ok(Self(origin.ascii_serialization()))
    }

    /// Returns `true` if `candidate` is exactly this origin's canonical
    /// serialization.
    ///
    /// Origins reported by a delivery mechanism are already canonical, so
    /// nothing is parsed here: a path, query, fragment, credentials or a
    /// different letter case all make the candidate a different string and
    /// therefore a mismatch.  The literal `"null"` never matches.
    pub fn matches(&self, candidate: &str) -> bool {
        candidate == self.0
    }

    /// The canonical ASCII serialization.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Origin {
    type Err = OriginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Origin::parse(s)
    }
}

impl TryFrom<String> for Origin {
    type Error = OriginError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Origin::parse(&value)
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.0
    }
}

impl AsRef<str> for Origin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
