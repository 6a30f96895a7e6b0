//! Domain layer: origin policy, location rewriting, and lifecycle rules.
//!
//! Nothing in here performs I/O or depends on an async runtime, which keeps
//! the trust decisions easy to test exhaustively.

pub mod lifecycle;
pub mod location;
pub mod origin;
pub mod registry;
