//! Lifecycle state machine of one guest page instance.
//!
//! ```text
//!            init                theme requested           theme applied
//!   Idle ─────────────► Listening ───────────────► Loading ──────────────► Reloading
//!    ▲                     │  ▲                        │                    (terminal)
//!    └──── dispose ────────┘  └──── theme failed ──────┘
//! ```
//!
//! `dispose` detaches the listener.  It moves `Listening` back to `Idle` but
//! leaves an in-flight `Loading` / `Reloading` sequence alone: there is no way
//! to cancel it.  A failure that completes after `dispose` therefore lands in
//! `Idle` instead of `Listening`.
//!
//! `Reloading` is terminal for the instance; the reloaded page starts over
//! with a fresh instance in `Idle`.

use std::fmt;

use thiserror::Error;

/// States of a guest page instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessengerState {
    /// Not attached to the message stream.
    #[default]
    Idle,
    /// Attached and waiting for requests.
    Listening,
    /// A theme change was accepted and is being applied.
    Loading,
    /// The theme was applied and the page is reloading.
    Reloading,
}

impl fmt::Display for MessengerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Loading => "loading",
            Self::Reloading => "reloading",
        };
        f.write_str(name)
    }
}

/// Inputs that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Init,
    Dispose,
    ThemeRequested,
    ThemeApplied,
    ThemeFailed,
}

/// A transition that the state machine does not allow.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cannot handle {event:?} while {from}")]
pub struct LifecycleError {
    pub from: MessengerState,
    pub event: LifecycleEvent,
}

/// Current state plus whether a listener is attached.
///
/// The attached flag is tracked separately from the state because a sequence
/// that is already `Loading` keeps running after `dispose`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lifecycle {
    state: MessengerState,
    attached: bool,
}

impl Lifecycle {
    /// A fresh instance in [`MessengerState::Idle`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    pub fn state(&self) -> MessengerState {
        self.state
    }

    /// `true` while a listener is attached to the message stream.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// `true` once the instance reached its terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state == MessengerState::Reloading
    }

    /// Applies `event` and returns the new state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] and leaves the machine untouched when the
    /// event is not valid in the current state.
    pub fn apply(&mut self, event: LifecycleEvent) -> Result<MessengerState, LifecycleError> {
        use LifecycleEvent as E;
        use MessengerState as S;

        let next = match (self.state, event) {
            (S::Reloading, E::Init) => return Err(self.reject(event)),
            (S::Idle, E::Init) => S::Listening,
            (state, E::Init) => state,

            (S::Listening, E::Dispose) => S::Idle,
            (state, E::Dispose) => state,

            (S::Listening, E::ThemeRequested) => S::Loading,
            (S::Loading, E::ThemeApplied) => S::Reloading,
            (S::Loading, E::ThemeFailed) if self.attached => S::Listening,
            (S::Loading, E::ThemeFailed) => S::Idle,

            _ => return Err(self.reject(event)),
        };

        match event {
            E::Init => self.attached = true,
            E::Dispose => self.attached = false,
            _ => {}
        }
        self.state = next;
        Ok(next)
    }

    fn reject(&self, event: LifecycleEvent) -> LifecycleError {
        LifecycleError {
            from: self.state,
            event,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
