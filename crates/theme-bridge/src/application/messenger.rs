//! CrossWindowThemeMessenger: origin-checked theme switching for a guest page.
//!
//! The messenger lives inside the embedded (guest) page.  It listens to the
//! page's cross-window message stream, accepts `theme-changed` requests only
//! from the host origin trusted for the guest's own origin, and drives the
//! theme switch:
//!
//! ```text
//! host ──{"type":"theme-changed","themeId":"dark"}──► guest
//! guest ──{"type":"loading","loading":true}────────► host     (show loader)
//! guest: apply_theme("dark")                                   (awaited, timeout-bound)
//! guest: location ?theme=dark, replace history entry, reload
//! ```
//!
//! # Architecture
//!
//! The messenger depends only on traits ([`GuestWindow`], [`ThemeBackend`])
//! and `theme-core` domain types.  All infrastructure is injected at
//! construction or `init` time, which makes every step unit-testable.
//!
//! # Concurrency
//!
//! One listener task handles events strictly one at a time, in arrival order.
//! `apply_theme` is the only suspension point inside a handled event.  The
//! detach signal is only observed *between* events, so `dispose` never cuts a
//! running sequence short.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use theme_core::{
    decode_message, encode_message, with_theme, InboundMessage, Lifecycle, LifecycleError,
    LifecycleEvent, MessageEvent, MessengerState, Origin, OriginVerdict, ProtocolError,
    ThemeMessage,
};

use crate::domain::config::MessengerConfig;

/// Capacity of the outcome broadcast channel.
const OUTCOME_CHANNEL_CAPACITY: usize = 32;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure of the window transport itself.
#[derive(Debug, Error)]
pub enum WindowError {
    /// The parent window (or the connection to it) is gone.
    #[error("parent window is no longer reachable")]
    Closed,

    /// The transport failed for another reason.
    #[error("window transport error: {0}")]
    Transport(String),
}

/// Why a theme could not be applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ThemeError {
    /// `init` was never called, so there is nobody to apply the theme.
    #[error("no theme backend registered for '{theme_id}'")]
    NoBackend { theme_id: String },

    /// The backend reported a failure.
    #[error("theme backend rejected '{theme_id}': {reason}")]
    Rejected { theme_id: String, reason: String },

    /// The backend did not finish within the configured timeout.
    #[error("applying theme '{theme_id}' timed out after {timeout:?}")]
    TimedOut { theme_id: String, timeout: Duration },
}

/// Errors returned by the messenger's outbound operations.
#[derive(Debug, Error)]
pub enum MessengerError {
    /// The guest origin has no trusted host; nothing was sent.
    #[error("guest origin {0} has no trusted host origin; message withheld")]
    MissingOriginMapping(Origin),

    /// The message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The window transport failed.
    #[error(transparent)]
    Window(#[from] WindowError),
}

// ── Collaborator traits ───────────────────────────────────────────────────────

/// The guest page's view of its own browsing context.
///
/// Browser, WebSocket, and in-process implementations live in the
/// infrastructure layer; tests use recording doubles.
#[async_trait]
pub trait GuestWindow: Send + Sync {
    /// Origin the guest page is served from.
    fn origin(&self) -> Origin;

    /// Posts `data` to the containing window.  Delivery only happens if the
    /// parent's origin equals `target_origin`.
    async fn post_to_parent(&self, data: Value, target_origin: &Origin)
        -> Result<(), WindowError>;

    /// Current navigable location.
    fn location(&self) -> Url;

    /// Replaces the current history entry with `location` (no new entry).
    fn replace_location(&self, location: Url);

    /// Forces a full reload of the guest page.
    fn reload(&self);

    /// Subscribes a new listener to inbound cross-window messages.
    fn message_events(&self) -> broadcast::Receiver<MessageEvent>;
}

/// The application-provided capability that actually installs a theme.
///
/// The messenger does not know how this happens (stylesheet swap, server
/// round trip, ...); it only sequences around it.
#[async_trait]
pub trait ThemeBackend: Send + Sync {
    /// Installs the theme identified by `theme_id`.
    async fn apply_theme(&self, theme_id: &str) -> Result<(), String>;
}

// ── Outcomes ──────────────────────────────────────────────────────────────────

/// Why an inbound event was dropped without any effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Sender is not the trusted host origin.
    OriginMismatch,
    /// The guest origin is not in the registry, so nobody is trusted.
    MissingOriginMapping,
    /// A known message type with invalid fields.
    MalformedPayload,
    /// A theme change is already in progress.
    Busy,
}

/// What handling one inbound event resulted in.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// Dropped silently; no message sent, no theme applied, no navigation.
    Discarded(DiscardReason),
    /// Trusted, but not a request this messenger acts on.
    Ignored { message_type: Option<String> },
    /// Theme applied; the page location was rewritten and a reload forced.
    Reloaded { theme_id: String, location: Url },
    /// Theme application failed; the reload was abandoned.
    ThemeFailed { theme_id: String, error: ThemeError },
}

// ── Messenger ─────────────────────────────────────────────────────────────────

/// State shared between the messenger handle and its listener task.
struct Shared {
    window: Arc<dyn GuestWindow>,
    config: MessengerConfig,
    backend: Mutex<Option<Arc<dyn ThemeBackend>>>,
    lifecycle: Mutex<Lifecycle>,
    outcomes: broadcast::Sender<HandleOutcome>,
}

/// An attached listener: dropping `detach` (or sending on it) stops it.
struct Listener {
    detach: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Mediates the origin-validated theme exchange between a guest page and its
/// host.
///
/// One instance exists per guest page load.  Construct it explicitly and
/// pass it (or an `Arc` of it) to whoever needs to call
/// [`announce_loaded`](Self::announce_loaded); there is no global instance.
pub struct CrossWindowThemeMessenger {
    shared: Arc<Shared>,
    listener: Option<Listener>,
}

impl CrossWindowThemeMessenger {
    /// Creates a messenger in the `Idle` state.
    pub fn new(window: Arc<dyn GuestWindow>, config: MessengerConfig) -> Self {
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                window,
                config,
                backend: Mutex::new(None),
                lifecycle: Mutex::new(Lifecycle::new()),
                outcomes,
            }),
            listener: None,
        }
    }

    /// Stores the theme backend and starts listening for messages.
    ///
    /// Calling `init` again while a listener is attached only swaps the
    /// backend; it never attaches a second listener.  Once the page is
    /// reloading the call is ignored.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn init(&mut self, backend: Arc<dyn ThemeBackend>) {
        if lock(&self.shared.lifecycle).is_terminal() {
            debug!("ignoring init: page is reloading");
            return;
        }
        if let Err(e) = self.shared.transition(LifecycleEvent::Init) {
            warn!("ignoring init: {e}");
            return;
        }
        *lock(&self.shared.backend) = Some(backend);

        if self
            .listener
            .as_ref()
            .is_some_and(|listener| !listener.task.is_finished())
        {
            debug!("messenger already listening; backend replaced");
            return;
        }

        // Subscribe before spawning so that nothing posted right after `init`
        // returns can be missed.
        let events = self.shared.window.message_events();
        let (detach, detached) = oneshot::channel();
        let task = tokio::spawn(listen(Arc::clone(&self.shared), events, detached));
        self.listener = Some(Listener { detach, task });
        info!(
            guest_origin = %self.shared.window.origin(),
            trusted_origins = self.shared.config.origins.len(),
            "theme messenger listening"
        );
    }

    /// Stops listening for messages.
    ///
    /// Safe to call without `init` and safe to call twice.  A theme change
    /// that is already being applied runs to completion.
    pub fn dispose(&mut self) {
        if let Some(listener) = self.listener.take() {
            // The listener may already have exited on its own (page reload,
            // closed stream), in which case nobody is left to receive this.
            let _ = listener.detach.send(());
            debug!("theme messenger detached");
        }
        // Dispose is valid in every state.
        let _ = self.shared.transition(LifecycleEvent::Dispose);
    }

    /// Tells the host that the guest finished loading (`loading: false`).
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::MissingOriginMapping`] without sending
    /// anything when the guest origin has no trusted host, or a transport /
    /// encoding error.  Failures are also logged.
    pub async fn announce_loaded(&self) -> Result<(), MessengerError> {
        let result = self.shared.post(ThemeMessage::loading(false)).await;
        if let Err(e) = &result {
            warn!("could not announce load to host: {e}");
        }
        result
    }

    /// Applies a theme through the registered backend, bounded by the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// See [`ThemeError`].
    pub async fn apply_theme(&self, theme_id: &str) -> Result<(), ThemeError> {
        self.shared.apply_theme(theme_id).await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MessengerState {
        lock(&self.shared.lifecycle).state()
    }

    /// `true` while a listener is attached.
    pub fn is_listening(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| !listener.task.is_finished())
    }

    /// Subscribes to the outcome of every event the listener handles.
    ///
    /// This is where theme failures are reported; they never surface as
    /// panics or errors in unrelated code.
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<HandleOutcome> {
        self.shared.outcomes.subscribe()
    }
}

impl std::fmt::Debug for CrossWindowThemeMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossWindowThemeMessenger")
            .field("guest_origin", &self.shared.window.origin())
            .field("state", &self.state())
            .field("listening", &self.is_listening())
            .finish()
    }
}

// ── Listener task ─────────────────────────────────────────────────────────────

async fn listen(
    shared: Arc<Shared>,
    mut events: broadcast::Receiver<MessageEvent>,
    mut detached: oneshot::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            // Detach wins over a pending message: after `dispose` returns no
            // further message may reach the handler.
            biased;
            _ = &mut detached => break,
            received = events.recv() => match received {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("theme messenger lagged; {skipped} messages dropped");
                    continue;
                }
                Err(RecvError::Closed) => {
                    debug!("message stream closed");
                    break;
                }
            },
        };

        let outcome = shared.handle(event).await;
        let reloading = matches!(outcome, HandleOutcome::Reloaded { .. });
        // No subscribers is the normal case.
        let _ = shared.outcomes.send(outcome);

        if reloading {
            // The page is going away; a fresh messenger takes over after reload.
            break;
        }
    }
}

// ── Event handling ────────────────────────────────────────────────────────────

impl Shared {
    async fn handle(&self, event: MessageEvent) -> HandleOutcome {
        let guest = self.window.origin();
        match self.config.origins.verify(&guest, &event.origin) {
            OriginVerdict::Trusted => {}
            OriginVerdict::Mismatch => {
                debug!(origin = %event.origin, "discarding message from untrusted origin");
                return HandleOutcome::Discarded(DiscardReason::OriginMismatch);
            }
            OriginVerdict::Unmapped => {
                debug!(%guest, "discarding message: guest origin has no trusted host");
                return HandleOutcome::Discarded(DiscardReason::MissingOriginMapping);
            }
        }

        let message = match decode_message(&event.data) {
            Ok(InboundMessage::Known(message)) => message,
            Ok(InboundMessage::Unknown { message_type }) => {
                debug!(?message_type, "ignoring unknown message type");
                return HandleOutcome::Ignored { message_type };
            }
            Err(e) => {
                debug!("discarding malformed message: {e}");
                return HandleOutcome::Discarded(DiscardReason::MalformedPayload);
            }
        };

        match message {
            ThemeMessage::ThemeChanged { theme_id } => self.change_theme(theme_id).await,
            other => HandleOutcome::Ignored {
                message_type: Some(other.type_name().to_string()),
            },
        }
    }

    async fn change_theme(&self, theme_id: String) -> HandleOutcome {
        if let Err(e) = self.transition(LifecycleEvent::ThemeRequested) {
            debug!("discarding theme request: {e}");
            return HandleOutcome::Discarded(DiscardReason::Busy);
        }
        info!(%theme_id, "theme change requested by host");

        // Show the host loader.  A lost status message does not stop the switch.
        if let Err(e) = self.post(ThemeMessage::loading(true)).await {
            warn!("could not signal loading to host: {e}");
        }

        match self.apply_theme(&theme_id).await {
            Ok(()) => {
                let location = with_theme(&self.window.location(), &theme_id);
                let _ = self.transition(LifecycleEvent::ThemeApplied);
                self.window.replace_location(location.clone());
                info!(%theme_id, %location, "theme applied; reloading guest page");
                self.window.reload();
                HandleOutcome::Reloaded { theme_id, location }
            }
            Err(error) => {
                warn!("theme change abandoned: {error}");
                let _ = self.transition(LifecycleEvent::ThemeFailed);
                // Hide the loader again; the page keeps its current theme.
                if let Err(e) = self.post(ThemeMessage::loading(false)).await {
                    warn!("could not clear loading state on host: {e}");
                }
                HandleOutcome::ThemeFailed { theme_id, error }
            }
        }
    }

    async fn apply_theme(&self, theme_id: &str) -> Result<(), ThemeError> {
        let Some(backend) = lock(&self.backend).clone() else {
            return Err(ThemeError::NoBackend {
                theme_id: theme_id.to_string(),
            });
        };

        let timeout = self.config.apply_timeout;
        match tokio::time::timeout(timeout, backend.apply_theme(theme_id)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(ThemeError::Rejected {
                theme_id: theme_id.to_string(),
                reason,
            }),
            Err(_) => Err(ThemeError::TimedOut {
                theme_id: theme_id.to_string(),
                timeout,
            }),
        }
    }

    /// Posts `message` to the trusted host; never to a wildcard origin.
    async fn post(&self, message: ThemeMessage) -> Result<(), MessengerError> {
        let guest = self.window.origin();
        let Some(target) = self.config.origins.trusted_host_for(&guest) else {
            return Err(MessengerError::MissingOriginMapping(guest));
        };

        let data = encode_message(&message)?;
        self.window.post_to_parent(data, target).await?;
        debug!(message_type = message.type_name(), %target, "posted message to host");
        Ok(())
    }

    fn transition(&self, event: LifecycleEvent) -> Result<MessengerState, LifecycleError> {
        lock(&self.lifecycle).apply(event)
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use theme_core::OriginRegistry;

    const GUEST_URL: &str = "https://localhost:7170/?page=grid";
    const HOST: &str = "http://localhost:8000";

    // ── Test doubles ──────────────────────────────────────────────────────────

    struct RecordingWindow {
        origin: Origin,
        location: Mutex<Url>,
        posted: Mutex<Vec<(Value, Origin)>>,
        replaced: Mutex<Vec<Url>>,
        reloads: AtomicUsize,
        events: broadcast::Sender<MessageEvent>,
    }

    impl RecordingWindow {
        fn new(location: &str) -> Arc<Self> {
            let location = Url::parse(location).unwrap();
            let (events, _) = broadcast::channel(16);
            Arc::new(Self {
                origin: Origin::from_url(&location).unwrap(),
                location: Mutex::new(location),
                posted: Mutex::new(Vec::new()),
                replaced: Mutex::new(Vec::new()),
                reloads: AtomicUsize::new(0),
                events,
            })
        }

        fn posted(&self) -> Vec<(Value, Origin)> {
            self.posted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GuestWindow for RecordingWindow {
        fn origin(&self) -> Origin {
            self.origin.clone()
        }

        async fn post_to_parent(
            &self,
            data: Value,
            target_origin: &Origin,
        ) -> Result<(), WindowError> {
            self.posted
                .lock()
                .unwrap()
                .push((data, target_origin.clone()));
            Ok(())
        }

        fn location(&self) -> Url {
            self.location.lock().unwrap().clone()
        }

        fn replace_location(&self, location: Url) {
            self.replaced.lock().unwrap().push(location.clone());
            *self.location.lock().unwrap() = location;
        }

        fn reload(&self) {
            self.reloads.fetch_add(1, Ordering::SeqCst);
        }

        fn message_events(&self) -> broadcast::Receiver<MessageEvent> {
            self.events.subscribe()
        }
    }

    mock! {
        Backend {}

        #[async_trait]
        impl ThemeBackend for Backend {
            async fn apply_theme(&self, theme_id: &str) -> Result<(), String>;
        }
    }

    fn messenger_for(window: &Arc<RecordingWindow>) -> CrossWindowThemeMessenger {
        CrossWindowThemeMessenger::new(
            Arc::clone(window) as Arc<dyn GuestWindow>,
            MessengerConfig::default(),
        )
    }

    fn ok_backend(expected_calls: usize) -> Arc<MockBackend> {
        let mut backend = MockBackend::new();
        backend
            .expect_apply_theme()
            .times(expected_calls)
            .returning(|_| Ok(()));
        Arc::new(backend)
    }

    fn theme_changed(origin: &str, theme_id: &str) -> MessageEvent {
        MessageEvent::new(origin, json!({"type": "theme-changed", "themeId": theme_id}))
    }

    // ── Direct handler tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_trusted_theme_change_runs_full_sequence() {
        // Arrange
        let window = RecordingWindow::new(GUEST_URL);
        let mut messenger = messenger_for(&window);
        messenger.init(ok_backend(1));

        // Act
        let outcome = messenger
            .shared
            .handle(theme_changed(HOST, "dark"))
            .await;

        // Assert
        let expected = Url::parse("https://localhost:7170/?page=grid&theme=dark").unwrap();
        assert_eq!(
            outcome,
            HandleOutcome::Reloaded {
                theme_id: "dark".to_string(),
                location: expected.clone()
            }
        );
        assert_eq!(
            window.posted(),
            vec![(
                json!({"type": "loading", "loading": true}),
                Origin::parse(HOST).unwrap()
            )]
        );
        assert_eq!(*window.replaced.lock().unwrap(), vec![expected]);
        assert_eq!(window.reloads.load(Ordering::SeqCst), 1);
        assert_eq!(messenger.state(), MessengerState::Reloading);
    }

    #[tokio::test]
    async fn test_untrusted_origin_has_no_effect() {
        let window = RecordingWindow::new(GUEST_URL);
        let mut messenger = messenger_for(&window);
        messenger.init(ok_backend(0));

        let outcome = messenger
            .shared
            .handle(theme_changed("https://evil.example", "dark"))
            .await;

        assert_eq!(outcome, HandleOutcome::Discarded(DiscardReason::OriginMismatch));
        assert!(window.posted().is_empty());
        assert!(window.replaced.lock().unwrap().is_empty());
        assert_eq!(window.reloads.load(Ordering::SeqCst), 0);
        assert_eq!(messenger.state(), MessengerState::Listening);
    }

    #[tokio::test]
    async fn test_null_origin_is_discarded() {
        let window = RecordingWindow::new(GUEST_URL);
        let mut messenger = messenger_for(&window);
        messenger.init(ok_backend(0));

        let outcome = messenger.shared.handle(theme_changed("null", "dark")).await;

        assert_eq!(outcome, HandleOutcome::Discarded(DiscardReason::OriginMismatch));
    }

    #[tokio::test]
    async fn test_unmapped_guest_discards_everything() {
        let window = RecordingWindow::new("https://unlisted.example/");
        let mut messenger = messenger_for(&window);
        messenger.init(ok_backend(0));

        let outcome = messenger.shared.handle(theme_changed(HOST, "dark")).await;

        assert_eq!(
            outcome,
            HandleOutcome::Discarded(DiscardReason::MissingOriginMapping)
        );
        assert!(window.posted().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_message_type_is_ignored() {
        let window = RecordingWindow::new(GUEST_URL);
        let mut messenger = messenger_for(&window);
        messenger.init(ok_backend(0));

        let outcome = messenger
            .shared
            .handle(MessageEvent::new(HOST, json!({"type": "resize", "height": 10})))
            .await;

        assert_eq!(
            outcome,
            HandleOutcome::Ignored {
                message_type: Some("resize".to_string())
            }
        );
        assert!(window.posted().is_empty());
    }

    #[tokio::test]
    async fn test_loading_echo_is_ignored() {
        let window = RecordingWindow::new(GUEST_URL);
        let mut messenger = messenger_for(&window);
        messenger.init(ok_backend(0));

        let outcome = messenger
            .shared
            .handle(MessageEvent::new(HOST, json!({"type": "loading", "loading": true})))
            .await;

        assert_eq!(
            outcome,
            HandleOutcome::Ignored {
                message_type: Some("loading".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_theme_request_is_discarded() {
        let window = RecordingWindow::new(GUEST_URL);
        let mut messenger = messenger_for(&window);
        messenger.init(ok_backend(0));

        let outcome = messenger
            .shared
            .handle(MessageEvent::new(HOST, json!({"type": "theme-changed"})))
            .await;

        assert_eq!(outcome, HandleOutcome::Discarded(DiscardReason::MalformedPayload));
        assert!(window.posted().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_abandons_reload_and_clears_loader() {
        // Arrange
        let window = RecordingWindow::new(GUEST_URL);
        let mut messenger = messenger_for(&window);
        let mut backend = MockBackend::new();
        backend
            .expect_apply_theme()
            .times(1)
            .returning(|_| Err("stylesheet missing".to_string()));
        messenger.init(Arc::new(backend));

        // Act
        let outcome = messenger.shared.handle(theme_changed(HOST, "dark")).await;

        // Assert
        assert_eq!(
            outcome,
            HandleOutcome::ThemeFailed {
                theme_id: "dark".to_string(),
                error: ThemeError::Rejected {
                    theme_id: "dark".to_string(),
                    reason: "stylesheet missing".to_string()
                }
            }
        );
        let posted: Vec<Value> = window.posted().into_iter().map(|(v, _)| v).collect();
        assert_eq!(
            posted,
            vec![
                json!({"type": "loading", "loading": true}),
                json!({"type": "loading", "loading": false})
            ]
        );
        assert!(window.replaced.lock().unwrap().is_empty());
        assert_eq!(window.reloads.load(Ordering::SeqCst), 0);
        assert_eq!(messenger.state(), MessengerState::Listening);
    }

    struct HangingBackend;

    #[async_trait]
    impl ThemeBackend for HangingBackend {
        async fn apply_theme(&self, _theme_id: &str) -> Result<(), String> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_backend_times_out() {
        let window = RecordingWindow::new(GUEST_URL);
        let config = MessengerConfig {
            apply_timeout: Duration::from_secs(5),
            ..MessengerConfig::default()
        };
        let mut messenger =
            CrossWindowThemeMessenger::new(Arc::clone(&window) as Arc<dyn GuestWindow>, config);
        messenger.init(Arc::new(HangingBackend));

        let outcome = messenger.shared.handle(theme_changed(HOST, "dark")).await;

        assert_eq!(
            outcome,
            HandleOutcome::ThemeFailed {
                theme_id: "dark".to_string(),
                error: ThemeError::TimedOut {
                    theme_id: "dark".to_string(),
                    timeout: Duration::from_secs(5)
                }
            }
        );
        assert_eq!(window.reloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_apply_theme_without_backend_fails() {
        let window = RecordingWindow::new(GUEST_URL);
        let messenger = messenger_for(&window);

        let err = messenger.apply_theme("dark").await.unwrap_err();

        assert_eq!(
            err,
            ThemeError::NoBackend {
                theme_id: "dark".to_string()
            }
        );
    }

    // ── announce_loaded ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_announce_loaded_targets_trusted_host_only() {
        let window = RecordingWindow::new(GUEST_URL);
        let messenger = messenger_for(&window);

        messenger.announce_loaded().await.unwrap();

        assert_eq!(
            window.posted(),
            vec![(
                json!({"type": "loading", "loading": false}),
                Origin::parse(HOST).unwrap()
            )]
        );
    }

    #[tokio::test]
    async fn test_announce_loaded_fails_closed_without_mapping() {
        // Arrange: empty registry → no trusted counterpart
        let window = RecordingWindow::new(GUEST_URL);
        let config = MessengerConfig {
            origins: OriginRegistry::new(),
            ..MessengerConfig::default()
        };
        let messenger =
            CrossWindowThemeMessenger::new(Arc::clone(&window) as Arc<dyn GuestWindow>, config);

        // Act
        let result = messenger.announce_loaded().await;

        // Assert: nothing was posted, not even to a wildcard
        assert!(matches!(
            result,
            Err(MessengerError::MissingOriginMapping(_))
        ));
        assert!(window.posted().is_empty());
    }

    // ── init / dispose ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_dispose_without_init_is_noop() {
        let window = RecordingWindow::new(GUEST_URL);
        let mut messenger = messenger_for(&window);

        messenger.dispose();

        assert_eq!(messenger.state(), MessengerState::Idle);
        assert!(!messenger.is_listening());
        assert!(window.posted().is_empty());
    }

    #[tokio::test]
    async fn test_init_twice_attaches_a_single_listener() {
        // Arrange
        let window = RecordingWindow::new(GUEST_URL);
        let mut messenger = messenger_for(&window);

        // Act
        messenger.init(ok_backend(0));
        messenger.init(ok_backend(0));

        // Assert: exactly one subscriber on the window's message stream
        assert_eq!(window.events.receiver_count(), 1);
        assert!(messenger.is_listening());
        assert_eq!(messenger.state(), MessengerState::Listening);
    }

    #[tokio::test]
    async fn test_init_is_ignored_after_reload() {
        let window = RecordingWindow::new(GUEST_URL);
        let mut messenger = messenger_for(&window);
        messenger.init(ok_backend(1));
        messenger.shared.handle(theme_changed(HOST, "dark")).await;

        let replacement = ok_backend(0);
        messenger.init(replacement.clone());

        assert_eq!(messenger.state(), MessengerState::Reloading);
        assert!(lock(&messenger.shared.lifecycle).is_terminal());
        // The replacement backend was never stored.
        assert_eq!(Arc::strong_count(&replacement), 1);
    }

    #[tokio::test]
    async fn test_listener_reports_outcome_of_posted_event() {
        // Arrange
        let window = RecordingWindow::new(GUEST_URL);
        let mut messenger = messenger_for(&window);
        let mut outcomes = messenger.subscribe_outcomes();
        messenger.init(ok_backend(0));

        // Act
        window
            .events
            .send(theme_changed("https://evil.example", "dark"))
            .unwrap();
        let outcome = outcomes.recv().await.unwrap();

        // Assert
        assert_eq!(outcome, HandleOutcome::Discarded(DiscardReason::OriginMismatch));
    }

    #[tokio::test]
    async fn test_debug_output_names_state() {
        let window = RecordingWindow::new(GUEST_URL);
        let messenger = messenger_for(&window);
        let text = format!("{messenger:?}");
        assert!(text.contains("Idle"));
        assert!(text.contains("https://localhost:7170"));
    }
}
