//! Guest page runtime: the part of an embedded page that survives reloads.
//!
//! A browser reload tears the page down and runs its startup code again.
//! [`run_guest_page`] reproduces that cycle for non-browser windows: every
//! iteration is one page load with its own messenger instance.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use theme_core::theme_from_location;

use crate::application::messenger::{CrossWindowThemeMessenger, GuestWindow, ThemeBackend};
use crate::domain::config::MessengerConfig;

/// Page-level signals a window raises toward the page runtime.
#[async_trait]
pub trait PageSignals: Send + Sync {
    /// Resolves once after each call to [`GuestWindow::reload`].
    async fn reload_requested(&self);

    /// Resolves when the parent window is gone for good.
    async fn disconnected(&self);
}

/// Runs page loads on `window` until the parent disconnects.
///
/// Each load:
///
/// 1. creates a fresh [`CrossWindowThemeMessenger`] and `init`s it,
/// 2. applies the theme named in the location's `theme` parameter, if any,
/// 3. announces the finished load to the host,
/// 4. waits for a reload (next iteration) or a disconnect (return).
///
/// # Errors
///
/// Currently never fails; theme and transport problems are logged and the
/// page keeps running, as a browser page would.
pub async fn run_guest_page<W>(
    window: Arc<W>,
    backend: Arc<dyn ThemeBackend>,
    config: MessengerConfig,
) -> anyhow::Result<()>
where
    W: GuestWindow + PageSignals + 'static,
{
    let mut loads: u64 = 0;

    loop {
        loads += 1;
        let location = window.location();
        info!(load = loads, %location, "guest page loaded");

        let mut messenger = CrossWindowThemeMessenger::new(
            Arc::clone(&window) as Arc<dyn GuestWindow>,
            config.clone(),
        );
        messenger.init(Arc::clone(&backend));

        if let Some(theme_id) = theme_from_location(&location) {
            if let Err(e) = messenger.apply_theme(&theme_id).await {
                warn!("could not apply theme from location: {e}");
            }
        }

        // Failures are logged by the messenger; the page stays usable.
        let _ = messenger.announce_loaded().await;

        tokio::select! {
            _ = window.reload_requested() => {
                messenger.dispose();
            }
            _ = window.disconnected() => {
                messenger.dispose();
                info!("parent window gone; guest page stopped");
                return Ok(());
            }
        }
    }
}
