//! Theme backend for headless guests: records the switch in the log.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::application::messenger::ThemeBackend;

/// A [`ThemeBackend`] that "applies" a theme by logging it.
///
/// `delay` simulates the time a real backend spends fetching stylesheets.
#[derive(Debug, Clone, Default)]
pub struct LoggingThemeBackend {
    delay: Duration,
}

impl LoggingThemeBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ThemeBackend for LoggingThemeBackend {
    async fn apply_theme(&self, theme_id: &str) -> Result<(), String> {
        if theme_id.trim().is_empty() {
            return Err("theme id is empty".to_string());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        info!(%theme_id, "theme applied");
        Ok(())
    }
}
