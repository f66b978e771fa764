//! Renderer configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`Renderer`](crate::Renderer).
///
/// Use the builder pattern to configure it:
///
/// ```ignore
/// RendererConfig::new()
///     .frame_interval(Duration::from_millis(33))
///     .execute_scripts_on_load(false)
///     .asset_root("scenes/assets")
/// ```
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Interval between frames when the renderer drives its own frame clock.
    pub frame_interval: Duration,
    /// Whether overlays run their scripts once loaded, unless the overlay
    /// says otherwise.
    pub execute_scripts_on_load: bool,
    /// Base directory for relative asset sources read by the default fetcher.
    pub asset_root: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            execute_scripts_on_load: true,
            asset_root: None,
        }
    }
}

impl RendererConfig {
    /// Create a new renderer configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interval between self-driven frames.
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Set the default for overlays that do not declare `executeScriptsOnLoad`.
    pub fn execute_scripts_on_load(mut self, execute: bool) -> Self {
        self.execute_scripts_on_load = execute;
        self
    }

    /// Set the base directory for relative asset sources.
    pub fn asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }
}
