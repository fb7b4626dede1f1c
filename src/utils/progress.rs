//! Progress indicators for long-running commands.
//!
//! Bars are drawn with `indicatif` and are hidden entirely when
//! `SOLKIT_NO_PROGRESS` is set, so scripts and CI get clean output.
//!
//! [`DeployProgressBar`] plugs into the deployment driver as a
//! [`ProgressSink`]: the bar tracks the run's weighted fraction and the
//! message shows the item that last changed state.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use std::time::Duration;

use crate::constants::NO_PROGRESS_ENV;
use crate::deploy::{DeployEvent, ItemState, ProgressSink};

/// Resolution of the deployment bar; progress fractions are scaled to this.
const BAR_SCALE: u64 = 1000;

/// Whether progress bars are disabled through the environment.
pub fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

/// Spinner for work of unknown size, such as capture.
#[derive(Clone)]
pub struct Spinner {
    inner: IndicatifBar,
}

impl Spinner {
    /// Start a spinner; a hidden one never draws.
    pub fn new(message: impl Into<String>, visible: bool) -> Self {
        let inner = if visible {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            IndicatifBar::hidden()
        };
        inner.set_message(message.into());
        Self {
            inner,
        }
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

/// Deployment progress bar.
#[derive(Clone)]
pub struct DeployProgressBar {
    inner: IndicatifBar,
}

impl DeployProgressBar {
    /// Create a bar; a hidden one still tracks its position.
    pub fn new(visible: bool) -> Self {
        let inner = if visible {
            let bar = IndicatifBar::new(BAR_SCALE);
            bar.set_style(bar_style());
            bar.set_prefix("Deploying");
            bar
        } else {
            IndicatifBar::hidden()
        };
        Self {
            inner,
        }
    }

    /// Current position on the `0..=1000` scale.
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

impl ProgressSink for DeployProgressBar {
    fn on_event(&self, event: &DeployEvent) {
        let position = (event.progress.clamp(0.0, 1.0) * BAR_SCALE as f64).round() as u64;
        // Events from parallel items can arrive slightly out of order
        if position > self.inner.position() {
            self.inner.set_position(position);
        }

        let message = match (&event.status, &event.message) {
            (ItemState::Failed, Some(reason)) => format!("{} failed: {reason}", event.item_id),
            (status, _) => format!("{} {}", event.item_id, status.label()),
        };
        if event.status == ItemState::Failed {
            self.inner.suspend(|| tracing::warn!("{}", message));
        }
        self.inner.set_message(message);
    }
}
