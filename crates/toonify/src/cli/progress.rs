//! Terminal progress for pipeline stages.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::task::JoinHandle;
use toonify_core::ProgressMeter;

/// A progress bar that follows a session's [`ProgressMeter`].
pub struct MeterBar {
    bar: ProgressBar,
    follower: JoinHandle<()>,
}

impl MeterBar {
    /// Show a bar labelled `message` until [`MeterBar::finish`].
    pub fn follow(meter: &ProgressMeter, message: &'static str) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));

        let mut rx = meter.subscribe();
        let follower_bar = bar.clone();
        let follower = tokio::spawn(async move {
            follower_bar.set_position(u64::from(*rx.borrow_and_update()));
            while rx.changed().await.is_ok() {
                let percent = *rx.borrow_and_update();
                // The meter decays to 0 after completing; keep the bar full
                if percent > 0 {
                    follower_bar.set_position(u64::from(percent));
                }
            }
        });

        Self { bar, follower }
    }

    pub fn finish(self) {
        self.follower.abort();
        self.bar.finish_and_clear();
    }
}

/// A spinner for stages without progress estimates.
pub fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
