//! Prints pipeline notices to stderr.

use console::Style;
use toonify_core::{Notice, PipelineObserver};

/// Observer that renders each [`Notice`] as a one-line status message.
pub struct ConsoleObserver {
    show_failures: bool,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self {
            show_failures: true,
        }
    }

    /// Don't print failures; the caller reports them itself.
    pub fn successes_only() -> Self {
        Self {
            show_failures: false,
        }
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineObserver for ConsoleObserver {
    fn on_notice(&self, notice: &Notice) {
        if notice.is_failure() {
            if self.show_failures {
                let red = Style::new().for_stderr().red();
                eprintln!("  {} {notice}", red.apply_to("✗"));
            }
            return;
        }

        let green = Style::new().for_stderr().green();
        let dim = Style::new().for_stderr().dim();
        let detail = match notice {
            Notice::Uploaded {
                dimensions: Some(d),
                ..
            }
            | Notice::BackgroundRemoved { dimensions: Some(d) } => format!(" ({d})"),
            Notice::Stylized { url } => format!(" ({url})"),
            _ => String::new(),
        };
        eprintln!(
            "  {} {notice}{}",
            green.apply_to("✓"),
            dim.apply_to(detail)
        );
    }
}
