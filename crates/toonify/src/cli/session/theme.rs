//! Look of the interactive session.

use console::{style, Style};
use dialoguer::theme::ColorfulTheme;

const TAGLINE: &str = "cut out the background, keep the cartoon";

/// Menu theme: magenta accents on top of dialoguer's defaults.
pub fn toonify_theme() -> ColorfulTheme {
    let accent = Style::new().for_stderr().magenta();
    ColorfulTheme {
        prompt_prefix: accent.apply_to("◆".to_string()),
        active_item_prefix: accent.apply_to("→".to_string()),
        active_item_style: accent.clone().bold(),
        ..ColorfulTheme::default()
    }
}

/// Two-line header shown once when the session starts.
pub fn print_banner() {
    eprintln!();
    eprintln!(
        "  {} {}",
        style("toonify").for_stderr().magenta().bold(),
        style(format!("v{}", toonify_core::VERSION)).for_stderr().dim()
    );
    eprintln!("  {}", style(TAGLINE).for_stderr().dim());
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_markers() {
        let theme = toonify_theme();
        assert!(theme.prompt_prefix.to_string().contains('◆'));
        assert!(theme.active_item_prefix.to_string().contains('→'));
    }
}
