//! Interactive session, the default for bare `toonify` on a terminal.
//!
//! A menu loop over one [`Session`]. The menu only offers actions the
//! session can take right now: no cartoonize before the background is
//! removed, no retry without a failure, no downloads without a result.

pub mod theme;

use console::Style;
use dialoguer::{Input, Select};
use std::path::PathBuf;
use std::sync::Arc;
use toonify_core::{
    ArtifactKind, Config, PipelinePhase, Session, SourceFile, Stage, StageOutcome, Toonify,
};

use super::notify::ConsoleObserver;
use super::progress::{spinner, MeterBar};

/// Convert a dialoguer result into `Ok(Some(value))` on success, `Ok(None)` on
/// interrupt (Ctrl+C / terminal disconnect), and `Err` for other I/O failures.
fn handle_interrupt<T>(result: dialoguer::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Something the user can pick from the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Upload,
    RemoveBackground,
    Cartoonize,
    Retry(Stage),
    Download(ArtifactKind),
    Reset,
    ShowConfig,
    Exit,
}

impl Action {
    fn label(self) -> String {
        match self {
            Action::Upload => "Upload image".to_string(),
            Action::RemoveBackground => "Remove background".to_string(),
            Action::Cartoonize => "Cartoonize".to_string(),
            Action::Retry(stage) => format!("Retry {stage}"),
            Action::Download(ArtifactKind::BackgroundRemoved) => {
                "Download background-removed image".to_string()
            }
            Action::Download(ArtifactKind::Stylized) => "Download cartoon".to_string(),
            Action::Reset => "Reset".to_string(),
            Action::ShowConfig => "Configuration".to_string(),
            Action::Exit => "Exit".to_string(),
        }
    }
}

/// Actions available in the session's current state.
fn available_actions(session: &Session) -> Vec<Action> {
    let mut actions = vec![Action::Upload];

    if !session.is_running() {
        if session.image().is_some() {
            actions.push(Action::RemoveBackground);
        }
        if session.background_removed().is_some() {
            actions.push(Action::Cartoonize);
        }
        if let Some(stage) = session.last_failed_stage() {
            actions.push(Action::Retry(stage));
        }
    }
    if session.background_removed().is_some() {
        actions.push(Action::Download(ArtifactKind::BackgroundRemoved));
    }
    if session.stylized().is_some() {
        actions.push(Action::Download(ArtifactKind::Stylized));
    }
    if session.source().is_some() {
        actions.push(Action::Reset);
    }

    actions.push(Action::ShowConfig);
    actions.push(Action::Exit);
    actions
}

/// Entry point for interactive mode.
pub async fn run(config: Config) -> anyhow::Result<()> {
    theme::print_banner();

    let theme = theme::toonify_theme();
    let toonify = Toonify::new(config.clone()).with_observer(Arc::new(ConsoleObserver::new()));
    let mut session = Session::new();

    loop {
        print_status(&session);

        let actions = available_actions(&session);
        let labels: Vec<String> = actions.iter().map(|a| a.label()).collect();
        let default = preferred(&actions, &session);

        let selection = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(default)
            .interact_opt()?;

        let Some(action) = selection.map(|i| actions[i]) else {
            break; // Esc / Ctrl+C
        };

        match action {
            Action::Upload => upload(&toonify, &mut session, &theme).await?,
            Action::RemoveBackground => remove_background(&toonify, &mut session).await,
            Action::Cartoonize => cartoonize(&toonify, &mut session).await,
            Action::Retry(stage) => retry(&toonify, &mut session, stage).await,
            Action::Download(kind) => {
                if let Ok(Some(path)) = toonify.export(&session, kind).await {
                    tracing::debug!("Saved {}", path.display());
                }
            }
            Action::Reset => toonify.reset(&mut session),
            Action::ShowConfig => show_config(&config),
            Action::Exit => break,
        }
    }

    Ok(())
}

/// Index of the next natural step in `actions`.
fn preferred(actions: &[Action], session: &Session) -> usize {
    let next = match session.phase() {
        PipelinePhase::Ready => Action::RemoveBackground,
        PipelinePhase::BackgroundReady => Action::Cartoonize,
        PipelinePhase::BackgroundFailed => Action::Retry(Stage::BackgroundRemoval),
        PipelinePhase::StylizationFailed => Action::Retry(Stage::Stylization),
        PipelinePhase::Stylized => Action::Download(ArtifactKind::Stylized),
        _ => Action::Upload,
    };
    actions.iter().position(|a| *a == next).unwrap_or(0)
}

fn print_status(session: &Session) {
    let dim = Style::new().for_stderr().dim();
    let label = Style::new().for_stderr().bold();

    eprintln!();
    match session.image() {
        Some(image) => {
            let size = image
                .dimensions
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unknown size".to_string());
            eprintln!(
                "  {} {} {}",
                label.apply_to("Image:"),
                image.name,
                dim.apply_to(format!("({size})"))
            );
        }
        None => eprintln!("  {}", dim.apply_to("No image selected")),
    }
    eprintln!(
        "  {} {}",
        label.apply_to("Status:"),
        dim.apply_to(phase_label(session.phase()))
    );
    eprintln!();
}

fn phase_label(phase: PipelinePhase) -> &'static str {
    match phase {
        PipelinePhase::Idle => "waiting for an image",
        PipelinePhase::Ready => "ready",
        PipelinePhase::RemovingBackground => "removing background",
        PipelinePhase::BackgroundReady => "background removed",
        PipelinePhase::BackgroundFailed => "background removal failed",
        PipelinePhase::Stylizing => "cartoonizing",
        PipelinePhase::Stylized => "cartoon ready",
        PipelinePhase::StylizationFailed => "cartoonization failed",
    }
}

async fn upload(
    toonify: &Toonify,
    session: &mut Session,
    theme: &dialoguer::theme::ColorfulTheme,
) -> anyhow::Result<()> {
    let Some(raw_path) = handle_interrupt(
        Input::<String>::with_theme(theme)
            .with_prompt("Path to image")
            .interact_text(),
    )?
    else {
        return Ok(());
    };

    let path = PathBuf::from(shellexpand::tilde(raw_path.trim()).into_owned());
    let file = match SourceFile::read(&path) {
        Ok(file) => file,
        Err(e) => {
            let warn = Style::new().for_stderr().yellow();
            eprintln!(
                "  {}",
                warn.apply_to(format!("Cannot read {}: {e}", path.display()))
            );
            return Ok(());
        }
    };

    // Rejections are reported by the observer
    let converting = spinner("reading image");
    let _ = toonify.select(session, Some(file)).await;
    converting.finish_and_clear();
    Ok(())
}

async fn remove_background(toonify: &Toonify, session: &mut Session) {
    let bar = MeterBar::follow(session.progress(), "removing background");
    let outcome = toonify.remove_background(session).await;
    bar.finish();
    log_outcome(&outcome);
}

async fn cartoonize(toonify: &Toonify, session: &mut Session) {
    let spinner = spinner("cartoonizing");
    let outcome = toonify.stylize(session).await;
    spinner.finish_and_clear();
    log_outcome(&outcome);
}

async fn retry(toonify: &Toonify, session: &mut Session, stage: Stage) {
    let outcome = match stage {
        Stage::BackgroundRemoval => {
            let bar = MeterBar::follow(session.progress(), "retrying background removal");
            let outcome = toonify.retry(session).await;
            bar.finish();
            outcome
        }
        Stage::Stylization => {
            let spinner = spinner("retrying cartoonization");
            let outcome = toonify.retry(session).await;
            spinner.finish_and_clear();
            outcome
        }
    };
    log_outcome(&outcome);
}

fn log_outcome(outcome: &StageOutcome) {
    if matches!(outcome, StageOutcome::Skipped | StageOutcome::Discarded) {
        tracing::debug!("Stage outcome: {:?}", outcome);
    }
}

/// Summary of the settings that shape a session.
fn show_config(config: &Config) {
    let dim = Style::new().for_stderr().dim();
    let cyan = Style::new().for_stderr().cyan();
    let label = Style::new().for_stderr().bold();

    let config_path = Config::default_path();
    let path_note = if config_path.exists() {
        "(exists)"
    } else {
        "(using defaults)"
    };

    eprintln!();
    eprintln!("  {}", cyan.apply_to("Current configuration:"));
    eprintln!();
    eprintln!(
        "    {:<20} {} {}",
        label.apply_to("Config file:"),
        config_path.display(),
        dim.apply_to(path_note)
    );
    eprintln!(
        "    {:<20} {} MB",
        label.apply_to("Max file size:"),
        config.limits.max_file_size_mb
    );
    eprintln!(
        "    {:<20} {} {}",
        label.apply_to("Segmenter:"),
        config.segmentation.command,
        config.segmentation.args.join(" ")
    );
    eprintln!(
        "    {:<20} {}",
        label.apply_to("Cartoon endpoint:"),
        config.stylization.endpoint
    );
    eprintln!(
        "    {:<20} {}",
        label.apply_to("Output dir:"),
        config.output_dir().display()
    );
    eprintln!(
        "    {:<20} {}",
        label.apply_to("Log level:"),
        config.logging.level
    );
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_session_offers_upload_only() {
        let session = Session::new();
        assert_eq!(
            available_actions(&session),
            vec![Action::Upload, Action::ShowConfig, Action::Exit]
        );
    }

    #[test]
    fn test_default_points_at_upload_when_idle() {
        let session = Session::new();
        let actions = available_actions(&session);
        assert_eq!(actions[preferred(&actions, &session)], Action::Upload);
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            Action::Retry(Stage::Stylization).label(),
            "Retry cartoonization"
        );
        assert_eq!(
            Action::Download(ArtifactKind::Stylized).label(),
            "Download cartoon"
        );
    }
}
