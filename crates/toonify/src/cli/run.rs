//! The `toonify run` command: one image, start to finish.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use toonify_core::{ArtifactKind, Config, Session, SourceFile, StageOutcome, Toonify};

use super::notify::ConsoleObserver;
use super::progress::{spinner, MeterBar};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image to process (HEIC/HEIF is converted to JPEG first)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Also cartoonize the background-removed image
    #[arg(short, long)]
    pub cartoon: bool,

    /// Directory to save results in (defaults to `[export] output_dir`)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Base URL of the cartoonization service
    #[arg(long, env = "TOONIFY_ENDPOINT")]
    pub endpoint: Option<String>,
}

pub async fn execute(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(endpoint) = args.endpoint {
        config.stylization.endpoint = endpoint;
    }

    if !args.input.exists() {
        anyhow::bail!("Input not found: {}", args.input.display());
    }

    let mut toonify =
        Toonify::new(config).with_observer(Arc::new(ConsoleObserver::successes_only()));
    if let Some(dir) = args.output_dir {
        let dir = PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).into_owned());
        toonify = toonify.with_output_dir(dir);
    }

    let file = SourceFile::read(&args.input)?;
    let mut session = Session::new();
    toonify.select(&mut session, Some(file)).await?;

    let bar = MeterBar::follow(session.progress(), "removing background");
    let outcome = toonify.remove_background(&mut session).await;
    bar.finish();
    finish_stage(outcome)?;
    save(&toonify, &session, ArtifactKind::BackgroundRemoved).await?;

    if args.cartoon {
        let spinner = spinner("cartoonizing");
        let outcome = toonify.stylize(&mut session).await;
        spinner.finish_and_clear();
        finish_stage(outcome)?;
        save(&toonify, &session, ArtifactKind::Stylized).await?;
    }

    Ok(())
}

fn finish_stage(outcome: StageOutcome) -> anyhow::Result<()> {
    match outcome {
        StageOutcome::Committed => Ok(()),
        StageOutcome::Failed(e) => Err(e.into()),
        other => anyhow::bail!("Stage did not complete: {other:?}"),
    }
}

/// Save an artifact and print its path on stdout.
async fn save(toonify: &Toonify, session: &Session, kind: ArtifactKind) -> anyhow::Result<()> {
    if let Some(path) = toonify.export(session, kind).await? {
        println!("{}", path.display());
    }
    Ok(())
}
