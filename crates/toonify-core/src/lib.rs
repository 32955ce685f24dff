//! Toonify Core - image-to-cartoon pipeline library.
//!
//! Toonify takes one user-selected image through two stages: local
//! background removal, then remote cartoonization. Results can be exported
//! as PNG files.
//!
//! # Architecture
//!
//! ```text
//! SourceFile → Intake (HEIC→JPEG, size check) → Remove background → Cartoonize → Export
//! ```
//!
//! All state for one user lives in a [`Session`]; [`Toonify`] drives it.
//! Stage runs are split into `begin_*`, [`Toonify::execute`] and
//! [`Toonify::commit`] so that a result arriving after a reset or a new
//! selection is discarded instead of overwriting newer state.
//!
//! # Usage
//!
//! ```rust,ignore
//! use toonify_core::{Config, Session, SourceFile, Toonify};
//!
//! #[tokio::main]
//! async fn main() -> toonify_core::Result<()> {
//!     let toonify = Toonify::new(Config::load()?);
//!     let mut session = Session::new();
//!
//!     let file = SourceFile::read("./portrait.heic".as_ref())?;
//!     if toonify.select(&mut session, Some(file)).await.is_ok() {
//!         toonify.remove_background(&mut session).await;
//!         toonify.stylize(&mut session).await;
//!     }
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod notice;
pub mod pipeline;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, PipelineError, Result, ToonifyError};
pub use notice::{NoopObserver, Notice, PipelineObserver};
pub use pipeline::{ContainerDecoder, ProgressMeter, Segmenter, Stylizer};
pub use session::{Session, StageOutcome, StageTicket};
pub use types::{
    ArtifactKind, ArtifactLocation, Dimensions, NormalizedImage, PipelinePhase, PipelineResult,
    PipelineStatus, SourceFile, Stage,
};

use std::path::PathBuf;
use std::sync::Arc;

use pipeline::{
    BackgroundRemover, Cartoonizer, CommandSegmenter, Exporter, HttpStylizer, IntakeNormalizer,
    ProgressEstimator,
};
use session::StageInput;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Toonify pipeline - the main entry point.
///
/// Holds the configured stages and collaborators. It keeps no per-user
/// state; pass a [`Session`] to every operation.
pub struct Toonify {
    config: Config,
    client: reqwest::Client,
    normalizer: IntakeNormalizer,
    remover: BackgroundRemover,
    cartoonizer: Cartoonizer,
    exporter: Exporter,
    estimator: ProgressEstimator,
    observer: Arc<dyn PipelineObserver>,
}

impl Toonify {
    /// Create a pipeline with the default collaborators: the configured
    /// decoder and segmenter commands, and the HTTP cartoonize endpoint.
    pub fn new(config: Config) -> Self {
        tracing::debug!("Initializing Toonify v{}", VERSION);
        let client = reqwest::Client::new();
        Self {
            normalizer: IntakeNormalizer::new(&config),
            remover: BackgroundRemover::new(
                Arc::new(CommandSegmenter::new(&config.segmentation)),
                &config.segmentation,
            ),
            cartoonizer: Cartoonizer::new(
                Arc::new(HttpStylizer::with_client(
                    client.clone(),
                    &config.stylization,
                )),
                client.clone(),
            ),
            exporter: Exporter::new(config.output_dir(), client.clone()),
            estimator: ProgressEstimator::new(config.progress.clone()),
            observer: Arc::new(NoopObserver),
            client,
            config,
        }
    }

    /// Create a pipeline from the config file (or defaults).
    pub fn with_defaults() -> Result<Self> {
        let config = Config::load()?;
        Ok(Self::new(config))
    }

    /// Replace the HEIC/HEIF decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn ContainerDecoder>) -> Self {
        self.normalizer = IntakeNormalizer::with_decoder(&self.config, decoder);
        self
    }

    /// Replace the background segmenter.
    pub fn with_segmenter(mut self, segmenter: Arc<dyn Segmenter>) -> Self {
        self.remover = BackgroundRemover::new(segmenter, &self.config.segmentation);
        self
    }

    /// Replace the cartoonization service.
    pub fn with_stylizer(mut self, stylizer: Arc<dyn Stylizer>) -> Self {
        self.cartoonizer = Cartoonizer::new(stylizer, self.client.clone());
        self
    }

    /// Send notices to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Export into `dir` instead of the configured directory.
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.exporter = Exporter::new(dir, self.client.clone());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_dir(&self) -> &std::path::Path {
        self.exporter.output_dir()
    }

    fn notify(&self, notice: Notice) {
        self.observer.on_notice(&notice);
    }

    /// Take a new file selection.
    ///
    /// Returns `Ok(true)` if the file was accepted, `Ok(false)` for an empty
    /// selection. A rejected file leaves the session untouched.
    pub async fn select(
        &self,
        session: &mut Session,
        file: Option<SourceFile>,
    ) -> std::result::Result<bool, PipelineError> {
        let Some(file) = file else {
            return Ok(false);
        };

        match self.normalizer.normalize(Some(file.clone())).await {
            Ok(Some(image)) => {
                tracing::info!(
                    "Accepted {} as {} ({} bytes)",
                    file.name,
                    image.name,
                    image.size()
                );
                self.notify(Notice::Uploaded {
                    name: image.name.clone(),
                    dimensions: image.dimensions,
                });
                session.accept(file, image);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(error) => {
                tracing::warn!("Rejected {}: {}", file.name, error);
                self.notify(Notice::Failed {
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Enter background removal on the current image.
    ///
    /// Returns `None` when there is no image or a stage is already running.
    pub fn begin_background_removal(&self, session: &mut Session) -> Option<StageTicket> {
        let Some(image) = session.image().cloned() else {
            tracing::debug!("Background removal skipped: no image selected");
            return None;
        };
        self.begin(session, Stage::BackgroundRemoval, StageInput::Image(image))
    }

    /// Enter cartoonization on the background-removed image.
    ///
    /// Returns `None` when there is no background-removed result or a stage
    /// is already running.
    pub fn begin_stylization(&self, session: &mut Session) -> Option<StageTicket> {
        let Some(cutout) = session.background_removed().cloned() else {
            tracing::debug!("Cartoonization skipped: no background-removed image");
            return None;
        };
        self.begin(session, Stage::Stylization, StageInput::Cutout(cutout))
    }

    fn begin(&self, session: &mut Session, stage: Stage, input: StageInput) -> Option<StageTicket> {
        let Some(run) = session.enter(stage) else {
            tracing::debug!("{} skipped: another stage is running", stage);
            return None;
        };
        tracing::debug!("Starting {} (generation {})", stage, session.generation());
        Some(StageTicket {
            stage,
            generation: session.generation(),
            run,
            input,
            progress: session.progress().clone(),
        })
    }

    /// Run the stage a ticket was issued for. Touches no session state
    /// except the progress meter.
    pub async fn execute(
        &self,
        ticket: &StageTicket,
    ) -> std::result::Result<PipelineResult, PipelineError> {
        match &ticket.input {
            StageInput::Image(image) => {
                let progress = self.estimator.start(&ticket.progress);
                let result = self.remover.run(image).await;
                progress.finish();
                result
            }
            StageInput::Cutout(cutout) => self.cartoonizer.run(cutout).await,
        }
    }

    /// Apply a stage outcome to the session.
    ///
    /// If the session was reset or given a new file since the ticket was
    /// issued, the outcome is dropped and [`StageOutcome::Discarded`] is
    /// returned.
    pub fn commit(
        &self,
        session: &mut Session,
        ticket: StageTicket,
        outcome: std::result::Result<PipelineResult, PipelineError>,
    ) -> StageOutcome {
        session.leave(ticket.run);

        if ticket.generation != session.generation() {
            tracing::warn!(
                "Discarding late {} result (generation {} superseded by {})",
                ticket.stage,
                ticket.generation,
                session.generation()
            );
            return StageOutcome::Discarded;
        }

        match outcome {
            Ok(result) => {
                let notice = match ticket.stage {
                    Stage::BackgroundRemoval => Notice::BackgroundRemoved {
                        dimensions: result.dimensions,
                    },
                    Stage::Stylization => Notice::Stylized {
                        url: result.url().unwrap_or_default().to_string(),
                    },
                };
                tracing::info!("{} complete", ticket.stage);
                session.store(ticket.stage, result);
                self.notify(notice);
                StageOutcome::Committed
            }
            Err(error) => {
                tracing::warn!("{} failed: {}", ticket.stage, error);
                session.fail(ticket.stage);
                self.notify(Notice::Failed {
                    error: error.clone(),
                });
                StageOutcome::Failed(error)
            }
        }
    }

    /// Remove the background from the current image.
    pub async fn remove_background(&self, session: &mut Session) -> StageOutcome {
        let Some(ticket) = self.begin_background_removal(session) else {
            return StageOutcome::Skipped;
        };
        let outcome = self.execute(&ticket).await;
        self.commit(session, ticket, outcome)
    }

    /// Cartoonize the background-removed image.
    pub async fn stylize(&self, session: &mut Session) -> StageOutcome {
        let Some(ticket) = self.begin_stylization(session) else {
            return StageOutcome::Skipped;
        };
        let outcome = self.execute(&ticket).await;
        self.commit(session, ticket, outcome)
    }

    /// Re-run the stage that last failed.
    pub async fn retry(&self, session: &mut Session) -> StageOutcome {
        match session.last_failed_stage() {
            Some(Stage::BackgroundRemoval) => self.remove_background(session).await,
            Some(Stage::Stylization) => self.stylize(session).await,
            None => StageOutcome::Skipped,
        }
    }

    /// Return the session to `Idle`. In-flight stages keep running but
    /// their results will be discarded.
    pub fn reset(&self, session: &mut Session) {
        session.clear();
        tracing::debug!("Session reset (generation {})", session.generation());
        self.notify(Notice::ResetComplete);
    }

    /// Save an artifact to the output directory.
    ///
    /// Returns `Ok(None)` if the session has no result of that kind. A
    /// failed export changes no session state.
    pub async fn export(
        &self,
        session: &Session,
        kind: ArtifactKind,
    ) -> std::result::Result<Option<PathBuf>, PipelineError> {
        match self.exporter.export(session.result(kind), kind).await {
            Ok(Some(path)) => {
                self.notify(Notice::Exported {
                    kind,
                    path: path.clone(),
                });
                Ok(Some(path))
            }
            Ok(None) => Ok(None),
            Err(error) => {
                tracing::warn!("{}", error);
                self.notify(Notice::Failed {
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }
}
