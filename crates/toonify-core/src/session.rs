//! Per-user pipeline session.
//!
//! A [`Session`] owns everything one user has in flight: the selected file,
//! its normalized form, both stage results, the running flag, the stage a
//! retry would re-enter, and the progress meter. The orchestrator
//! ([`crate::Toonify`]) is the only writer.
//!
//! Every accepted selection and every reset bumps the session's
//! *generation*. Stage runs remember the generation they started in and
//! their result is only applied if it is still current.

use crate::error::PipelineError;
use crate::pipeline::ProgressMeter;
use crate::types::{
    ArtifactKind, NormalizedImage, PipelinePhase, PipelineResult, PipelineStatus, SourceFile,
    Stage,
};

/// How a stage invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The result was stored in the session
    Committed,
    /// The stage failed; `last_failed_stage` now names it
    Failed(PipelineError),
    /// The session moved on (reset or new selection) while the stage ran
    Discarded,
    /// Nothing ran: another stage was in flight or the input was missing
    Skipped,
}

impl StageOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, StageOutcome::Committed)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RunningStage {
    pub stage: Stage,
    pub run: u64,
}

/// Input snapshot taken when a stage begins.
pub(crate) enum StageInput {
    Image(NormalizedImage),
    Cutout(PipelineResult),
}

/// Proof that a stage was entered, carried from `begin_*` to `commit`.
pub struct StageTicket {
    pub(crate) stage: Stage,
    pub(crate) generation: u64,
    pub(crate) run: u64,
    pub(crate) input: StageInput,
    pub(crate) progress: ProgressMeter,
}

impl StageTicket {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Session generation the stage started in.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// State of one user's pipeline.
#[derive(Default)]
pub struct Session {
    source: Option<SourceFile>,
    image: Option<NormalizedImage>,
    background_removed: Option<PipelineResult>,
    stylized: Option<PipelineResult>,
    running: Option<RunningStage>,
    last_failed_stage: Option<Stage>,
    progress: ProgressMeter,
    generation: u64,
    runs: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    pub fn image(&self) -> Option<&NormalizedImage> {
        self.image.as_ref()
    }

    pub fn background_removed(&self) -> Option<&PipelineResult> {
        self.background_removed.as_ref()
    }

    pub fn stylized(&self) -> Option<&PipelineResult> {
        self.stylized.as_ref()
    }

    /// The stored result for an artifact kind.
    pub fn result(&self, kind: ArtifactKind) -> Option<&PipelineResult> {
        match kind {
            ArtifactKind::BackgroundRemoved => self.background_removed(),
            ArtifactKind::Stylized => self.stylized(),
        }
    }

    pub fn progress(&self) -> &ProgressMeter {
        &self.progress
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn last_failed_stage(&self) -> Option<Stage> {
        self.last_failed_stage
    }

    /// Snapshot for the UI.
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            running: self.is_running(),
            last_failed_stage: self.last_failed_stage,
            progress_percent: self.progress.get(),
        }
    }

    /// Where the session sits in the state machine.
    pub fn phase(&self) -> PipelinePhase {
        if let Some(running) = self.running {
            return match running.stage {
                Stage::BackgroundRemoval => PipelinePhase::RemovingBackground,
                Stage::Stylization => PipelinePhase::Stylizing,
            };
        }
        if self.image.is_none() {
            return PipelinePhase::Idle;
        }
        match self.last_failed_stage {
            Some(Stage::BackgroundRemoval) => PipelinePhase::BackgroundFailed,
            Some(Stage::Stylization) => PipelinePhase::StylizationFailed,
            None if self.stylized.is_some() => PipelinePhase::Stylized,
            None if self.background_removed.is_some() => PipelinePhase::BackgroundReady,
            None => PipelinePhase::Ready,
        }
    }

    /// Replace the current file. Results derived from the old one go with it.
    pub(crate) fn accept(&mut self, source: SourceFile, image: NormalizedImage) {
        self.source = Some(source);
        self.image = Some(image);
        self.background_removed = None;
        self.stylized = None;
        self.last_failed_stage = None;
        self.generation += 1;
    }

    /// Mark `stage` as running and return its run id, or `None` if a stage
    /// is already in flight.
    pub(crate) fn enter(&mut self, stage: Stage) -> Option<u64> {
        if self.running.is_some() {
            return None;
        }
        self.runs += 1;
        self.running = Some(RunningStage {
            stage,
            run: self.runs,
        });
        self.last_failed_stage = None;
        Some(self.runs)
    }

    /// Clear the running flag if `run` still owns it.
    pub(crate) fn leave(&mut self, run: u64) {
        if self.running.is_some_and(|r| r.run == run) {
            self.running = None;
        }
    }

    pub(crate) fn store(&mut self, stage: Stage, result: PipelineResult) {
        match stage {
            Stage::BackgroundRemoval => {
                // The old cartoon was made from the cutout being replaced
                self.background_removed = Some(result);
                self.stylized = None;
            }
            Stage::Stylization => self.stylized = Some(result),
        }
    }

    pub(crate) fn fail(&mut self, stage: Stage) {
        self.last_failed_stage = Some(stage);
    }

    /// Back to `Idle`, whatever is in flight.
    pub(crate) fn clear(&mut self) {
        self.source = None;
        self.image = None;
        self.background_removed = None;
        self.stylized = None;
        self.running = None;
        self.last_failed_stage = None;
        self.progress.reset();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactLocation;

    fn image() -> NormalizedImage {
        NormalizedImage {
            name: "cat.png".to_string(),
            media_type: "image/png".to_string(),
            bytes: vec![1u8, 2, 3].into(),
            dimensions: None,
            content_hash: "abc".to_string(),
        }
    }

    fn source() -> SourceFile {
        SourceFile::new("cat.png", "image/png", vec![1, 2, 3])
    }

    fn cutout() -> PipelineResult {
        PipelineResult {
            kind: ArtifactKind::BackgroundRemoved,
            payload: Some(vec![9u8].into()),
            location: ArtifactLocation::InMemory,
            dimensions: None,
        }
    }

    fn cartoon() -> PipelineResult {
        PipelineResult {
            kind: ArtifactKind::Stylized,
            payload: None,
            location: ArtifactLocation::Remote("https://x/y.png".to_string()),
            dimensions: None,
        }
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new();
        assert_eq!(session.phase(), PipelinePhase::Idle);
        assert_eq!(session.status(), PipelineStatus::default());
        assert_eq!(session.generation(), 0);
    }

    #[test]
    fn test_phase_follows_stage_lifecycle() {
        let mut session = Session::new();
        session.accept(source(), image());
        assert_eq!(session.phase(), PipelinePhase::Ready);

        let run = session.enter(Stage::BackgroundRemoval).unwrap();
        assert_eq!(session.phase(), PipelinePhase::RemovingBackground);
        assert!(session.status().running);

        session.leave(run);
        session.store(Stage::BackgroundRemoval, cutout());
        assert_eq!(session.phase(), PipelinePhase::BackgroundReady);

        let run = session.enter(Stage::Stylization).unwrap();
        assert_eq!(session.phase(), PipelinePhase::Stylizing);
        session.leave(run);
        session.fail(Stage::Stylization);
        assert_eq!(session.phase(), PipelinePhase::StylizationFailed);
        assert!(session.background_removed().is_some());

        let run = session.enter(Stage::Stylization).unwrap();
        assert_eq!(session.last_failed_stage(), None);
        session.leave(run);
        session.store(Stage::Stylization, cartoon());
        assert_eq!(session.phase(), PipelinePhase::Stylized);
    }

    #[test]
    fn test_enter_is_mutually_exclusive() {
        let mut session = Session::new();
        session.accept(source(), image());
        let run = session.enter(Stage::BackgroundRemoval).unwrap();
        assert!(session.enter(Stage::Stylization).is_none());
        assert!(session.enter(Stage::BackgroundRemoval).is_none());
        session.leave(run);
        assert!(session.enter(Stage::BackgroundRemoval).is_some());
    }

    #[test]
    fn test_leave_ignores_other_runs() {
        let mut session = Session::new();
        session.accept(source(), image());
        let old = session.enter(Stage::BackgroundRemoval).unwrap();
        session.clear();
        session.accept(source(), image());
        let new = session.enter(Stage::BackgroundRemoval).unwrap();

        session.leave(old);
        assert!(session.is_running());
        session.leave(new);
        assert!(!session.is_running());
    }

    #[test]
    fn test_new_cutout_drops_cartoon() {
        let mut session = Session::new();
        session.accept(source(), image());
        session.store(Stage::BackgroundRemoval, cutout());
        session.store(Stage::Stylization, cartoon());
        session.store(Stage::BackgroundRemoval, cutout());
        assert!(session.stylized().is_none());
        assert!(session.result(ArtifactKind::BackgroundRemoved).is_some());
    }

    #[test]
    fn test_accept_replaces_results_and_bumps_generation() {
        let mut session = Session::new();
        session.accept(source(), image());
        session.store(Stage::BackgroundRemoval, cutout());
        session.fail(Stage::Stylization);
        let before = session.generation();

        session.accept(source(), image());
        assert!(session.background_removed().is_none());
        assert!(session.stylized().is_none());
        assert_eq!(session.last_failed_stage(), None);
        assert_eq!(session.generation(), before + 1);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut session = Session::new();
        session.accept(source(), image());
        session.store(Stage::BackgroundRemoval, cutout());
        session.store(Stage::Stylization, cartoon());
        session.fail(Stage::Stylization);
        assert_eq!(session.phase(), PipelinePhase::StylizationFailed);
        let before = session.generation();

        session.clear();
        assert_eq!(session.phase(), PipelinePhase::Idle);
        assert!(session.source().is_none());
        assert!(session.image().is_none());
        assert!(session.background_removed().is_none());
        assert!(session.stylized().is_none());
        assert_eq!(session.last_failed_stage(), None);
        assert_eq!(session.status(), PipelineStatus::default());
        assert_eq!(session.generation(), before + 1);
    }

    #[test]
    fn test_clear_stops_running_stage() {
        let mut session = Session::new();
        session.accept(source(), image());
        session.enter(Stage::BackgroundRemoval).unwrap();

        session.clear();
        assert!(!session.is_running());
        assert!(session.enter(Stage::BackgroundRemoval).is_some());
    }
}
