//! Edition generation
//!
//! One edition runs through a fixed sequence of phases:
//!
//! ```text
//! Idle -> Sampling -> Verifying -> Compositing -> Persisting -> Registering -> Idle
//!            ^            |
//!            +------------+  (missing file or duplicate key, within the attempt budget)
//! ```
//!
//! Running out of attempts, or any error along the way, ends in `Failed`.
//! A failed edition never advances the edition counter or touches the ledger;
//! the ledger is only appended after the artifact and metadata are on disk.
//!
//! The generator is single-writer. It borrows the project state and the
//! ledger mutably for its whole lifetime.

pub mod progress;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;

use crate::composition::{CompositionError, Compositor, Rendered, Warning};
use crate::gif::render_gif;
use crate::ledger::{LedgerError, UniquenessLedger};
use crate::metadata::EditionMetadata;
use crate::models::ProjectData;
use crate::output::{save_json, save_png, OutputError};
use crate::sampler::{Combination, CombinationKey, SampleError, Sampler};

use progress::{ProgressEvent, ProgressReporter};

/// Where the generator is in the edition state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sampling,
    Verifying,
    Compositing,
    Persisting,
    Registering,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Sampling => "sampling",
            Phase::Verifying => "verifying",
            Phase::Compositing => "compositing",
            Phase::Persisting => "persisting",
            Phase::Registering => "registering",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why an edition could not be generated.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No contributor has any layer
    #[error("No contributors with layers; add at least one layer before generating")]
    NoLayers,
    /// Every sample was a duplicate or referenced a missing file
    #[error("Could not find a unique combination with existing files after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
    #[error(transparent)]
    InvalidWeight(#[from] SampleError),
    /// Strict-mode asset failure or an unusable canvas
    #[error(transparent)]
    Composition(#[from] CompositionError),
    /// Writing the artifact or metadata failed
    #[error("Failed to write edition {edition}: {source}")]
    Persistence {
        edition: u64,
        #[source]
        source: OutputError,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Outcome of one successful edition.
#[derive(Debug, Clone, PartialEq)]
pub struct EditionReport {
    pub edition: u64,
    pub key: CombinationKey,
    pub artifact: PathBuf,
    pub metadata: PathBuf,
    pub animated: bool,
    /// Samples drawn, including the accepted one
    pub attempts: u32,
    /// Layers substituted during compositing
    pub warnings: Vec<Warning>,
}

/// Outcome of a batch.
#[derive(Debug)]
pub struct BatchResult {
    pub requested: usize,
    pub editions: Vec<EditionReport>,
    /// The failure that stopped the batch, if any
    pub error: Option<GenerationError>,
    /// Set when the cancel flag stopped the batch
    pub cancelled: bool,
}

impl BatchResult {
    pub fn generated(&self) -> usize {
        self.editions.len()
    }

    /// Every requested edition was produced.
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && !self.cancelled && self.editions.len() == self.requested
    }
}

/// Drives the edition loop for one project.
pub struct Generator<'a, S: Sampler> {
    project: &'a mut ProjectData,
    ledger: &'a mut UniquenessLedger,
    sampler: S,
    compositor: Compositor,
    output_dir: PathBuf,
    phase: Phase,
}

impl<'a, S: Sampler> Generator<'a, S> {
    pub fn new(
        project: &'a mut ProjectData,
        ledger: &'a mut UniquenessLedger,
        sampler: S,
        compositor: Compositor,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self { project, ledger, sampler, compositor, output_dir: output_dir.into(), phase: Phase::Idle }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn transition(&mut self, next: Phase) {
        tracing::debug!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
    }

    /// Generate the next edition.
    ///
    /// On success the artifact and metadata are written, the key is in the
    /// ledger and the edition counter has advanced by one. On failure none
    /// of that happened.
    #[tracing::instrument(skip(self), fields(edition = self.project.state.next_edition()))]
    pub fn generate_edition(&mut self) -> Result<EditionReport, GenerationError> {
        let edition = self.project.state.next_edition();
        match self.run_edition(edition) {
            Ok(report) => {
                self.transition(Phase::Idle);
                tracing::info!(
                    edition,
                    artifact = %report.artifact.display(),
                    attempts = report.attempts,
                    "edition generated"
                );
                Ok(report)
            }
            Err(e) => {
                self.transition(Phase::Failed);
                tracing::debug!(edition, error = %e, "edition failed");
                Err(e)
            }
        }
    }

    fn run_edition(&mut self, edition: u64) -> Result<EditionReport, GenerationError> {
        if !self.project.contributors.iter().any(|c| c.has_layers()) {
            return Err(GenerationError::NoLayers);
        }

        let (combination, key, attempts) = self.find_combination()?;

        self.transition(Phase::Compositing);
        let composite = self.compositor.compose(&combination.to_descriptors())?;
        for warning in &composite.warnings {
            tracing::warn!(edition, %warning, "layer substituted");
        }

        self.transition(Phase::Persisting);
        let (artifact, metadata) = self
            .persist(edition, &composite.output, &combination)
            .map_err(|source| GenerationError::Persistence { edition, source })?;

        self.transition(Phase::Registering);
        self.ledger.register(&key, edition)?;

        let state = &mut self.project.state;
        state.current_edition = edition;
        state.generated_count += 1;
        state.unique_combinations = self.ledger.len() as u64;
        self.project.touch();

        Ok(EditionReport {
            edition,
            key,
            artifact,
            metadata,
            animated: composite.output.is_animated(),
            attempts,
            warnings: composite.warnings,
        })
    }

    /// Sample until a combination passes verification and the uniqueness
    /// check, or the attempt budget runs out.
    fn find_combination(&mut self) -> Result<(Combination, CombinationKey, u32), GenerationError> {
        let max_attempts = self.project.settings.max_attempts.max(1);
        let ensure_uniqueness = self.project.settings.ensure_uniqueness;

        for attempt in 1..=max_attempts {
            self.transition(Phase::Sampling);
            let combination = self.sampler.sample(&self.project.contributors)?;
            if combination.is_empty() {
                return Err(GenerationError::NoLayers);
            }

            self.transition(Phase::Verifying);
            if let Some((contributor, layer)) =
                combination.iter().find(|(_, layer)| !layer.file_path.exists())
            {
                tracing::debug!(
                    attempt,
                    contributor,
                    path = %layer.file_path.display(),
                    "layer file missing, resampling"
                );
                continue;
            }

            let key = combination.key();
            if ensure_uniqueness && !self.ledger.is_unique(&key) {
                tracing::debug!(attempt, %key, "duplicate combination, resampling");
                continue;
            }

            return Ok((combination, key, attempt));
        }

        Err(GenerationError::AttemptsExhausted { attempts: max_attempts })
    }

    /// Write the artifact, then the metadata. A metadata failure removes the
    /// artifact again so no half-written edition is left behind.
    fn persist(
        &self,
        edition: u64,
        output: &Rendered,
        combination: &Combination,
    ) -> Result<(PathBuf, PathBuf), OutputError> {
        let artifact = self.output_dir.join(format!("{}.{}", edition, output.extension()));
        match output {
            Rendered::Still(image) => save_png(image, &artifact)?,
            Rendered::Animated(animation) => {
                render_gif(&animation.frames, &animation.durations_ms, &artifact)?
            }
        }

        let metadata_path = self.output_dir.join(format!("{}.json", edition));
        let metadata = EditionMetadata::build(edition, combination, &self.project.info);
        if let Err(e) = save_json(&metadata, &metadata_path) {
            let _ = fs::remove_file(&artifact);
            return Err(e);
        }

        Ok((artifact, metadata_path))
    }

    /// Generate up to `count` editions, stopping at the first failure.
    ///
    /// `cancel` is checked between editions only.
    pub fn generate_batch(
        &mut self,
        count: usize,
        reporter: &dyn ProgressReporter,
        cancel: Option<&AtomicBool>,
    ) -> BatchResult {
        self.generate_batch_with(count, reporter, cancel, |_| Ok(()))
    }

    /// Like [`generate_batch`](Self::generate_batch), calling `checkpoint`
    /// with the updated project after every edition.
    ///
    /// A checkpoint failure stops the batch. The edition it followed is
    /// already complete and stays in the result.
    pub fn generate_batch_with<F>(
        &mut self,
        count: usize,
        reporter: &dyn ProgressReporter,
        cancel: Option<&AtomicBool>,
        mut checkpoint: F,
    ) -> BatchResult
    where
        F: FnMut(&ProjectData) -> Result<(), OutputError>,
    {
        let start = Instant::now();
        let mut result = BatchResult { requested: count, editions: Vec::new(), error: None, cancelled: false };
        reporter.report(ProgressEvent::BatchStarted { requested: count });

        for _ in 0..count {
            if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                tracing::info!(generated = result.editions.len(), "batch cancelled");
                result.cancelled = true;
                break;
            }

            let edition = self.project.state.next_edition();
            let edition_start = Instant::now();
            reporter.report(ProgressEvent::EditionStarted { edition });

            match self.generate_edition() {
                Ok(report) => {
                    let saved = checkpoint(&*self.project);
                    for warning in &report.warnings {
                        reporter.report(ProgressEvent::Warning {
                            edition: Some(edition),
                            message: warning.to_string(),
                        });
                    }
                    reporter.report(ProgressEvent::EditionCompleted {
                        edition,
                        artifact: artifact_name(&report.artifact),
                        attempts: report.attempts,
                        duration_ms: edition_start.elapsed().as_millis() as u64,
                    });
                    result.editions.push(report);

                    if let Err(source) = saved {
                        let e = GenerationError::Persistence { edition, source };
                        reporter.report(ProgressEvent::Error { edition: Some(edition), message: e.to_string() });
                        result.error = Some(e);
                        break;
                    }
                }
                Err(e) => {
                    reporter.report(ProgressEvent::Error { edition: Some(edition), message: e.to_string() });
                    result.error = Some(e);
                    break;
                }
            }
        }

        reporter.report(ProgressEvent::BatchCompleted {
            success: result.is_complete(),
            generated: result.editions.len(),
            requested: count,
            cancelled: result.cancelled,
            duration_ms: start.elapsed().as_millis() as u64,
        });
        result
    }
}

fn artifact_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contributor, LayerOption, ProjectInfo};
    use crate::sampler::WeightedSampler;
    use image::{Rgba, RgbaImage};
    use progress::NullProgress;
    use tempfile::{tempdir, TempDir};

    /// Project with two contributors holding `a` and `b` layers.
    fn project(dir: &TempDir, a: usize, b: usize) -> ProjectData {
        let mut data = ProjectData::new(ProjectInfo::new("Test", 10));
        for (name, count, index) in [("ana", a, 1), ("bo", b, 2)] {
            let mut contributor = Contributor::new(name, index);
            for i in 0..count {
                let path = dir.path().join(format!("{}_{}.png", name, i));
                RgbaImage::from_pixel(4, 4, Rgba([i as u8 * 40, 0, 0, 255])).save(&path).unwrap();
                contributor.layers.push(LayerOption::new(path, index));
            }
            data.contributors.push(contributor);
        }
        data
    }

    fn compositor() -> Compositor {
        Compositor::new().with_canvas(4, 4)
    }

    #[test]
    fn test_generate_edition_writes_and_registers() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let mut data = project(&dir, 2, 2);
        let mut ledger = UniquenessLedger::in_memory();

        let mut generator =
            Generator::new(&mut data, &mut ledger, WeightedSampler::seeded(1), compositor(), &out);
        let report = generator.generate_edition().unwrap();
        assert_eq!(generator.phase(), Phase::Idle);

        assert_eq!(report.edition, 1);
        assert!(!report.animated);
        assert_eq!(report.artifact, out.join("1.png"));
        assert!(report.artifact.exists());
        assert!(report.metadata.exists());

        assert_eq!(data.state.current_edition, 1);
        assert_eq!(data.state.generated_count, 1);
        assert!(ledger.contains(&report.key));
    }

    #[test]
    fn test_no_layers_fails() {
        let dir = tempdir().unwrap();
        let mut data = project(&dir, 0, 0);
        let mut ledger = UniquenessLedger::in_memory();

        let mut generator =
            Generator::new(&mut data, &mut ledger, WeightedSampler::seeded(1), compositor(), dir.path());
        assert!(matches!(generator.generate_edition(), Err(GenerationError::NoLayers)));
        assert_eq!(generator.phase(), Phase::Failed);
    }

    #[test]
    fn test_unique_space_exhausts() {
        let dir = tempdir().unwrap();
        let mut data = project(&dir, 2, 1);
        data.settings.max_attempts = 50;
        let mut ledger = UniquenessLedger::in_memory();
        let out = dir.path().join("out");

        let mut generator =
            Generator::new(&mut data, &mut ledger, WeightedSampler::seeded(5), compositor(), &out);
        generator.generate_edition().unwrap();
        generator.generate_edition().unwrap();
        let err = generator.generate_edition().unwrap_err();
        assert!(matches!(err, GenerationError::AttemptsExhausted { attempts: 50 }));

        assert_eq!(data.state.current_edition, 2);
        assert_eq!(ledger.len(), 2);
        assert!(!out.join("3.png").exists());
        assert!(!out.join("3.json").exists());
    }

    /// Returns the same combination on every draw.
    struct FixedSampler {
        combination: Combination,
        draws: u32,
    }

    impl Sampler for FixedSampler {
        fn sample(&mut self, _roster: &[Contributor]) -> Result<Combination, SampleError> {
            self.draws += 1;
            Ok(self.combination.clone())
        }
    }

    #[test]
    fn test_repeated_combination_rejected() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let mut data = project(&dir, 1, 1);
        let mut combination = Combination::new();
        for c in &data.contributors {
            combination.insert(c.name.clone(), c.layers[0].clone());
        }
        let mut ledger = UniquenessLedger::in_memory();

        let sampler = FixedSampler { combination: combination.clone(), draws: 0 };
        let mut generator = Generator::new(&mut data, &mut ledger, sampler, compositor(), &out);
        generator.generate_edition().unwrap();

        data.settings.max_attempts = 1;
        data.settings.ensure_uniqueness = true;
        let sampler = FixedSampler { combination, draws: 0 };
        let mut generator = Generator::new(&mut data, &mut ledger, sampler, compositor(), &out);
        let err = generator.generate_edition().unwrap_err();
        assert!(matches!(err, GenerationError::AttemptsExhausted { attempts: 1 }));
        assert_eq!(generator.sampler.draws, 1);
        assert_eq!(generator.phase(), Phase::Failed);

        assert_eq!(data.state.current_edition, 1);
        assert_eq!(data.state.generated_count, 1);
        assert_eq!(ledger.len(), 1);
        assert!(!out.join("2.png").exists());
    }

    #[test]
    fn test_checkpoint_runs_after_each_edition() {
        let dir = tempdir().unwrap();
        let mut data = project(&dir, 2, 2);
        let mut ledger = UniquenessLedger::in_memory();
        let mut seen = Vec::new();

        let mut generator =
            Generator::new(&mut data, &mut ledger, WeightedSampler::seeded(3), compositor(), dir.path());
        let result = generator.generate_batch_with(3, &NullProgress, None, |project| {
            seen.push(project.state.generated_count);
            Ok(())
        });

        assert!(result.is_complete());
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_checkpoint_failure_stops_batch() {
        let dir = tempdir().unwrap();
        let mut data = project(&dir, 2, 2);
        let mut ledger = UniquenessLedger::in_memory();

        let mut generator =
            Generator::new(&mut data, &mut ledger, WeightedSampler::seeded(3), compositor(), dir.path());
        let result = generator.generate_batch_with(3, &NullProgress, None, |_| {
            Err(OutputError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        });

        assert_eq!(result.generated(), 1);
        assert!(matches!(result.error, Some(GenerationError::Persistence { edition: 1, .. })));
    }

    #[test]
    fn test_duplicates_allowed_without_uniqueness() {
        let dir = tempdir().unwrap();
        let mut data = project(&dir, 1, 1);
        data.settings.ensure_uniqueness = false;
        let mut ledger = UniquenessLedger::in_memory();

        let mut generator =
            Generator::new(&mut data, &mut ledger, WeightedSampler::seeded(5), compositor(), dir.path());
        for _ in 0..3 {
            generator.generate_edition().unwrap();
        }
        assert_eq!(data.state.current_edition, 3);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_missing_files_exhaust_budget() {
        let dir = tempdir().unwrap();
        let mut data = project(&dir, 1, 1);
        data.settings.max_attempts = 5;
        fs::remove_file(&data.contributors[0].layers[0].file_path).unwrap();
        let mut ledger = UniquenessLedger::in_memory();

        let mut generator =
            Generator::new(&mut data, &mut ledger, WeightedSampler::seeded(5), compositor(), dir.path());
        let err = generator.generate_edition().unwrap_err();
        assert!(matches!(err, GenerationError::AttemptsExhausted { attempts: 5 }));
        assert_eq!(data.state.current_edition, 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_batch_stops_at_first_failure() {
        let dir = tempdir().unwrap();
        let mut data = project(&dir, 2, 2);
        data.settings.max_attempts = 200;
        let mut ledger = UniquenessLedger::in_memory();

        let mut generator =
            Generator::new(&mut data, &mut ledger, WeightedSampler::seeded(9), compositor(), dir.path());
        let result = generator.generate_batch(6, &NullProgress, None);

        assert_eq!(result.generated(), 4);
        assert!(matches!(result.error, Some(GenerationError::AttemptsExhausted { .. })));
        assert!(!result.is_complete());
        let editions: Vec<u64> = result.editions.iter().map(|r| r.edition).collect();
        assert_eq!(editions, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_batch_cancel_checked_between_editions() {
        let dir = tempdir().unwrap();
        let mut data = project(&dir, 3, 3);
        let mut ledger = UniquenessLedger::in_memory();
        let cancel = AtomicBool::new(true);

        let mut generator =
            Generator::new(&mut data, &mut ledger, WeightedSampler::seeded(9), compositor(), dir.path());
        let result = generator.generate_batch(3, &NullProgress, Some(&cancel));
        assert!(result.cancelled);
        assert_eq!(result.generated(), 0);
        assert_eq!(data.state.current_edition, 0);
    }

    #[test]
    fn test_invalid_weight_surfaces() {
        let dir = tempdir().unwrap();
        let mut data = project(&dir, 2, 1);
        data.contributors[0].layers[1].rarity_weight = 0.0;
        let mut ledger = UniquenessLedger::in_memory();

        let mut generator =
            Generator::new(&mut data, &mut ledger, WeightedSampler::seeded(1), compositor(), dir.path());
        assert!(matches!(generator.generate_edition(), Err(GenerationError::InvalidWeight(_))));
    }

    #[test]
    fn test_strict_mode_corrupt_asset_fails_cleanly() {
        let dir = tempdir().unwrap();
        let mut data = project(&dir, 1, 1);
        fs::write(&data.contributors[1].layers[0].file_path, b"not an image").unwrap();
        let mut ledger = UniquenessLedger::in_memory();

        let mut generator = Generator::new(
            &mut data,
            &mut ledger,
            WeightedSampler::seeded(1),
            compositor().with_strict(true),
            dir.path(),
        );
        let err = generator.generate_edition().unwrap_err();
        assert!(matches!(err, GenerationError::Composition(CompositionError::AssetCorrupt { .. })));
        assert!(ledger.is_empty());
        assert_eq!(data.state.current_edition, 0);
    }

    #[test]
    fn test_lenient_mode_reports_warning() {
        let dir = tempdir().unwrap();
        let mut data = project(&dir, 1, 1);
        fs::write(&data.contributors[1].layers[0].file_path, b"not an image").unwrap();
        let mut ledger = UniquenessLedger::in_memory();

        let mut generator =
            Generator::new(&mut data, &mut ledger, WeightedSampler::seeded(1), compositor(), dir.path());
        let report = generator.generate_edition().unwrap();
        assert_eq!(report.warnings.len(), 1);
    }
}
