//! Project directories and the operations that edit them
//!
//! A project lives in one directory:
//!
//! ```text
//! <root>/
//!   config/project.json                  ProjectData
//!   assets/contributors/<name>/          layer files copied in by add_layer
//!   workspace/generated/{n}.png|gif|json editions
//!   workspace/previews/                  preview renders
//!   workspace/generated_combinations.txt uniqueness ledger
//! ```
//!
//! Every mutating operation saves `project.json` before returning.

use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use thiserror::Error;

use crate::canvas::normalize;
use crate::composition::{count_frames, is_animated_path, BlendMode, CompositionError, Compositor, Warning};
use crate::generate::progress::ProgressReporter;
use crate::generate::{BatchResult, Generator};
use crate::ledger::{LedgerError, UniquenessLedger};
use crate::metadata::EditionMetadata;
use crate::models::{Contributor, GenerationSettings, LayerOption, ProjectData, ProjectInfo};
use crate::output::{save_json, save_png, OutputError};
use crate::sampler::{Combination, SampleError, Sampler};

pub const CONFIG_FILE: &str = "config/project.json";
pub const CONTRIBUTORS_DIR: &str = "assets/contributors";
pub const GENERATED_DIR: &str = "workspace/generated";
pub const PREVIEWS_DIR: &str = "workspace/previews";
pub const LEDGER_FILE: &str = "workspace/generated_combinations.txt";

const PREVIEW_FILE: &str = "combination_preview.png";

/// Error type for project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("A project already exists at {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("No project found at {} (missing {})", .0.display(), CONFIG_FILE)]
    NotAProject(PathBuf),
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid project file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid contributor name '{0}'")]
    InvalidName(String),
    #[error("Invalid layer file name {0:?}")]
    InvalidLayerName(String),
    #[error("Contributor '{0}' already exists")]
    DuplicateContributor(String),
    #[error("Unknown contributor '{0}'")]
    UnknownContributor(String),
    #[error("Contributor '{contributor}' already has a layer named '{layer}'")]
    DuplicateLayer { contributor: String, layer: String },
    #[error("Contributor '{contributor}' has no layer '{layer}'")]
    UnknownLayer { contributor: String, layer: String },
    #[error("Not a usable image {}: {reason}", .path.display())]
    InvalidImage { path: PathBuf, reason: String },
    #[error("Rarity weight must be a positive number, got {0}")]
    InvalidRarity(f64),
    #[error("Opacity must be between 0 and 1, got {0}")]
    InvalidOpacity(f32),
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ProjectError + '_ {
    move |source| ProjectError::Io { path: path.to_path_buf(), source }
}

/// Counts shown by `stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationStats {
    pub possible_combinations: u64,
    pub generated_count: u64,
    pub unique_combinations: u64,
    /// Combinations not yet issued, 0 once the space is used up
    pub remaining_unique: u64,
}

/// Layer files that are missing or fail to decode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub checked: usize,
    pub missing: Vec<PathBuf>,
    pub corrupt: Vec<(PathBuf, String)>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.corrupt.is_empty()
    }
}

/// A generated edition found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEdition {
    pub edition: u64,
    pub artifact: PathBuf,
    pub metadata: EditionMetadata,
}

/// Preview render result.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub path: PathBuf,
    /// Layers left out because their files are missing
    pub skipped: Vec<PathBuf>,
    pub warnings: Vec<Warning>,
}

/// An open project.
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    data: ProjectData,
    ledger: UniquenessLedger,
}

impl Project {
    /// Create a new project directory with default generation settings.
    pub fn create(root: impl AsRef<Path>, name: &str) -> Result<Self, ProjectError> {
        Self::create_with(root, ProjectInfo::new(name, 0), GenerationSettings::default())
    }

    /// Create a new project directory.
    ///
    /// Fails if `root` already holds a project.
    pub fn create_with(
        root: impl AsRef<Path>,
        info: ProjectInfo,
        settings: GenerationSettings,
    ) -> Result<Self, ProjectError> {
        let root = root.as_ref();
        if root.join(CONFIG_FILE).exists() {
            return Err(ProjectError::AlreadyExists(root.to_path_buf()));
        }

        for dir in ["config", CONTRIBUTORS_DIR, GENERATED_DIR, PREVIEWS_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(io_error(&path))?;
        }
        let root = fs::canonicalize(root).map_err(io_error(root))?;

        let mut data = ProjectData::new(info);
        data.settings = settings;
        let ledger = UniquenessLedger::open(root.join(LEDGER_FILE))?;

        let project = Self { root, data, ledger };
        project.save()?;
        tracing::info!(root = %project.root.display(), name = %project.data.info.name, "project created");
        Ok(project)
    }

    /// Open an existing project.
    ///
    /// The ledger is replayed, and the edition counter is moved forward if
    /// the ledger records editions past it.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref();
        let config = root.join(CONFIG_FILE);
        if !config.exists() {
            return Err(ProjectError::NotAProject(root.to_path_buf()));
        }
        let root = fs::canonicalize(root).map_err(io_error(root))?;

        let content = fs::read_to_string(&config).map_err(io_error(&config))?;
        let mut data: ProjectData = serde_json::from_str(&content)
            .map_err(|source| ProjectError::Parse { path: config.clone(), source })?;
        let ledger = UniquenessLedger::open(root.join(LEDGER_FILE))?;

        if ledger.highest_edition() > data.state.current_edition {
            tracing::warn!(
                recorded = data.state.current_edition,
                ledger = ledger.highest_edition(),
                "edition counter behind ledger, advancing"
            );
            data.state.current_edition = ledger.highest_edition();
        }
        data.state.unique_combinations = data.state.unique_combinations.max(ledger.len() as u64);

        Ok(Self { root, data, ledger })
    }

    /// Write `config/project.json`.
    pub fn save(&self) -> Result<(), ProjectError> {
        save_json(&self.data, &self.root.join(CONFIG_FILE))?;
        Ok(())
    }

    fn touch_and_save(&mut self) -> Result<(), ProjectError> {
        self.data.touch();
        self.save()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data(&self) -> &ProjectData {
        &self.data
    }

    pub fn ledger(&self) -> &UniquenessLedger {
        &self.ledger
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.root.join(GENERATED_DIR)
    }

    pub fn contributor_dir(&self, name: &str) -> PathBuf {
        self.root.join(CONTRIBUTORS_DIR).join(name)
    }

    pub fn set_settings(&mut self, settings: GenerationSettings) -> Result<(), ProjectError> {
        self.data.settings = settings;
        self.touch_and_save()
    }

    pub fn contributors(&self) -> &[Contributor] {
        &self.data.contributors
    }

    pub fn contributor(&self, name: &str) -> Option<&Contributor> {
        self.data.contributor(name)
    }

    fn contributor_mut(&mut self, name: &str) -> Result<&mut Contributor, ProjectError> {
        self.data.contributor_mut(name).ok_or_else(|| ProjectError::UnknownContributor(name.to_string()))
    }

    fn layer_mut(&mut self, contributor: &str, layer: &str) -> Result<&mut LayerOption, ProjectError> {
        self.contributor_mut(contributor)?.layer_mut(layer).ok_or_else(|| ProjectError::UnknownLayer {
            contributor: contributor.to_string(),
            layer: layer.to_string(),
        })
    }

    /// Add a contributor at the end of the roster.
    ///
    /// Their default stacking index is their 1-based roster position.
    pub fn add_contributor(&mut self, name: &str) -> Result<&Contributor, ProjectError> {
        validate_name(name)?;
        if self.data.contributor(name).is_some() {
            return Err(ProjectError::DuplicateContributor(name.to_string()));
        }

        let dir = self.contributor_dir(name);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let index = self.data.contributors.len() as i64 + 1;
        self.data.contributors.push(Contributor::new(name, index));
        self.touch_and_save()?;
        tracing::info!(contributor = name, index, "contributor added");

        Ok(&self.data.contributors[self.data.contributors.len() - 1])
    }

    /// Remove a contributor, their layers and their asset directory.
    ///
    /// Remaining contributors are renumbered by roster position, and their
    /// layers' stacking indices reset to match.
    pub fn remove_contributor(&mut self, name: &str) -> Result<(), ProjectError> {
        let position = self
            .data
            .contributors
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| ProjectError::UnknownContributor(name.to_string()))?;

        let dir = self.contributor_dir(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(io_error(&dir))?;
        }

        self.data.contributors.remove(position);

        for (i, contributor) in self.data.contributors.iter_mut().enumerate() {
            let index = i as i64 + 1;
            contributor.layer_index = index;
            for layer in &mut contributor.layers {
                layer.layer_index = index;
            }
        }

        self.touch_and_save()?;
        tracing::info!(contributor = name, "contributor removed");
        Ok(())
    }

    /// Copy an image into a contributor's directory and add it as a layer.
    ///
    /// The file must decode as an image. The new layer starts with weight 1,
    /// full opacity and the contributor's stacking index.
    pub fn add_layer(&mut self, contributor: &str, source: &Path) -> Result<&LayerOption, ProjectError> {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ProjectError::InvalidImage {
                path: source.to_path_buf(),
                reason: "path has no file name".to_string(),
            })?;
        validate_layer_name(&file_name)?;

        let index = {
            let c = self
                .data
                .contributor(contributor)
                .ok_or_else(|| ProjectError::UnknownContributor(contributor.to_string()))?;
            if c.layer(&file_name).is_some() {
                return Err(ProjectError::DuplicateLayer {
                    contributor: contributor.to_string(),
                    layer: file_name,
                });
            }
            c.layer_index
        };

        check_image(source)
            .map_err(|reason| ProjectError::InvalidImage { path: source.to_path_buf(), reason })?;

        let dir = self.contributor_dir(contributor);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        let dest = dir.join(&file_name);
        if !same_file(source, &dest) {
            fs::copy(source, &dest).map_err(io_error(&dest))?;
        }

        let c = self.contributor_mut(contributor)?;
        c.layers.push(LayerOption::new(dest, index));
        self.touch_and_save()?;
        tracing::info!(contributor, layer = %file_name, "layer added");

        self.data
            .contributor(contributor)
            .and_then(|c| c.layers.last())
            .ok_or_else(|| ProjectError::UnknownContributor(contributor.to_string()))
    }

    pub fn set_layer_rarity(&mut self, contributor: &str, layer: &str, weight: f64) -> Result<(), ProjectError> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(ProjectError::InvalidRarity(weight));
        }
        self.layer_mut(contributor, layer)?.rarity_weight = weight;
        self.touch_and_save()
    }

    pub fn set_layer_opacity(&mut self, contributor: &str, layer: &str, opacity: f32) -> Result<(), ProjectError> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(ProjectError::InvalidOpacity(opacity));
        }
        self.layer_mut(contributor, layer)?.opacity = opacity;
        self.touch_and_save()
    }

    /// Override one layer's stacking index.
    pub fn set_layer_index(&mut self, contributor: &str, layer: &str, index: i64) -> Result<(), ProjectError> {
        self.layer_mut(contributor, layer)?.layer_index = index;
        self.touch_and_save()
    }

    pub fn set_layer_blend_mode(
        &mut self,
        contributor: &str,
        layer: &str,
        mode: BlendMode,
    ) -> Result<(), ProjectError> {
        self.layer_mut(contributor, layer)?.blend_mode = mode;
        self.touch_and_save()
    }

    /// Set a contributor's stacking index and apply it to all their layers.
    pub fn set_contributor_index(&mut self, contributor: &str, index: i64) -> Result<(), ProjectError> {
        let c = self.contributor_mut(contributor)?;
        c.layer_index = index;
        for layer in &mut c.layers {
            layer.layer_index = index;
        }
        self.touch_and_save()
    }

    pub fn stats(&self) -> GenerationStats {
        let possible = self.data.possible_combinations();
        let unique = self.data.state.unique_combinations;
        GenerationStats {
            possible_combinations: possible,
            generated_count: self.data.state.generated_count,
            unique_combinations: unique,
            remaining_unique: possible.saturating_sub(unique),
        }
    }

    /// Check every layer file exists and decodes.
    pub fn validate_layer_files(&self) -> ValidationReport {
        let paths: Vec<&Path> = self.layer_paths().collect();

        let results: Vec<_> = paths
            .par_iter()
            .map(|path| if path.exists() { check_image(path).err().map(Some) } else { Some(None) })
            .collect();

        let mut report = ValidationReport { checked: paths.len(), ..Default::default() };
        for (path, result) in paths.into_iter().zip(results) {
            match result {
                None => {}
                Some(None) => report.missing.push(path.to_path_buf()),
                Some(Some(reason)) => report.corrupt.push((path.to_path_buf(), reason)),
            }
        }
        report
    }

    /// Normalize every static layer file that isn't already canvas-sized.
    ///
    /// Files are rewritten in place as PNG. Animated layers and unreadable
    /// files are left alone. Returns how many files were rewritten.
    pub fn resize_all_layers(&self, size: u32) -> usize {
        let paths: Vec<&Path> =
            self.layer_paths().filter(|p| p.exists() && !is_animated_path(p)).collect();

        paths
            .par_iter()
            .filter(|path| match resize_layer_file(path, size) {
                Ok(resized) => resized,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not resize layer");
                    false
                }
            })
            .count()
    }

    fn layer_paths(&self) -> impl Iterator<Item = &Path> {
        self.data.contributors.iter().flat_map(|c| c.layers.iter().map(|l| l.file_path.as_path()))
    }

    /// Draw a combination without touching the ledger or counters.
    pub fn sample<S: Sampler>(&self, sampler: &mut S) -> Result<Combination, ProjectError> {
        Ok(sampler.sample(&self.data.contributors)?)
    }

    /// Render `combination` to `workspace/previews/combination_preview.png`.
    ///
    /// Layers whose files are missing are skipped. Animated layers show
    /// their first frame. Returns `None` when nothing is left to draw.
    pub fn preview(
        &self,
        combination: &Combination,
        compositor: &Compositor,
    ) -> Result<Option<Preview>, ProjectError> {
        let (present, missing): (Vec<_>, Vec<_>) =
            combination.to_descriptors().into_iter().partition(|d| d.source.exists());
        if present.is_empty() {
            return Ok(None);
        }

        let composite = compositor.compose_static(&present)?;
        let path = self.root.join(PREVIEWS_DIR).join(PREVIEW_FILE);
        save_png(&composite.output, &path)?;

        Ok(Some(Preview {
            path,
            skipped: missing.into_iter().map(|d| d.source).collect(),
            warnings: composite.warnings,
        }))
    }

    /// Generator bound to this project's state and ledger.
    pub fn generator<S: Sampler>(&mut self, sampler: S, compositor: Compositor) -> Generator<'_, S> {
        let output_dir = self.root.join(GENERATED_DIR);
        Generator::new(&mut self.data, &mut self.ledger, sampler, compositor, output_dir)
    }

    /// Run a batch, saving the project after every edition and once more
    /// when the batch ends, even if it stopped early.
    pub fn generate<S: Sampler>(
        &mut self,
        count: usize,
        sampler: S,
        compositor: Compositor,
        reporter: &dyn ProgressReporter,
        cancel: Option<&AtomicBool>,
    ) -> Result<BatchResult, ProjectError> {
        let config = self.root.join(CONFIG_FILE);
        let result = self
            .generator(sampler, compositor)
            .generate_batch_with(count, reporter, cancel, |data| save_json(data, &config));
        self.save()?;
        Ok(result)
    }

    /// Editions still available before the planned collection size is reached.
    pub fn remaining_editions(&self) -> u64 {
        self.data.info.total_size.saturating_sub(self.data.state.current_edition)
    }

    /// Every edition in `workspace/generated` with readable metadata, sorted.
    pub fn generated_editions(&self) -> Result<Vec<GeneratedEdition>, ProjectError> {
        let dir = self.generated_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ProjectError::Io { path: dir, source: e }),
        };

        let mut editions = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_error(&dir))?.path();
            let Some(edition) = artifact_edition(&path) else {
                continue;
            };
            match read_metadata(&dir.join(format!("{}.json", edition))) {
                Ok(Some(metadata)) => editions.push(GeneratedEdition { edition, artifact: path, metadata }),
                Ok(None) => {}
                Err(e) => tracing::warn!(edition, error = %e, "unreadable edition metadata"),
            }
        }

        editions.sort_by_key(|e| e.edition);
        Ok(editions)
    }

    /// Metadata of the most recently issued edition.
    pub fn latest_metadata(&self) -> Result<Option<EditionMetadata>, ProjectError> {
        let edition = self.data.state.current_edition;
        if edition == 0 {
            return Ok(None);
        }
        read_metadata(&self.generated_dir().join(format!("{}.json", edition)))
    }
}

/// Names become directory names, so no separators or dot entries.
fn validate_name(name: &str) -> Result<(), ProjectError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed != name
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', ':', '|'])
    {
        return Err(ProjectError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Layer file names end up in combination keys and ledger lines.
fn validate_layer_name(name: &str) -> Result<(), ProjectError> {
    if name.trim().is_empty() || name.contains(['|', ':', '\n', '\r']) {
        return Err(ProjectError::InvalidLayerName(name.to_string()));
    }
    Ok(())
}

/// Whether `a` and `b` resolve to the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Decode `path` fully, returning the reason if it fails.
fn check_image(path: &Path) -> Result<(), String> {
    if is_animated_path(path) {
        match count_frames(path)? {
            0 => Err("Animated image contains no frames".to_string()),
            _ => Ok(()),
        }
    } else {
        image::open(path).map(|_| ()).map_err(|e| format!("Failed to open image: {}", e))
    }
}

fn resize_layer_file(path: &Path, size: u32) -> Result<bool, String> {
    let image = image::open(path).map_err(|e| e.to_string())?.to_rgba8();
    if image.dimensions() == (size, size) {
        return Ok(false);
    }
    let resized = normalize(image, size, size);
    save_png(&resized, path).map_err(|e| e.to_string())?;
    tracing::debug!(path = %path.display(), size, "layer resized");
    Ok(true)
}

/// `12.png` or `12.gif` -> 12
fn artifact_edition(path: &Path) -> Option<u64> {
    let ext = path.extension()?.to_str()?;
    if ext != "png" && ext != "gif" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

fn read_metadata(path: &Path) -> Result<Option<EditionMetadata>, ProjectError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ProjectError::Io { path: path.to_path_buf(), source: e }),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ProjectError::Parse { path: path.to_path_buf(), source })
}
