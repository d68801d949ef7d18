//! Contributors and the layers they supply.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::composition::{file_type, BlendMode, LayerDescriptor};

fn default_weight() -> f64 {
    1.0
}

fn default_opacity() -> f32 {
    1.0
}

fn default_index() -> i64 {
    1
}

/// One selectable image owned by a contributor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerOption {
    /// File name inside the contributor's asset directory; unique per contributor
    pub file_name: String,
    pub display_name: String,
    pub file_path: PathBuf,
    /// Relative draw weight (> 0)
    #[serde(default = "default_weight")]
    pub rarity_weight: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Stacking index; defaults to the contributor's index
    #[serde(default = "default_index")]
    pub layer_index: i64,
    #[serde(default)]
    pub blend_mode: BlendMode,
}

impl LayerOption {
    /// New option with default weight, opacity and blend mode.
    pub fn new(file_path: impl Into<PathBuf>, layer_index: i64) -> Self {
        let file_path = file_path.into();
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            display_name: display_name_for(&file_name),
            file_name,
            file_path,
            rarity_weight: 1.0,
            opacity: 1.0,
            layer_index,
            blend_mode: BlendMode::Normal,
        }
    }

    pub fn with_rarity(mut self, rarity_weight: f64) -> Self {
        self.rarity_weight = rarity_weight;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// `"png"` or `"gif"`, by extension.
    pub fn file_type(&self) -> &'static str {
        file_type(&self.file_path)
    }

    /// Render descriptor for this option as picked for `contributor`.
    pub fn descriptor(&self, contributor: &str) -> LayerDescriptor {
        LayerDescriptor::new(contributor, &self.file_path, &self.display_name, self.layer_index)
            .with_opacity(self.opacity)
            .with_blend_mode(self.blend_mode)
    }
}

/// A party supplying one trait category to every edition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    pub display_name: String,
    /// Default stacking index for new layers (1-based roster position)
    pub layer_index: i64,
    #[serde(default)]
    pub layers: Vec<LayerOption>,
}

impl Contributor {
    pub fn new(name: impl Into<String>, layer_index: i64) -> Self {
        let name = name.into();
        Self { display_name: name.clone(), name, layer_index, layers: Vec::new() }
    }

    pub fn with_layer(mut self, layer: LayerOption) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn has_layers(&self) -> bool {
        !self.layers.is_empty()
    }

    pub fn layer(&self, file_name: &str) -> Option<&LayerOption> {
        self.layers.iter().find(|l| l.file_name == file_name)
    }

    pub fn layer_mut(&mut self, file_name: &str) -> Option<&mut LayerOption> {
        self.layers.iter_mut().find(|l| l.file_name == file_name)
    }
}

/// Display name from a file name: stem, underscores to spaces, title case.
///
/// `"gold_crown.png"` becomes `"Gold Crown"`.
pub fn display_name_for(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    stem.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
