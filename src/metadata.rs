//! Per-edition metadata documents

use serde::{Deserialize, Serialize};

use crate::models::ProjectInfo;
use crate::sampler::Combination;

/// One trait entry: which layer a contributor supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Contributor name
    pub trait_type: String,
    /// Layer display name
    pub value: String,
    pub layer_index: i64,
    /// `"png"` or `"gif"`
    pub file_type: String,
}

/// JSON document written next to every edition artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditionMetadata {
    pub name: String,
    pub description: String,
    /// Artifact file name, `{edition}.png` or `{edition}.gif`
    pub image: String,
    /// Same as `image` when any layer is animated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_url: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl EditionMetadata {
    /// Describe `edition`, built from `combination`.
    ///
    /// Attributes follow roster order, not stacking order.
    pub fn build(edition: u64, combination: &Combination, info: &ProjectInfo) -> Self {
        let animated = combination.is_animated();
        let image = format!("{}.{}", edition, if animated { "gif" } else { "png" });

        let attributes = combination
            .iter()
            .map(|(contributor, layer)| Attribute {
                trait_type: contributor.to_string(),
                value: layer.display_name.clone(),
                layer_index: layer.layer_index,
                file_type: layer.file_type().to_string(),
            })
            .collect();

        Self {
            name: format!("{} #{}", info.name, edition),
            description: info.description.clone(),
            animation_url: animated.then(|| image.clone()),
            image,
            attributes,
        }
    }

    pub fn is_animated(&self) -> bool {
        self.animation_url.is_some()
    }
}
