//! Weighted random combination sampling
//!
//! A [`Combination`] is one draw of exactly one layer from every contributor
//! that has layers. Its [`CombinationKey`] is the canonical identity used for
//! uniqueness checks: every `contributor:file_name` pair, sorted and joined
//! with `|`, so the key doesn't depend on the order contributors are visited.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use thiserror::Error;

use crate::composition::LayerDescriptor;
use crate::models::{Contributor, LayerOption};

/// Error raised while sampling a combination.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    /// A layer has a zero, negative or non-finite rarity weight
    #[error("Layer '{layer}' of contributor '{contributor}' has invalid rarity weight {weight}")]
    InvalidWeight { contributor: String, layer: String, weight: f64 },
}

/// Canonical, order-independent identity of a combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CombinationKey(String);

impl CombinationKey {
    /// Build a key from `(contributor, file_name)` pairs in any order.
    pub fn from_parts<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut parts: Vec<String> =
            parts.into_iter().map(|(contributor, file)| format!("{}:{}", contributor, file)).collect();
        parts.sort();
        CombinationKey(parts.join("|"))
    }

    /// Wrap an already-canonical key string, e.g. one read back from the ledger.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        CombinationKey(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sampled draft: a layer picked for each contributor, in roster order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Combination {
    picks: Vec<(String, LayerOption)>,
}

impl Combination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pick for `contributor`, replacing any earlier pick.
    pub fn insert(&mut self, contributor: impl Into<String>, layer: LayerOption) {
        let contributor = contributor.into();
        match self.picks.iter_mut().find(|(name, _)| *name == contributor) {
            Some(slot) => slot.1 = layer,
            None => self.picks.push((contributor, layer)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn get(&self, contributor: &str) -> Option<&LayerOption> {
        self.picks.iter().find(|(name, _)| name == contributor).map(|(_, layer)| layer)
    }

    /// Picks in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LayerOption)> {
        self.picks.iter().map(|(name, layer)| (name.as_str(), layer))
    }

    pub fn key(&self) -> CombinationKey {
        CombinationKey::from_parts(self.iter().map(|(name, layer)| (name, layer.file_name.as_str())))
    }

    /// Whether any picked layer is animated.
    pub fn is_animated(&self) -> bool {
        self.iter().any(|(_, layer)| layer.file_type() == "gif")
    }

    /// Render descriptors for every pick, in roster order.
    pub fn to_descriptors(&self) -> Vec<LayerDescriptor> {
        self.iter().map(|(name, layer)| layer.descriptor(name)).collect()
    }
}

/// Source of combinations for the generator.
///
/// The production implementation is [`WeightedSampler`]; tests can supply
/// scripted samplers.
pub trait Sampler {
    /// Draw one layer per contributor with layers.
    ///
    /// Returns an empty combination when no contributor has any layer.
    fn sample(&mut self, roster: &[Contributor]) -> Result<Combination, SampleError>;
}

/// Picks each contributor's layer with probability proportional to its
/// rarity weight.
#[derive(Debug, Clone)]
pub struct WeightedSampler<R = StdRng> {
    rng: R,
}

impl WeightedSampler<StdRng> {
    /// Sampler seeded from the OS.
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Reproducible sampler.
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl<R: Rng> WeightedSampler<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Sampler for WeightedSampler<R> {
    fn sample(&mut self, roster: &[Contributor]) -> Result<Combination, SampleError> {
        let mut combination = Combination::new();

        for contributor in roster.iter().filter(|c| c.has_layers()) {
            let layers = &contributor.layers;
            validate_weights(contributor)?;

            let index = if layers.len() == 1 {
                0
            } else {
                let dist = WeightedIndex::new(layers.iter().map(|l| l.rarity_weight)).map_err(|_| {
                    SampleError::InvalidWeight {
                        contributor: contributor.name.clone(),
                        layer: layers[0].file_name.clone(),
                        weight: layers[0].rarity_weight,
                    }
                })?;
                dist.sample(&mut self.rng)
            };

            combination.insert(contributor.name.clone(), layers[index].clone());
        }

        Ok(combination)
    }
}

fn validate_weights(contributor: &Contributor) -> Result<(), SampleError> {
    for layer in &contributor.layers {
        let weight = layer.rarity_weight;
        if !weight.is_finite() || weight <= 0.0 {
            return Err(SampleError::InvalidWeight {
                contributor: contributor.name.clone(),
                layer: layer.file_name.clone(),
                weight,
            });
        }
    }
    Ok(())
}
