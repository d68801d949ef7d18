//! Data models for projects, contributors and their layers

mod contributor;
mod project;

pub use contributor::{display_name_for, Contributor, LayerOption};
pub use project::{format_timestamp, GenerationSettings, GenerationState, ProjectData, ProjectInfo};
