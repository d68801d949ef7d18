//! Configuration schema types for `layermint.toml`
//!
//! Defines the structure and validation rules for layermint configuration.

use serde::{Deserialize, Serialize};

use crate::canvas::CANVAS_SIZE;
use crate::composition::{Compositor, DEFAULT_FRAME_DURATION_MS};
use crate::models::GenerationSettings;

/// Defaults applied to new projects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Planned collection size for new projects
    #[serde(default = "default_collection_size")]
    pub collection_size: u64,
    /// Samples tried per edition before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Reject combinations that were already issued
    #[serde(default = "default_true")]
    pub ensure_uniqueness: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            collection_size: default_collection_size(),
            max_attempts: default_max_attempts(),
            ensure_uniqueness: true,
        }
    }
}

fn default_collection_size() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    1000
}

fn default_true() -> bool {
    true
}

/// Compositing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Width and height of the square output canvas
    #[serde(default = "default_canvas_size")]
    pub canvas_size: u32,
    /// Display time of every animated frame
    #[serde(default = "default_frame_duration")]
    pub frame_duration_ms: u32,
    /// Fail on unreadable layer files instead of substituting them
    #[serde(default)]
    pub strict: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas_size: default_canvas_size(),
            frame_duration_ms: default_frame_duration(),
            strict: false,
        }
    }
}

fn default_canvas_size() -> u32 {
    CANVAS_SIZE
}

fn default_frame_duration() -> u32 {
    DEFAULT_FRAME_DURATION_MS
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

fn default_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Complete layermint.toml configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayermintConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "render.canvas_size")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layermint.toml: '{}' {}", self.field, self.message)
    }
}

impl LayermintConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut error = |field: &str, message: &str| {
            errors.push(ConfigValidationError { field: field.to_string(), message: message.to_string() });
        };

        if self.defaults.max_attempts == 0 {
            error("defaults.max_attempts", "must be a positive integer");
        }
        if self.render.canvas_size == 0 {
            error("render.canvas_size", "must be a positive integer");
        }
        // GIF delays are stored in centiseconds
        if self.render.frame_duration_ms < 10 {
            error("render.frame_duration_ms", "must be at least 10");
        }
        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            error("log.level", "must be one of trace, debug, info, warn, error, off");
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Compositor for the configured canvas, timing and strictness.
    pub fn compositor(&self) -> Compositor {
        Compositor::new()
            .with_canvas(self.render.canvas_size, self.render.canvas_size)
            .with_frame_duration(self.render.frame_duration_ms)
            .with_strict(self.render.strict)
    }

    /// Generation settings seeded into new projects.
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            max_attempts: self.defaults.max_attempts,
            ensure_uniqueness: self.defaults.ensure_uniqueness,
        }
    }
}
