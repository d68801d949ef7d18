//! Layermint - layered generative collection builder
//!
//! This library provides functionality to:
//! - Manage a project of contributors, each owning a set of weighted layer files
//! - Sample one layer per contributor and reject combinations already minted
//! - Composite static (PNG) and animated (GIF) editions onto a square canvas
//! - Write per-edition JSON metadata alongside every artifact

pub mod canvas;
pub mod cli;
pub mod composition;
pub mod config;
pub mod generate;
pub mod gif;
pub mod ledger;
pub mod metadata;
pub mod models;
pub mod output;
pub mod project;
pub mod sampler;
