//! Generate and preview command implementations

use std::path::Path;
use std::process::ExitCode;

use super::project::open_project;
use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::config::LayermintConfig;
use crate::generate::progress::{ConsoleProgress, JsonProgress, ProgressReporter};
use crate::sampler::WeightedSampler;

fn sampler(seed: Option<u64>) -> WeightedSampler {
    match seed {
        Some(seed) => WeightedSampler::seeded(seed),
        None => WeightedSampler::from_entropy(),
    }
}

/// Run the generate command
pub fn run_generate(
    root: &Path,
    config: &LayermintConfig,
    count: usize,
    all: bool,
    seed: Option<u64>,
    json: bool,
    colors: bool,
) -> ExitCode {
    let mut project = match open_project(root) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let count = if all {
        let remaining = project.remaining_editions() as usize;
        if remaining == 0 {
            println!(
                "Collection complete: {} of {} editions generated",
                project.data().state.current_edition,
                project.data().info.total_size
            );
            return ExitCode::from(EXIT_SUCCESS);
        }
        remaining
    } else {
        count
    };

    let reporter: Box<dyn ProgressReporter> = if json {
        Box::new(JsonProgress::new())
    } else {
        Box::new(ConsoleProgress::new().with_colors(colors))
    };

    match project.generate(count, sampler(seed), config.compositor(), reporter.as_ref(), None) {
        Ok(result) if result.is_complete() => ExitCode::from(EXIT_SUCCESS),
        Ok(_) => ExitCode::from(EXIT_ERROR),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the preview command
pub fn run_preview(root: &Path, config: &LayermintConfig, seed: Option<u64>) -> ExitCode {
    let project = match open_project(root) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let combination = match project.sample(&mut sampler(seed)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    for (contributor, layer) in combination.iter() {
        println!("  {:<24} {}", contributor, layer.display_name);
    }

    match project.preview(&combination, &config.compositor()) {
        Ok(Some(preview)) => {
            for path in &preview.skipped {
                eprintln!("skipped missing layer: {}", path.display());
            }
            for warning in &preview.warnings {
                eprintln!("warning: {}", warning);
            }
            println!("Preview written to {}", preview.path.display());
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(None) => {
            eprintln!("Error: no layer files available to preview");
            ExitCode::from(EXIT_ERROR)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
