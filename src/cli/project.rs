//! Project command implementations (new, contributor, layer, stats, editions, validate, resize-layers)

use std::path::Path;
use std::process::ExitCode;

use super::{find_layer_files, ContributorAction, LayerAction, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::composition::BlendMode;
use crate::config::LayermintConfig;
use crate::models::ProjectInfo;
use crate::project::{Project, ProjectError};

/// Open the project at `root`, printing the error on failure.
pub(super) fn open_project(root: &Path) -> Result<Project, ExitCode> {
    Project::open(root).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_ERROR)
    })
}

fn report(result: Result<(), ProjectError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the new command
pub fn run_new(path: &Path, name: Option<&str>, size: Option<u64>, config: &LayermintConfig) -> ExitCode {
    let name = match name {
        Some(name) => name.to_string(),
        None => match path.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => {
                eprintln!("Error: cannot derive a collection name from '{}'; pass --name", path.display());
                return ExitCode::from(EXIT_INVALID_ARGS);
            }
        },
    };
    let size = size.unwrap_or(config.defaults.collection_size);

    match Project::create_with(path, ProjectInfo::new(&name, size), config.generation_settings()) {
        Ok(project) => {
            println!("Created project '{}' at {}", name, project.root().display());
            println!();
            println!("Next steps:");
            println!("  layermint -p {} contributor add <name>", path.display());
            println!("  layermint -p {} layer add <name> <image files...>", path.display());
            println!("  layermint -p {} generate -n 10", path.display());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run a contributor subcommand
pub fn run_contributor(root: &Path, action: ContributorAction) -> ExitCode {
    let mut project = match open_project(root) {
        Ok(p) => p,
        Err(code) => return code,
    };

    match action {
        ContributorAction::Add { name } => report(project.add_contributor(&name).map(|c| {
            println!("Added contributor '{}' (index {})", c.name, c.layer_index);
        })),
        ContributorAction::Remove { name } => report(project.remove_contributor(&name).map(|()| {
            println!("Removed contributor '{}'", name);
        })),
        ContributorAction::List => {
            if project.contributors().is_empty() {
                println!("No contributors");
            }
            for c in project.contributors() {
                println!(
                    "{:<24} index {:>3}  {} layer{}",
                    c.name,
                    c.layer_index,
                    c.layers.len(),
                    if c.layers.len() == 1 { "" } else { "s" }
                );
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        ContributorAction::SetIndex { name, index } => {
            report(project.set_contributor_index(&name, index).map(|()| {
                println!("Contributor '{}' now at index {}", name, index);
            }))
        }
    }
}

/// Run a layer subcommand
pub fn run_layer(root: &Path, action: LayerAction) -> ExitCode {
    let mut project = match open_project(root) {
        Ok(p) => p,
        Err(code) => return code,
    };

    match action {
        LayerAction::Add { contributor, files } => {
            let files: Vec<_> = files
                .into_iter()
                .flat_map(|path| if path.is_dir() { find_layer_files(&path) } else { vec![path] })
                .collect();
            if files.is_empty() {
                eprintln!("Error: no .png or .gif files found");
                return ExitCode::from(EXIT_ERROR);
            }

            let mut failed = 0;
            for file in &files {
                match project.add_layer(&contributor, file) {
                    Ok(layer) => println!("Added {} as '{}'", layer.file_name, layer.display_name),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                ExitCode::from(EXIT_ERROR)
            } else {
                ExitCode::from(EXIT_SUCCESS)
            }
        }
        LayerAction::List { contributor } => {
            let contributors: Vec<_> = match &contributor {
                Some(name) => match project.contributor(name) {
                    Some(c) => vec![c],
                    None => {
                        eprintln!("Error: Unknown contributor '{}'", name);
                        return ExitCode::from(EXIT_ERROR);
                    }
                },
                None => project.contributors().iter().collect(),
            };

            for c in contributors {
                println!("{}:", c.name);
                for layer in &c.layers {
                    let missing = if layer.file_path.exists() { "" } else { "  (missing)" };
                    println!(
                        "  {:<28} rarity {:<6} opacity {:<4} index {:>3}  {}{}",
                        layer.file_name,
                        layer.rarity_weight,
                        layer.opacity,
                        layer.layer_index,
                        layer.blend_mode,
                        missing
                    );
                }
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        LayerAction::Set { contributor, layer, rarity, opacity, index, blend } => {
            if rarity.is_none() && opacity.is_none() && index.is_none() && blend.is_none() {
                eprintln!("Error: nothing to set; pass --rarity, --opacity, --index or --blend");
                return ExitCode::from(EXIT_INVALID_ARGS);
            }

            let result = apply_layer_settings(&mut project, &contributor, &layer, rarity, opacity, index, blend);
            report(result.map(|()| println!("Updated {}/{}", contributor, layer)))
        }
    }
}

fn apply_layer_settings(
    project: &mut Project,
    contributor: &str,
    layer: &str,
    rarity: Option<f64>,
    opacity: Option<f32>,
    index: Option<i64>,
    blend: Option<BlendMode>,
) -> Result<(), ProjectError> {
    if let Some(weight) = rarity {
        project.set_layer_rarity(contributor, layer, weight)?;
    }
    if let Some(opacity) = opacity {
        project.set_layer_opacity(contributor, layer, opacity)?;
    }
    if let Some(index) = index {
        project.set_layer_index(contributor, layer, index)?;
    }
    if let Some(mode) = blend {
        project.set_layer_blend_mode(contributor, layer, mode)?;
    }
    Ok(())
}

/// Run the stats command
pub fn run_stats(root: &Path) -> ExitCode {
    let project = match open_project(root) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let data = project.data();
    let stats = project.stats();
    println!("Collection:            {} ({})", data.info.name, data.info.symbol);
    println!("Contributors:          {}", data.contributors.len());
    println!("Possible combinations: {}", stats.possible_combinations);
    println!("Generated:             {}", stats.generated_count);
    println!("Unique combinations:   {}", stats.unique_combinations);
    println!("Remaining unique:      {}", stats.remaining_unique);
    println!("Next edition:          #{}", data.state.next_edition());
    if data.info.total_size > 0 {
        println!("Planned size:          {} ({} left)", data.info.total_size, project.remaining_editions());
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Run the editions command
pub fn run_editions(root: &Path) -> ExitCode {
    let project = match open_project(root) {
        Ok(p) => p,
        Err(code) => return code,
    };

    match project.generated_editions() {
        Ok(editions) => {
            if editions.is_empty() {
                println!("No editions generated yet");
            }
            for edition in editions {
                let traits: Vec<_> = edition
                    .metadata
                    .attributes
                    .iter()
                    .map(|a| format!("{}={}", a.trait_type, a.value))
                    .collect();
                println!("#{:<6} {}  {}", edition.edition, edition.metadata.image, traits.join(", "));
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the validate command
pub fn run_validate(root: &Path) -> ExitCode {
    let project = match open_project(root) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let report = project.validate_layer_files();
    for path in &report.missing {
        println!("missing: {}", path.display());
    }
    for (path, reason) in &report.corrupt {
        println!("corrupt: {} ({})", path.display(), reason);
    }

    if report.is_ok() {
        println!("All {} layer files OK", report.checked);
        ExitCode::from(EXIT_SUCCESS)
    } else {
        eprintln!(
            "{} of {} layer files have problems",
            report.missing.len() + report.corrupt.len(),
            report.checked
        );
        ExitCode::from(EXIT_ERROR)
    }
}

/// Run the resize-layers command
pub fn run_resize(root: &Path, config: &LayermintConfig) -> ExitCode {
    let project = match open_project(root) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let size = config.render.canvas_size;
    let resized = project.resize_all_layers(size);
    println!("Resized {} layer file{} to {}x{}", resized, if resized == 1 { "" } else { "s" }, size, size);
    ExitCode::from(EXIT_SUCCESS)
}
