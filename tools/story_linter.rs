/// Story Linter — validates story files and reports graph problems.
///
/// Usage: story_linter <story_dir_or_file> [--bundled]
///
/// Catalog defects (missing start, dangling targets, dead ends) are errors.
/// Unreachable scenes, cycles and stories without a reachable ending are
/// warnings.

use std::path::Path;
use std::process;
use story_engine::core::catalog::{StoryCatalog, StoryGraph, ThemeStory};
use story_engine::core::lint::lint_graph;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: story_linter <story_dir_or_file> [--bundled]");
        println!("       story_linter --bundled");
        process::exit(0);
    }

    let mut target = None;
    let mut bundled = false;
    for arg in &args[1..] {
        match arg.as_str() {
            "--bundled" => bundled = true,
            other if target.is_none() => target = Some(other.to_string()),
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
    }

    let mut errors = Vec::new();
    let mut builder = StoryCatalog::builder();
    if bundled {
        builder = builder.bundled();
    }

    if let Some(ref target) = target {
        let path = Path::new(target);
        if path.is_file() {
            builder = builder.story_file(path);
        } else if path.is_dir() {
            // Validate each file alone first so one broken story does not
            // hide the others.
            for story_path in story_files(path) {
                match ThemeStory::load_from_ron(&story_path)
                    .map_err(|e| e.to_string())
                    .and_then(|story| {
                        StoryGraph::from_story(story).map_err(|e| e.to_string())
                    }) {
                    Ok(_) => println!("  Loaded: {}", story_path.display()),
                    Err(e) => errors.push(format!("{}: {}", story_path.display(), e)),
                }
            }
            builder = builder.stories_dir(path);
        } else {
            eprintln!("ERROR: Path '{}' does not exist", target);
            process::exit(1);
        }
    }

    if !errors.is_empty() {
        print_summary(&errors, &[]);
        process::exit(1);
    }

    let catalog = match builder.build() {
        Ok(catalog) => catalog,
        Err(e) => {
            print_summary(&[e.to_string()], &[]);
            process::exit(1);
        }
    };

    println!("Loaded {} themes", catalog.len());
    println!("\n=== Story Lint Report ===\n");

    let mut warnings = Vec::new();
    for theme in catalog.themes() {
        let graph = match catalog.story_graph(&theme.key) {
            Ok(graph) => graph,
            Err(e) => {
                errors.push(e.to_string());
                continue;
            }
        };
        let report = lint_graph(graph);
        println!(
            "{} ({}): {} scenes, {} reachable endings",
            theme.display_name,
            theme.key,
            report.scene_count,
            report.reachable_endings.len()
        );
        for warning in &report.warnings {
            warnings.push(format!("{}: {}", theme.key, warning));
        }
    }

    print_summary(&errors, &warnings);
    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn story_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut paths = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                paths.push(path);
            }
        }
    }
    paths.sort();
    paths
}

fn print_summary(errors: &[String], warnings: &[String]) {
    if errors.is_empty() && warnings.is_empty() {
        println!("\nAll checks passed!");
    }
    for warning in warnings {
        println!("WARNING: {}", warning);
    }
    for error in errors {
        println!("ERROR: {}", error);
    }
    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );
}
