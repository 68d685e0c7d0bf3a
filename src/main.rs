//! Flugelhorn CLI
//!
//! Entry point for the `flugelhorn` command-line tool.

use clap::{Parser, Subcommand};
use flugelhorn::media::{check_paths, find_raw_video_dirs};
use flugelhorn::pipeline::{check_settings, run_copy};
use flugelhorn::{BatchSummary, Pipeline, PipelineConfig, PipelineError};
use flugelhorn_settings::default_settings;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flugelhorn")]
#[command(about = "360 video stitching automation", version)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy media directories from a camera card to local storage
    Copy {
        /// Card or directory to search for recordings
        #[arg(long)]
        source: PathBuf,

        /// Destination for the copied recordings
        #[arg(long)]
        raw: PathBuf,
    },

    /// Stitch raw video directories
    Stitch {
        /// A raw video directory, or a directory of them
        #[arg(long)]
        raw: PathBuf,

        /// Base directory for stitched output
        #[arg(long)]
        stitched: PathBuf,

        /// Settings document (.yaml, .toml or .json)
        #[arg(long)]
        settings: PathBuf,

        /// Path to the stitcher binary
        #[arg(long)]
        stitcher: Option<PathBuf>,

        /// Write stitch documents without running the stitcher
        #[arg(long)]
        dry_run: bool,
    },

    /// Copy from a card, then stitch the copied video
    Run {
        #[arg(long)]
        source: PathBuf,

        #[arg(long)]
        raw: PathBuf,

        #[arg(long)]
        stitched: PathBuf,

        #[arg(long)]
        settings: PathBuf,

        #[arg(long)]
        stitcher: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Print the default settings as JSON
    Defaults {
        /// Only this section (dotted path, e.g. "preference.encode")
        #[arg(long)]
        section: Option<String>,
    },

    /// Apply a settings document to the defaults and report problems
    Check {
        #[arg(long)]
        settings: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Copy { source, raw } => run_copy_command(&source, &raw),
        Commands::Stitch {
            raw,
            stitched,
            settings,
            stitcher,
            dry_run,
        } => {
            let config = PipelineConfig {
                stitched_dir: stitched,
                settings_path: settings,
                stitcher,
                dry_run,
            };
            run_stitch(&raw, config);
        }
        Commands::Run {
            source,
            raw,
            stitched,
            settings,
            stitcher,
            dry_run,
        } => {
            let config = PipelineConfig {
                stitched_dir: stitched,
                settings_path: settings,
                stitcher,
                dry_run,
            };
            run_all(&source, &raw, config);
        }
        Commands::Defaults { section } => run_defaults(section.as_deref()),
        Commands::Check { settings } => run_check(&settings),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn fail(context: &str, e: PipelineError) -> ! {
    eprintln!("{}: {}", context, e);
    process::exit(e.exit_code());
}

fn ensure_dir(path: &Path) {
    if let Err(e) = fs::create_dir_all(path) {
        fail("Error creating directory", PipelineError::Io(e));
    }
}

fn run_copy_command(source: &Path, raw: &Path) {
    ensure_dir(raw);
    match run_copy(source, raw) {
        Ok(copied) => {
            println!(
                "Copied {} video and {} image directories to {}",
                copied.video.len(),
                copied.image.len(),
                raw.display()
            );
        }
        Err(e) => fail("Copy failed", e),
    }
}

fn run_stitch(raw: &Path, config: PipelineConfig) {
    ensure_dir(&config.stitched_dir);
    if let Err(e) = check_paths(&[raw, config.stitched_dir.as_path()]) {
        fail("Invalid path", e.into());
    }

    let raw_dirs = match find_raw_video_dirs(raw) {
        Ok(dirs) => dirs,
        Err(e) => fail("Error scanning raw directory", e.into()),
    };
    if raw_dirs.is_empty() {
        println!("No raw video directories found in {}", raw.display());
        return;
    }

    stitch_dirs(&raw_dirs, config);
}

fn run_all(source: &Path, raw: &Path, config: PipelineConfig) {
    ensure_dir(raw);
    ensure_dir(&config.stitched_dir);

    let copied = match run_copy(source, raw) {
        Ok(copied) => copied,
        Err(e) => fail("Copy failed", e),
    };
    if !copied.image.is_empty() {
        println!(
            "Copied {} image directories (not stitched)",
            copied.image.len()
        );
    }

    let raw_dirs: Vec<PathBuf> = copied.video.into_iter().map(|d| d.path).collect();
    if raw_dirs.is_empty() {
        println!("No video directories found in {}", source.display());
        return;
    }

    stitch_dirs(&raw_dirs, config);
}

fn stitch_dirs(raw_dirs: &[PathBuf], config: PipelineConfig) {
    let pipeline = match Pipeline::new(config) {
        Ok(p) => p,
        Err(e) => fail("Error", e),
    };

    let summary = pipeline.stitch_all(raw_dirs);
    print_summary(&summary);
    process::exit(summary.exit_code());
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "Stitched {} of {} directories",
        summary.succeeded.len(),
        summary.total()
    );
    for outcome in &summary.succeeded {
        let state = if outcome.stitched { "stitched" } else { "prepared" };
        println!("  {} {} -> {}", state, outcome.raw_dir.display(), outcome.xml_path.display());
        if outcome.diagnostics > 0 {
            println!(
                "    {} settings rejected, see {}",
                outcome.diagnostics,
                outcome.settings_path.display()
            );
        }
    }
    for failure in &summary.failed {
        println!("  failed {}: {}", failure.raw_dir.display(), failure.error);
    }
}

fn run_defaults(section: Option<&str>) {
    let config = match default_settings() {
        Ok(c) => c,
        Err(e) => fail("Schema error", e.into()),
    };

    let mut value = config.to_json();
    if let Some(path) = section {
        for part in path.split('.') {
            value = match value.get(part) {
                Some(v) if v.is_object() => v.clone(),
                _ => {
                    eprintln!("Unknown section: {}", path);
                    process::exit(1);
                }
            };
        }
    }

    match serde_json::to_string_pretty(&value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail("Error serializing output", e.into()),
    }
}

fn run_check(settings: &Path) {
    let (_, effective) = match check_settings(settings) {
        Ok(result) => result,
        Err(e) => fail("Settings error", e),
    };

    let diagnostics: Vec<_> = effective.diagnostics().collect();
    if diagnostics.is_empty() {
        println!("Settings valid: {}", settings.display());
        return;
    }

    println!("{} problem(s) in {}:", diagnostics.len(), settings.display());
    for diagnostic in diagnostics {
        println!("  {}", diagnostic);
    }
    process::exit(1);
}
