use clap::{Parser, Subcommand};
use cropdeck::analysis::DEFAULT_CONCURRENCY;
use cropdeck::detect::EdgeDetector;
use cropdeck::persist::Store;
use cropdeck::settings::OutputFormat;
use cropdeck::workspace::Workspace;
use cropdeck::{export, loader, output};
use std::path::PathBuf;
use std::sync::Arc;

/// `0.3.0` on a release tag, `0.3.0-dev+<hash>` otherwise.
fn version_string() -> &'static str {
    if env!("ON_RELEASE_TAG") == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            concat!(env!("CARGO_PKG_VERSION"), "-dev")
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("{}-dev+{hash}", env!("CARGO_PKG_VERSION")).into_boxed_str())
        }
    }
}

/// Shared flags for commands that load and analyze images.
#[derive(clap::Args, Clone)]
struct LoadArgs {
    /// Image files or directories to load (directories are walked recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Target crop width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Target crop height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Skip smart-crop detection; every image keeps the centered fit framing
    #[arg(long)]
    no_smart: bool,

    /// Maximum concurrent detector invocations
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
}

#[derive(clap::Args, Clone)]
struct EncodeArgs {
    /// Output directory for exported crops
    #[arg(long, short, default_value = "crops")]
    out: PathBuf,

    /// Output encoding
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Lossy encoding quality (1-100)
    #[arg(long)]
    quality: Option<u32>,

    /// Output filename prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Output filename suffix (before the extension)
    #[arg(long)]
    suffix: Option<String>,

    /// First output number
    #[arg(long)]
    start_index: Option<u32>,
}

#[derive(Parser)]
#[command(name = "cropdeck")]
#[command(about = "Batch crop and re-encode images to a fixed aspect ratio")]
#[command(long_about = "\
Batch crop and re-encode images to a fixed aspect ratio

Each image gets a framing: a crop center, a zoom level, and the target
aspect ratio. By default a saliency detector suggests the framing; without
it (or when detection fails) the crop is the largest centered rectangle of
the target aspect. Framings you have confirmed before are recalled by
content fingerprint, so re-running on the same files reuses your choices.

Exports are numbered in input order: {prefix}{N}{suffix}.{ext} with N
starting at --start-index.")]
#[command(version = version_string())]
struct Cli {
    /// Directory for persisted settings and framings
    #[arg(long, default_value = ".cropdeck", global = true)]
    store_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load images, analyze, crop, and write the results
    Export {
        #[command(flatten)]
        load: LoadArgs,
        #[command(flatten)]
        encode: EncodeArgs,
    },
    /// Load images and print the suggested framings without exporting
    Analyze {
        #[command(flatten)]
        load: LoadArgs,
    },
    /// Remove persisted settings and framings
    ClearStore,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Export { load, encode } => {
            let mut ws = open_workspace(&cli.store_dir, &load);
            apply_encode_overrides(&mut ws, &encode);
            load_and_analyze(&mut ws, &load)?;

            let report = export::export_all(&mut ws, &encode.out, |done, total| {
                output::print_progress("Exporting", done, total);
            })?;
            output::print_export_report(&report);
            if !report.failures.is_empty() {
                std::process::exit(1);
            }
        }
        Command::Analyze { load } => {
            let mut ws = open_workspace(&cli.store_dir, &load);
            load_and_analyze(&mut ws, &load)?;

            for (i, entry) in ws.collection().entries().iter().enumerate() {
                let f = &entry.framing;
                let rect = cropdeck::geometry::calculate_crop(entry.width, entry.height, f)
                    .rounded();
                println!(
                    "{:0>3} {} \u{2192} center ({:.2}, {:.2}) zoom {:.2} crop {}x{}+{}+{}",
                    i + 1,
                    entry.name,
                    f.center_x,
                    f.center_y,
                    f.zoom,
                    rect.width,
                    rect.height,
                    rect.x,
                    rect.y
                );
            }
            println!("Analysis: {}", ws.analysis_stats());
        }
        Command::ClearStore => {
            Store::new(&cli.store_dir).clear_all();
            println!("Cleared store at {}", cli.store_dir.display());
        }
    }

    Ok(())
}

fn open_workspace(store_dir: &PathBuf, load: &LoadArgs) -> Workspace {
    let mut ws = Workspace::open(
        Store::new(store_dir),
        Arc::new(EdgeDetector::new()),
        load.concurrency,
    );

    let mut settings = ws.settings().clone();
    if load.no_smart {
        settings.auto_detect = false;
    }
    match (load.width, load.height) {
        (Some(w), Some(h)) => {
            settings.export.width = w;
            settings.export.height = h;
        }
        (Some(w), None) => settings.export.width = w,
        (None, Some(h)) => settings.export.height = h,
        (None, None) => {}
    }
    ws.apply_settings(settings);
    ws
}

fn apply_encode_overrides(ws: &mut Workspace, encode: &EncodeArgs) {
    let mut settings = ws.settings().clone();
    if let Some(format) = encode.format {
        settings.export.format = format;
    }
    if let Some(quality) = encode.quality {
        settings.export.quality = cropdeck::settings::Quality::new(quality);
    }
    if let Some(prefix) = &encode.prefix {
        settings.export.prefix = prefix.clone();
    }
    if let Some(suffix) = &encode.suffix {
        settings.export.suffix = suffix.clone();
    }
    if let Some(start_index) = encode.start_index {
        settings.export.start_index = start_index;
    }
    ws.apply_settings(settings);
}

fn load_and_analyze(
    ws: &mut Workspace,
    load: &LoadArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = loader::collect_image_files(&load.inputs);
    if files.is_empty() {
        return Err("no supported image files found".into());
    }

    let report = ws.add_files(&files);
    output::print_add_report(&report, ws.collection());

    if ws.queued_analysis() > 0 {
        ws.run_queued_analysis(|done, total| {
            output::print_progress("Analyzing", done, total);
        });
    }
    Ok(())
}
