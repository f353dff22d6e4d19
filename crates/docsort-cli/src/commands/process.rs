//! Process command - split, name and file every page of the input PDFs.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use docsort_core::route::{CollisionPolicy, DispositionOutcome, InputDisposition, PlacementOutcome};
use docsort_core::{BatchProcessor, Destination, FileReport, Pipeline};

use super::{collect_inputs, load_config, rasterizer, PipelineArgs};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input PDF, directory or glob pattern
    #[arg(env = "INPUT_DIR", default_value = "entradas")]
    input: String,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Directory for resolved documents
    #[arg(long, env = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory for pages that need manual triage
    #[arg(long, env = "PENDENTES_DIR")]
    pending_dir: Option<PathBuf>,

    /// Directory where processed inputs are archived
    #[arg(long, env = "PROCESSED_DIR")]
    processed_dir: Option<PathBuf>,

    /// What to do with each input afterwards: archive (move), delete or keep
    #[arg(long, env = "INPUT_DISPOSITION")]
    disposition: Option<InputDisposition>,

    /// When an output name exists: skip, replace or suffix
    #[arg(long = "overwrite", env = "OUTPUT_OVERWRITE")]
    collision: Option<CollisionPolicy>,

    /// Number of pages extracted in parallel
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Per-page timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Write a CSV summary of every page to this file
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Output format for the run report
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human readable summary
    Text,
    /// JSON array of file reports
    Json,
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.pipeline.apply(&mut config);
    if let Some(dir) = &args.output_dir {
        config.routing.accepted_dir = dir.clone();
    }
    if let Some(dir) = &args.pending_dir {
        config.routing.pending_dir = dir.clone();
    }
    if let Some(dir) = &args.processed_dir {
        config.routing.processed_dir = dir.clone();
    }
    if let Some(disposition) = args.disposition {
        config.routing.disposition = disposition;
    }
    if let Some(collision) = args.collision {
        config.routing.collision = collision;
    }
    if let Some(jobs) = args.jobs {
        config.routing.workers = jobs;
    }
    if let Some(timeout) = args.timeout {
        config.routing.page_timeout_secs = timeout;
    }

    let files = collect_inputs(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No PDF files found in {}", args.input);
    }

    debug!(
        "Routing: accepted={} pending={} collision={} disposition={}",
        config.routing.accepted_dir.display(),
        config.routing.pending_dir.display(),
        config.routing.collision,
        config.routing.disposition
    );

    let pipeline = Pipeline::new(config).map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let processor = BatchProcessor::new(pipeline, rasterizer());

    let progress = match args.format {
        OutputFormat::Text => {
            println!("{} Found {} file(s) to process", style("ℹ").blue(), files.len());
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
                    .progress_chars("=>-"),
            );
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        }
        OutputFormat::Json => ProgressBar::hidden(),
    };

    let handles: Vec<_> = files
        .iter()
        .map(|path| (path.clone(), processor.spawn_file(path.clone())))
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        let report = handle
            .await
            .map_err(|e| anyhow::anyhow!("Worker for {} failed: {}", path.display(), e))?;
        progress.inc(1);
        reports.push(report);
    }
    progress.finish_and_clear();

    if let Some(summary_path) = &args.summary {
        write_summary(summary_path, &reports)?;
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => print_report(&reports, start.elapsed()),
    }

    if let Some(summary_path) = &args.summary {
        if matches!(args.format, OutputFormat::Text) {
            println!("{} Summary written to {}", style("✓").green(), summary_path.display());
        }
    }

    Ok(())
}

fn print_report(reports: &[FileReport], elapsed: Duration) {
    for report in reports {
        println!();
        println!("{}", style(report.source.display()).bold());

        if let Some(error) = &report.error {
            println!("  {} {}", style("✗").red(), error);
            continue;
        }

        for page in &report.pages {
            let marker = match (page.destination, page.placement) {
                (_, PlacementOutcome::Failed) => style("✗").red(),
                (Destination::Accepted, _) => style("✓").green(),
                (Destination::Pending, _) => style("➜").yellow(),
            };
            let note = match page.placement {
                PlacementOutcome::SkippedExisting => " (already existed)",
                PlacementOutcome::Replaced => " (replaced)",
                _ => "",
            };
            println!(
                "  {} page {}: {} -> {}{}",
                marker,
                page.page,
                page.file_name(),
                page.destination,
                note
            );
            if let Some(error) = &page.error {
                println!("      {}", style(error).red());
            }
        }

        match &report.disposition {
            Some(DispositionOutcome::Archived(path)) => println!("  archived to {}", path.display()),
            Some(DispositionOutcome::Deleted) => println!("  input removed"),
            Some(DispositionOutcome::Failed(e)) => println!("  {} {}", style("disposition failed:").yellow(), e),
            Some(DispositionOutcome::Kept) | None => {}
        }
    }

    let pages: usize = reports.iter().map(|r| r.pages.len()).sum();
    let accepted: usize = reports.iter().map(FileReport::accepted).sum();
    let pending: usize = reports.iter().map(FileReport::pending).sum();
    let unreadable = reports.iter().filter(|r| r.error.is_some()).count();

    println!();
    println!(
        "{} Processed {} file(s), {} page(s) in {:?}",
        style("✓").green(),
        reports.len(),
        pages,
        elapsed
    );
    println!(
        "   {} accepted, {} pending, {} unreadable",
        style(accepted).green(),
        style(pending).yellow(),
        style(unreadable).red()
    );
}

fn write_summary(path: &Path, reports: &[FileReport]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "source",
        "page",
        "doc_type",
        "issuer",
        "number",
        "resolution",
        "extraction",
        "destination",
        "file",
        "placement",
        "error",
    ])?;

    for report in reports {
        let source = report.source.display().to_string();

        if let Some(error) = &report.error {
            wtr.write_record([source.as_str(), "", "", "", "", "", "", "", "", "", error.as_str()])?;
            continue;
        }

        for page in &report.pages {
            let extraction = &page.extraction;
            wtr.write_record([
                source.clone(),
                page.page.to_string(),
                extraction.doc_type.to_string(),
                extraction.issuer.clone(),
                extraction.number.clone(),
                enum_name(&extraction.resolution)?,
                enum_name(&extraction.path)?,
                page.destination.to_string(),
                page.file_name(),
                enum_name(&page.placement)?,
                page.error.clone().unwrap_or_default(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Serialized name of a unit enum variant.
fn enum_name<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_value(value)?
        .as_str()
        .unwrap_or_default()
        .to_string())
}
