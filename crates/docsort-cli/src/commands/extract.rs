//! Extract command - show what each page would be filed as, without
//! writing or moving anything.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use serde::Serialize;

use docsort_core::models::ExtractionResult;
use docsort_core::{BatchProcessor, Pipeline, Router, RoutingDecision};

use super::{load_config, rasterizer, PipelineArgs};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input PDF file
    input: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Write the JSON result to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct PagePreview {
    page: u32,
    extraction: ExtractionResult,
    decision: RoutingDecision,
}

pub async fn run(args: ExtractArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let mut config = load_config(config_path)?;
    args.pipeline.apply(&mut config);

    let router = Router::from_config(&config.routing);
    let pipeline = Pipeline::new(config).map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let processor = BatchProcessor::new(pipeline, rasterizer());

    let extractions = processor
        .extract_file(&args.input)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", args.input.display(), e))?;

    let previews: Vec<PagePreview> = extractions
        .into_iter()
        .zip(1u32..)
        .map(|(extraction, page)| PagePreview {
            page,
            decision: router.decide(&extraction),
            extraction,
        })
        .collect();

    let json = serde_json::to_string_pretty(&previews)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("{} Results written to {}", style("✓").green(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
