//! Runs one generation from the command line, no server involved.
//!
//!   generate_image "a blue circle" --kind icon --enhance

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use icongen::cli::CliOptions;
use icongen::config::{AppConfig, setup_logging};
use icongen::generator::Generator;
use icongen::models::{GenerationRequest, ImageKind};
use icongen::storage::ArtifactStore;

fn parse_kind(value: &str) -> Result<ImageKind, String> {
    value.parse()
}

#[derive(Parser, Debug)]
#[command(name = "generate_image")]
#[command(about = "Generate one icon or logo and write it to the output directory")]
struct Args {
    /// What to draw
    prompt: String,

    /// icon or logo
    #[arg(long, short, default_value = "icon", value_parser = parse_kind)]
    kind: ImageKind,

    /// Rewrite the prompt through the text completion API first
    #[arg(long)]
    enhance: bool,

    #[command(flatten)]
    options: CliOptions,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    setup_logging(args.options.debug).map_err(|err| anyhow!(err))?;
    let prompt = args.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(anyhow!("prompt must not be empty"));
    }

    let config = AppConfig::from_cli(args.options).context("Invalid configuration")?;
    let store = ArtifactStore::new(&config.storage);
    store
        .ensure_directories()
        .await
        .context("Failed to create output directories")?;

    let generator = Generator::new(&config, store.clone())?;
    let report = generator
        .generate(GenerationRequest {
            prompt,
            kind: args.kind,
            enhance: args.enhance,
        })
        .await;
    let result = report.outcome?;

    if let Some(enhanced) = &result.enhanced_prompt {
        println!("Enhanced prompt: {enhanced}");
    }
    println!("Final prompt:    {}", result.final_prompt);
    println!(
        "Image:           {} ({}x{}, {} bytes)",
        store.processed_path(&result.image.filename).display(),
        result.dimensions.width,
        result.dimensions.height,
        result.image.size
    );
    println!(
        "Original:        {} ({} bytes)",
        store.original_path(&result.original.filename).display(),
        result.original.size
    );
    println!("Took {}ms", report.timings.total_ms);
    Ok(())
}
