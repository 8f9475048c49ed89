mod allocation;
mod config;
mod errors;
mod extract;
mod items;
mod manual;
mod ocr_remote;
mod pdf_extract;
mod people;
mod plan;
mod receipt;
mod report;
mod scanner;
mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use extract::{ReceiptExtractor, ReceiptImage};
use plan::SplitPlan;
use scanner::Scanner;
use session::Session;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
    #[arg(short, long, default_value = "bill-split.toml")]
    config: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a receipt and print the items and amounts found on it
    Parse { file: PathBuf },
    /// Apply a split plan and print what everyone owes
    Split {
        plan: PathBuf,
        #[arg(short, long)]
        json: bool,
    },
}

/// Run the receipt through the configured extractor and wait for its text.
async fn read_receipt(cfg: &Config, path: &Path) -> Result<(ReceiptImage, String), Box<dyn std::error::Error>> {
    let image = ReceiptImage::load(path).await?;
    let mut scanner = Scanner::new(Arc::new(ReceiptExtractor::from_config(&cfg.ocr)));
    let ticket = scanner.submit(image.clone());
    info!(status = %scanner.status(), "Extraction submitted");
    let result = scanner.wait(ticket).await;
    info!(status = %scanner.status(), "Extraction settled");
    Ok((image, result?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let cfg = Config::load_or_default(&args.config)?;

    // init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_filter));
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Parse { file } => {
            let (image, text) = read_receipt(&cfg, &file).await?;
            let mut session = Session::new();
            session.attach_image(image.fingerprint());
            let parsed = session.ingest_text(&text);
            let output = json!({
                "items": parsed.items,
                "summary": session.summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Split { plan: plan_path, json } => {
            let plan = SplitPlan::load(&plan_path)?;
            let mut session = Session::new();

            match plan.receipt_path(&plan_path) {
                Some(receipt) => {
                    let (image, text) = read_receipt(&cfg, &receipt).await?;
                    plan.run(&mut session, Some((image.fingerprint(), text.as_str())))?;
                }
                None => plan.run(&mut session, None)?,
            }

            let breakdown = session.breakdown();
            info!(
                people = breakdown.people.len(),
                allocated = breakdown.allocated,
                unassigned = breakdown.unassigned,
                "Split computed"
            );
            if json {
                let output = json!({
                    "summary": session.summary,
                    "breakdown": breakdown,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print!("{}", report::render_table(&breakdown, &session.summary, &cfg.currency));
            }
        }
    }

    Ok(())
}
