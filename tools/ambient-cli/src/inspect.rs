//! Inspect command - summarize a built store

use ambientproc_core::{PackConfig, ReaderOptions, StoreReader};
use anyhow::{Context, Result};
use clap::Args;

#[derive(Args)]
pub struct InspectArgs {
    /// Show the channel layout of this record
    #[arg(short, long)]
    pub key: Option<String>,

    /// Number of keys to list
    #[arg(long, default_value = "10")]
    pub head: usize,
}

pub fn execute(config: &PackConfig, args: InspectArgs) -> Result<()> {
    let store_path = config.store_path();
    let reader = StoreReader::open_with(&store_path, ReaderOptions::default(), config.catalog())
        .with_context(|| format!("Failed to open store: {}", store_path.display()))?;

    println!("Store: {}", store_path.display());
    println!("  Records: {}", reader.len());
    match reader.meta() {
        Some(meta) => println!("  Meta: {}", serde_json::to_string_pretty(meta)?),
        None => println!("  Meta: (none)"),
    }

    if let Some(key) = args.key {
        let record = reader
            .fetch_record(&key)
            .with_context(|| format!("Failed to read record '{}'", key))?;
        println!("Record {}:", key);
        for field in &record.fields {
            println!(
                "  {:<20} {} x {} x {}",
                field.name, field.channels, field.height, field.width
            );
        }
        return Ok(());
    }

    for key in reader.keys().iter().take(args.head) {
        println!("  {}", key);
    }
    if reader.len() > args.head {
        println!("  ... {} more", reader.len() - args.head);
    }
    Ok(())
}
