//! Pack command - build the record store from the dataset

use ambientproc_core::{MissingCapability, PackConfig, build_store};
use anyhow::{Context, Result};
use clap::Args;

#[derive(Args)]
pub struct PackArgs {
    /// Replace an existing store instead of updating it in place
    #[arg(long)]
    pub rebuild: bool,
}

pub fn execute(config: &PackConfig, missing: &[MissingCapability], args: PackArgs) -> Result<()> {
    if let Some(problem) = missing
        .iter()
        .find(|m| !matches!(m, MissingCapability::RenderProgram(_)))
    {
        anyhow::bail!("Cannot pack: {}", problem);
    }

    let options = config.build_options(args.rebuild);
    println!(
        "Packing {} -> {} ({} {}, {} per material)",
        options.dataset_dir.display(),
        options.store_path.display(),
        config.fitting_method,
        options.resolution,
        options.samples_per_material
    );

    let report = build_store(&options)
        .with_context(|| format!("Failed to build store: {}", options.store_path.display()))?;

    println!(
        "Packed {} materials into {} records",
        report.materials_packed, report.records_written
    );
    if !report.skipped.is_empty() {
        println!("Skipped {} materials:", report.skipped.len());
        for skipped in &report.skipped {
            println!("  {}: {}", skipped.material, skipped.reason);
        }
    }
    Ok(())
}
