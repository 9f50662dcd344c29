//! Check command - print resolved paths and preflight results

use ambientproc_core::{MissingCapability, PackConfig};
use anyhow::Result;

pub fn execute(config: &PackConfig, missing: &[MissingCapability]) -> Result<()> {
    println!("Config OK");
    println!("  Dataset:    {}", config.dataset_path().display());
    println!("  Cache:      {}", config.cache_path().display());
    println!("  Store:      {}", config.store_path().display());
    println!(
        "  Fitting:    {} to {}",
        config.fitting_method,
        config.resolution()
    );
    println!("  Samples:    {} per material", config.generate_data_per_sample);
    println!("  Rendered:   {}", config.use_rendered_types.join(", "));
    println!("  Channels:   {}", config.use_data_types.join(", "));

    if missing.is_empty() {
        println!("All checks passed");
        return Ok(());
    }

    println!("Problems:");
    for problem in missing {
        println!("  - {}", problem);
    }
    anyhow::bail!("{} check(s) failed", missing.len())
}
