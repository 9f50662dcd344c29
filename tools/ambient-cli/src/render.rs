//! Render command - run the external renderer per material
//!
//! The configured `render_command` is a template. Each whitespace-separated
//! token has `{material_dir}`, `{material}` and `{output}` substituted, so
//! substituted paths containing spaces stay a single argument.

use std::path::{Path, PathBuf};
use std::process::Command;

use ambientproc_core::{HistoryCache, MissingCapability, PackConfig, list_materials};
use anyhow::{Context, Result};
use clap::Args;

/// Rendered channel produced by this command.
pub const CANONICAL_RENDER: &str = "canonical_render";

#[derive(Args)]
pub struct RenderArgs {
    /// Render only this material, ignoring the render history
    #[arg(short, long)]
    pub material: Option<String>,

    /// Directory for the single-material render (defaults to the material directory)
    #[arg(short, long, requires = "material")]
    pub output_dir: Option<PathBuf>,
}

pub fn execute(config: &PackConfig, missing: &[MissingCapability], args: RenderArgs) -> Result<()> {
    let template = config
        .render_command
        .as_deref()
        .context("No render_command configured")?;
    if let Some(problem) = missing.iter().find(|m| {
        matches!(
            m,
            MissingCapability::DatasetDir(_) | MissingCapability::RenderProgram(_)
        )
    }) {
        anyhow::bail!("Cannot render: {}", problem);
    }

    let dataset = config.dataset_path();
    let ext = &config.render_extension;

    if let Some(name) = args.material {
        let material_dir = dataset.join(&name);
        if !material_dir.is_dir() {
            anyhow::bail!("Material not found: {}", material_dir.display());
        }
        let output = match args.output_dir {
            Some(dir) => {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
                dir.join(format!("{name}.{ext}"))
            }
            None => material_dir.join(format!("{CANONICAL_RENDER}.{ext}")),
        };
        render_material(template, &material_dir, &name, &output)?;
        println!("Rendered {}", output.display());
        return Ok(());
    }

    let history_path = config.render_history_path();
    let mut history = HistoryCache::load(&history_path)
        .with_context(|| format!("Failed to read history: {}", history_path.display()))?;

    let mut rendered = 0;
    let mut failed = 0;
    for material_dir in list_materials(&dataset)? {
        let Some(name) = material_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if history.contains(name) {
            continue;
        }
        let output = material_dir.join(format!("{CANONICAL_RENDER}.{ext}"));
        match render_material(template, &material_dir, name, &output) {
            Ok(()) => {
                history.record(name).with_context(|| {
                    format!("Failed to update history: {}", history_path.display())
                })?;
                tracing::info!(material = %name, "Rendered");
                rendered += 1;
            }
            Err(e) => {
                tracing::warn!(material = %name, error = %format!("{e:#}"), "Render failed");
                failed += 1;
            }
        }
    }

    println!(
        "Rendered {} materials ({} failed, {} previously rendered)",
        rendered,
        failed,
        history.len() - rendered
    );
    Ok(())
}

fn render_material(template: &str, material_dir: &Path, name: &str, output: &Path) -> Result<()> {
    let argv = expand_template(template, material_dir, name, output);
    let Some((program, program_args)) = argv.split_first() else {
        anyhow::bail!("Empty render command");
    };

    let status = Command::new(program)
        .args(program_args)
        .status()
        .with_context(|| format!("Failed to execute render command: {}", program))?;
    if !status.success() {
        anyhow::bail!(
            "Render command failed (exit code: {})",
            status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
    }
    if !output.is_file() {
        anyhow::bail!("Render command did not produce {}", output.display());
    }
    Ok(())
}

/// Split `template` on whitespace and substitute placeholders per token.
pub fn expand_template(
    template: &str,
    material_dir: &Path,
    name: &str,
    output: &Path,
) -> Vec<String> {
    let material_dir = material_dir.to_string_lossy();
    let output = output.to_string_lossy();
    template
        .split_whitespace()
        .map(|token| {
            token
                .replace("{material_dir}", &material_dir)
                .replace("{material}", name)
                .replace("{output}", &output)
        })
        .collect()
}
