use anyhow::{Context, Result};
use std::path::PathBuf;

use super::EngineArgs;

pub fn run(args: &EngineArgs, output: PathBuf) -> Result<()> {
    // The written manifest must reflect the directories, not a previous manifest.
    let engine = args
        .builder()?
        .skip_manifest()
        .build()
        .context("Failed to scan data directories")?;

    engine
        .export_manifest(&output)
        .with_context(|| format!("Failed to write manifest {}", output.display()))?;

    println!(
        "Wrote {} tiles to {}",
        engine.index().len(),
        output.display()
    );
    Ok(())
}
