//! Published model listing.

use anyhow::{Context, Result};
use colored::Colorize;
use rlflow_training::PublishedModelRegistry;
use std::path::Path;

pub fn execute(root: &Path, json_output: bool) -> Result<()> {
    let registry = PublishedModelRegistry::for_root(root);
    let models = registry.list().context("Failed to read published model registry")?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Published Models ({})", models.len()).bold().cyan());
    println!();

    if models.is_empty() {
        println!("  {}", "No published models found.".dimmed());
        println!();
        let tip = "Tip: add a [publisher] section with type = \"file_system\" \
                   to the pipeline config.";
        println!("  {}", tip.dimmed());
        return Ok(());
    }

    println!("{:<16} {:<16} {:<38} {}", "Module", "Model Type", "Entity", "Path");
    println!("{}", "─".repeat(100));
    for m in models {
        println!(
            "{:<16} {:<16} {:<38} {}",
            m.module_name.cyan(),
            m.model_type,
            m.entity_id.to_string().dimmed(),
            m.path.display().to_string().dimmed()
        );
    }
    println!();
    Ok(())
}
