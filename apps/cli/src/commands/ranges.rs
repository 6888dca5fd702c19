//! Sample range preview.

use anyhow::{Context, Result};
use colored::Colorize;
use rlflow_training::compute_sample_ranges;

pub fn execute(
    table_sample: Option<f64>,
    eval_table_sample: Option<f64>,
    cpe: bool,
    json_output: bool,
) -> Result<()> {
    let ranges = compute_sample_ranges(table_sample, eval_table_sample, cpe)
        .context("Invalid sample split")?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&ranges)?);
        return Ok(());
    }

    println!();
    println!("{}", "Sample Ranges".bold().cyan());
    println!("  Train: {}", ranges.train_sample_range.to_string().green());
    if cpe {
        println!("  Eval:  {}", ranges.eval_sample_range.to_string().green());
    } else {
        let eval = format!(
            "{} (cross-partition evaluation disabled)",
            ranges.eval_sample_range
        );
        println!("  Eval:  {}", eval.dimmed());
    }
    println!();
    Ok(())
}
