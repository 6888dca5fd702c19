//! Training command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use rlflow_models::RewardModelManager;
use rlflow_training::{
    DataSetupResolver, NoopProgressSink, PipelineConfig, ProgressSink, QueryAndTrainOptions,
    StdoutProgressSink, TrainingLayout, TrainingOrchestrator, detect_gpu,
};
use std::path::PathBuf;
use std::sync::Arc;

pub struct TrainArgs {
    pub config: PathBuf,
    pub table: Option<PathBuf>,
    pub epochs: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub json: bool,
}

fn load_config(args: &TrainArgs) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load pipeline config {}", args.config.display()))?;

    if let Some(table) = &args.table {
        config.table.path = Some(table.clone());
    }
    if let Some(epochs) = args.epochs {
        config.training.num_epochs = epochs;
    }
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }
    config.validate().context("Invalid pipeline config after applying overrides")?;
    Ok(config)
}

pub async fn execute(args: TrainArgs) -> Result<()> {
    let config = load_config(&args)?;

    let layout = TrainingLayout::new(config.output_dir.clone());
    let manager = RewardModelManager::new(layout, config.model.clone());
    let progress: Arc<dyn ProgressSink> = if args.json {
        Arc::new(NoopProgressSink)
    } else {
        Arc::new(StdoutProgressSink)
    };
    let orchestrator = TrainingOrchestrator::new().with_progress_sink(progress);

    let resolved = DataSetupResolver::new(&manager, &config.table, &config.reward, &config.reader)
        .identify()
        .await
        .context("Failed to prepare training data")?;

    let use_gpu = config.training.use_gpu.unwrap_or_else(detect_gpu);
    let output = orchestrator
        .query_and_train(
            &config.table,
            &manager,
            config.training.num_epochs,
            use_gpu,
            QueryAndTrainOptions {
                data: resolved.into(),
                reward_options: Some(config.reward.clone()),
                reader_options: Some(config.reader.clone()),
                resource_options: Some(config.resources.clone()),
                warmstart_path: config.training.warmstart_path.clone(),
                validator: config.validator.as_ref().map(|v| v.build()),
                publisher: config.publisher.as_ref().map(|p| p.build()),
                named_model_ids: None,
                recurring_period: config.recurring_period.clone(),
            },
        )
        .await
        .context("Training pipeline failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let fmt_loss = |loss: Option<f64>| loss.map_or_else(|| "-".to_string(), |l| format!("{l:.6}"));
    println!();
    println!("{}", "Training complete".bold().green());
    println!("  Table:      {}", config.table.table_name.cyan());
    println!("  Loss:       {}", config.model.loss);
    println!("  Train loss: {}", fmt_loss(output.metrics.train_loss));
    println!("  Eval loss:  {}", fmt_loss(output.metrics.eval_loss));
    for (module, path) in &output.output_paths {
        println!("  {:<11} {}", format!("{module}:"), path.display().to_string().dimmed());
    }
    if let Some(validation) = &output.validation_result {
        let verdict = if validation.should_publish {
            "publish".green()
        } else {
            "rejected".yellow()
        };
        println!("  Validation: {verdict}");
    }
    if let Some(publishing) = &output.publishing_result {
        let status = if publishing.success {
            "ok".green()
        } else {
            "skipped".yellow()
        };
        println!("  Publisher:  {} ({status})", publishing.publisher);
    }
    println!();
    Ok(())
}
