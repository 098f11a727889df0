use std::path::PathBuf;

use crate::config::ToolConfig;
use crate::framework::{self, TrainArgs};
use crate::validation::validate_file_locations;

#[derive(Debug, Clone)]
pub struct FinetuneOptions {
    pub model_weights: String,
    pub img_size: u32,
    pub batch_size: u32,
    pub num_epochs: u32,
    pub output_dir: PathBuf,
}

impl FinetuneOptions {
    /// Training arguments for the dataset config at `data`.
    pub fn train_args(&self, data: PathBuf, project_name: &str) -> TrainArgs {
        TrainArgs {
            weights: self.model_weights.clone(),
            img_size: self.img_size,
            batch_size: self.batch_size,
            epochs: self.num_epochs,
            data,
            project: self.output_dir.join(project_name),
        }
    }
}

/// Move the prepared dataset into the framework's reach and train on it.
pub fn finetune(options: &FinetuneOptions, config: &ToolConfig) -> anyhow::Result<()> {
    let finetune_config = config.finetune()?;
    validate_file_locations(
        &finetune_config.images_loc,
        &finetune_config.labels_loc,
        &finetune_config.config_loc,
    )?;

    framework::move_data_files(finetune_config)?;

    let args = options.train_args(finetune_config.config_loc_new.clone(), &finetune_config.project_name);
    tracing::info!(
        "Training from {} for {} epochs (batch {}, image size {})",
        args.weights,
        args.epochs,
        args.batch_size,
        args.img_size
    );
    framework::run(config.framework.train_command(&args))?;
    tracing::info!("Training finished, results in {:?}", args.project);
    Ok(())
}
