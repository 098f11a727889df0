use std::path::PathBuf;

use crate::config::ToolConfig;
use crate::framework::{self, DetectArgs};
use crate::validation::{validate_confidence, validate_directory, validate_model_location};

#[derive(Debug, Clone)]
pub struct BatchPredictOptions {
    pub test_dir: PathBuf,
    pub conf_threshold: f64,
    pub output_dir: PathBuf,
}

/// Run detection over a directory of test images with the trained model.
pub fn batch_predict(options: &BatchPredictOptions, config: &ToolConfig) -> anyhow::Result<()> {
    let predict_config = config.batch_predict()?;
    validate_model_location(&predict_config.model_loc)?;
    validate_confidence(options.conf_threshold)?;
    validate_directory(&options.test_dir)?;

    let mut args = DetectArgs::new(&predict_config.model_loc, &options.test_dir);
    args.project = Some(options.output_dir.join(&predict_config.project_name));
    args.conf_threshold = Some(options.conf_threshold);
    args.hide_conf = true;

    framework::run(config.framework.detect_command(&args))?;
    tracing::info!("Detection finished, results in {:?}", args.project);
    Ok(())
}
