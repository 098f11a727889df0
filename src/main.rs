use std::path::PathBuf;
use std::sync::Arc;

use base64::{Engine, prelude::BASE64_STANDARD};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use yolokit::config::{ToolConfig, default_output_dir};
use yolokit::inference::server::{self, HttpState};
use yolokit::inference::{CommandDetector, InferenceService, PredictRequest};
use yolokit::tools::{
    BatchPredictOptions, FinetuneOptions, PrepareOptions, batch_predict, finetune, optional_path,
    prepare_dataset,
};

#[derive(Parser)]
#[command(name = "yolokit")]
#[command(about = "Prepare datasets, train and run a YOLOv5 object detector")]
struct Cli {
    /// Path to the YAML config file (defaults to yolokit.yaml next to the executable)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a labelled dataset and split it into training and validation sets
    Prepare(PrepareArgs),
    /// Fine-tune a pre-trained model on a prepared dataset
    Finetune(FinetuneArgs),
    /// Run the trained model over a directory of test images
    BatchPredict(BatchPredictArgs),
    /// Serve the inference endpoint over HTTP
    Serve(ServeArgs),
    /// Run the inference endpoint logic once on local files
    Predict(PredictArgs),
}

#[derive(Args)]
struct PrepareArgs {
    /// Directory containing both images and labels
    #[arg(long = "data_dir", value_name = "DIR")]
    data_dir: Option<String>,

    /// Directory containing images
    #[arg(long = "image_dir", value_name = "DIR")]
    image_dir: Option<String>,

    /// Directory containing labels/annotations
    #[arg(long = "label_dir", value_name = "DIR")]
    label_dir: Option<String>,

    /// .txt or .csv file containing class names
    #[arg(long = "class_file", value_name = "FILE")]
    class_file: PathBuf,

    /// Where to write the prepared dataset
    #[arg(long = "output_dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Fraction of the dataset held out for validation
    #[arg(long = "valid_size", default_value_t = 0.1)]
    valid_size: f64,
}

#[derive(Args)]
struct FinetuneArgs {
    /// Pre-trained model weights
    #[arg(long = "model_weights", default_value = "yolov5s.pt")]
    model_weights: String,

    /// Training image size in pixels
    #[arg(long = "img_size", default_value_t = 640)]
    img_size: u32,

    #[arg(long = "batch_size", default_value_t = 16)]
    batch_size: u32,

    #[arg(long = "num_epochs", default_value_t = 5)]
    num_epochs: u32,

    /// Where to write training runs
    #[arg(long = "output_dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

#[derive(Args)]
struct BatchPredictArgs {
    /// Directory containing test images
    #[arg(long = "test_dir", value_name = "DIR")]
    test_dir: PathBuf,

    /// Minimum confidence of reported detections
    #[arg(long = "conf_threshold", default_value_t = 0.25)]
    conf_threshold: f64,

    /// Where to write detection runs
    #[arg(long = "output_dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: String,
}

#[derive(Args)]
struct PredictArgs {
    /// Image or video files to run detection on
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn inference_service(config: &ToolConfig) -> anyhow::Result<InferenceService> {
    let inference_config = config.inference()?;
    let detector = Arc::new(CommandDetector::new(config.framework.clone()));
    let service = InferenceService::from_config(inference_config, detector);
    tracing::info!("Using model {:?}", service.model_path());
    Ok(service)
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = ToolConfig::load_or_default(args.config.as_deref())?;

    match args.command {
        Command::Prepare(prepare) => {
            let options = PrepareOptions {
                data_dir: optional_path(prepare.data_dir.as_deref()),
                image_dir: optional_path(prepare.image_dir.as_deref()),
                label_dir: optional_path(prepare.label_dir.as_deref()),
                class_file: prepare.class_file,
                output_dir: prepare.output_dir.unwrap_or_else(default_output_dir),
                valid_size: prepare.valid_size,
            };
            let summary = prepare_dataset(&options, &config.prepare)?;
            println!("{}", summary);
        }
        Command::Finetune(train) => {
            let options = FinetuneOptions {
                model_weights: train.model_weights,
                img_size: train.img_size,
                batch_size: train.batch_size,
                num_epochs: train.num_epochs,
                output_dir: train.output_dir.unwrap_or_else(default_output_dir),
            };
            finetune(&options, &config)?;
        }
        Command::BatchPredict(predict) => {
            let options = BatchPredictOptions {
                test_dir: predict.test_dir,
                conf_threshold: predict.conf_threshold,
                output_dir: predict.output_dir.unwrap_or_else(default_output_dir),
            };
            batch_predict(&options, &config)?;
        }
        Command::Serve(serve) => {
            let state = HttpState {
                service: Arc::new(inference_service(&config)?),
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(server::serve(&serve.addr, state))?;
        }
        Command::Predict(predict) => {
            let service = inference_service(&config)?;
            let media = predict
                .files
                .iter()
                .map(|path| {
                    std::fs::read(path)
                        .map(|bytes| BASE64_STANDARD.encode(bytes))
                        .map_err(|e| anyhow::anyhow!("Failed to read {:?}: {}", path, e))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let response = service.predict(&PredictRequest { media })?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
