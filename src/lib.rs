pub mod config;
pub mod dataset;
pub mod error;
pub mod framework;
pub mod inference;
pub mod tools;
pub mod validation;

pub use config::ToolConfig;
pub use dataset::{DatasetLayout, DatasetListing, DatasetSpec, SplitResult, train_valid_split};
pub use error::{ToolError, ToolResult};
pub use framework::Framework;
pub use inference::{
    CommandDetector, DetectionResult, Detector, FileDetections, InferenceError, InferenceService,
    PredictRequest, PredictResponse,
};
