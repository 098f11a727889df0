mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from yolokit for tests
pub use yolokit::dataset::{DatasetListing, SplitResult, train_valid_split};
pub use yolokit::inference::{
    DetectionRecord, DetectionResult, Detector, FileDetections, InferenceError, InferenceService,
    PredictRequest,
};
pub use yolokit::ToolError;
