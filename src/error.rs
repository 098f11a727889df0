use std::path::PathBuf;

use thiserror::Error;

/// Named precondition failures raised by the tools.
///
/// Each variant is an expected, caller-handled condition. Messages start with
/// the condition name so they read the same in logs and on the terminal.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("NoneDatasetError: No dataset provided. The data, image and label directories cannot all be None!")]
    NoneDataset,

    #[error("DatasetPathError: The images directory or label directory cannot be None!")]
    DatasetPath,

    #[error("ClassFileFormatError: The classes file needs to be in txt or csv format!")]
    ClassFileFormat,

    #[error("ValidationSizeError: {0} is an invalid validation size. Validation size needs to be a value between 0.0 and 0.4!")]
    ValidationSize(f64),

    #[error("ConfidenceRangeError: {0} is an invalid confidence threshold. Confidence needs to be a value strictly between 0 and 1!")]
    ConfidenceRange(f64),

    #[error("DatasetSizeError: The number of images should be equal to number of labels/annotations. Your dataset contains {images} images and {labels} labels")]
    DatasetSize { images: usize, labels: usize },

    #[error("DatasetNamingError: No label found for image {0}. Images and labels should have the same file names without extensions!")]
    DatasetNaming(String),

    #[error("DatasetNamingError: No image found for label {0}. Images and labels should have the same file names without extensions!")]
    OrphanLabel(String),

    #[error("NumberOfClassesError: The classes file needs to define at least one class!")]
    NumberOfClasses,

    #[error("ModelNotFoundError: The model file does not exist at {}. Please check the previous library!", .0.display())]
    ModelNotFound(PathBuf),

    #[error("ConfigNotFoundError: The dataset config file does not exist at {}. Please check the previous library!", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("DirectoryNotFoundError: The required directory does not exist at {}. Please check the previous library!", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("SplitTooSmallError: A validation size of {valid_size} over {samples} samples leaves the training or validation set empty")]
    SplitTooSmall { samples: usize, valid_size: f64 },

    #[error("CommandFailedError: The command returned exit code {0}. Exit code cannot be non-zero!")]
    CommandFailed(i32),
}

pub type ToolResult<T> = Result<T, ToolError>;
