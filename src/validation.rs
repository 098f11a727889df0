use std::collections::HashSet;
use std::path::Path;

use crate::dataset::DatasetListing;
use crate::error::{ToolError, ToolResult};

/// Largest accepted validation fraction (inclusive).
pub const MAX_VALID_SIZE: f64 = 0.4;

/// Extensions accepted for the classes file.
const CLASS_FILE_EXTENSIONS: [&str; 2] = ["txt", "csv"];

/// Extension every label/annotation file carries.
pub const LABEL_EXTENSION: &str = "txt";

/// Check the dataset-related CLI arguments before touching the filesystem.
///
/// Exactly one of these has to hold: `data_dir` is set, or both `image_dir`
/// and `label_dir` are set.
pub fn validate_arguments(
    data_dir: Option<&Path>,
    image_dir: Option<&Path>,
    label_dir: Option<&Path>,
    class_file: &Path,
    valid_size: f64,
) -> ToolResult<()> {
    if data_dir.is_none() && image_dir.is_none() && label_dir.is_none() {
        return Err(ToolError::NoneDataset);
    }

    if data_dir.is_none() && (image_dir.is_none() != label_dir.is_none()) {
        return Err(ToolError::DatasetPath);
    }

    if !has_extension(class_file, &CLASS_FILE_EXTENSIONS) {
        return Err(ToolError::ClassFileFormat);
    }

    validate_valid_size(valid_size)
}

/// The validation fraction must lie in `(0.0, 0.4]`.
pub fn validate_valid_size(valid_size: f64) -> ToolResult<()> {
    if valid_size > 0.0 && valid_size <= MAX_VALID_SIZE {
        Ok(())
    } else {
        Err(ToolError::ValidationSize(valid_size))
    }
}

/// The confidence threshold must lie strictly inside `(0, 1)`.
pub fn validate_confidence(confidence: f64) -> ToolResult<()> {
    if confidence > 0.0 && confidence < 1.0 {
        Ok(())
    } else {
        Err(ToolError::ConfidenceRange(confidence))
    }
}

/// Filter a raw listing down to images and labels and check they pair up.
///
/// Returns `(images, labels)` in listing order. Every image must have a label
/// with the same basename and vice versa, and at least one class must be
/// defined.
pub fn validate_dataset(
    listing: &DatasetListing,
    image_formats: &[&str],
    classes: &[String],
) -> ToolResult<(Vec<String>, Vec<String>)> {
    let (image_candidates, label_candidates) = match listing {
        DatasetListing::Combined(files) => (files.as_slice(), files.as_slice()),
        DatasetListing::Separate { images, labels } => (images.as_slice(), labels.as_slice()),
    };

    let images: Vec<String> = image_candidates
        .iter()
        .filter(|file| has_extension(Path::new(file.as_str()), image_formats))
        .cloned()
        .collect();
    let labels: Vec<String> = label_candidates
        .iter()
        .filter(|file| has_extension(Path::new(file.as_str()), &[LABEL_EXTENSION]))
        .cloned()
        .collect();

    if images.len() != labels.len() {
        return Err(ToolError::DatasetSize {
            images: images.len(),
            labels: labels.len(),
        });
    }

    let label_stems: HashSet<&str> = labels.iter().map(|label| file_stem(label)).collect();
    if let Some(image) = images.iter().find(|image| !label_stems.contains(file_stem(image))) {
        return Err(ToolError::DatasetNaming(image.clone()));
    }

    // Equal counts plus one direction still allow two images sharing a stem.
    let image_stems: HashSet<&str> = images.iter().map(|image| file_stem(image)).collect();
    if let Some(label) = labels.iter().find(|label| !image_stems.contains(file_stem(label))) {
        return Err(ToolError::OrphanLabel(label.clone()));
    }

    if classes.is_empty() {
        return Err(ToolError::NumberOfClasses);
    }

    Ok((images, labels))
}

/// Trained weights have to exist before detection can run.
pub fn validate_model_location(model_path: &Path) -> ToolResult<()> {
    if !model_path.exists() {
        return Err(ToolError::ModelNotFound(model_path.to_path_buf()));
    }
    Ok(())
}

/// Check the outputs of the preparation step before training on them.
///
/// Directories are checked first, the dataset config last.
pub fn validate_file_locations(
    image_dir: &Path,
    label_dir: &Path,
    data_config: &Path,
) -> ToolResult<()> {
    validate_directory(image_dir)?;
    validate_directory(label_dir)?;

    if !data_config.exists() {
        return Err(ToolError::ConfigNotFound(data_config.to_path_buf()));
    }
    Ok(())
}

pub fn validate_directory(dir: &Path) -> ToolResult<()> {
    if !dir.exists() {
        return Err(ToolError::DirectoryNotFound(dir.to_path_buf()));
    }
    Ok(())
}

/// Case-insensitive match of the final extension against `extensions`.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|candidate| candidate.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// File name without its final extension.
pub fn file_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
}
