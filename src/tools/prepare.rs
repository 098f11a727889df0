use std::path::PathBuf;

use crate::config::PrepareConfig;
use crate::dataset::{
    DatasetLayout, DatasetListing, IMAGE_FORMATS, SourceDirs, SplitResult, list_dataset,
    read_classes, train_valid_split,
};
use crate::validation::{validate_arguments, validate_dataset};

/// Inputs of the dataset preparation tool.
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub data_dir: Option<PathBuf>,
    pub image_dir: Option<PathBuf>,
    pub label_dir: Option<PathBuf>,
    pub class_file: PathBuf,
    pub output_dir: PathBuf,
    pub valid_size: f64,
}

#[derive(Debug, Clone)]
pub struct PrepareSummary {
    pub dataset_root: PathBuf,
    pub dataset_config: PathBuf,
    pub split: SplitResult,
    pub classes: Vec<String>,
}

impl std::fmt::Display for PrepareSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Prepared {} training and {} validation samples ({} classes) in {}\nDataset config: {}",
            self.split.train_len(),
            self.split.valid_len(),
            self.classes.len(),
            self.dataset_root.display(),
            self.dataset_config.display()
        )
    }
}

/// Validate, split and lay out a dataset for training.
pub fn prepare_dataset(options: &PrepareOptions, config: &PrepareConfig) -> anyhow::Result<PrepareSummary> {
    let data_dir = options.data_dir.as_deref();
    let image_dir = options.image_dir.as_deref();
    let label_dir = options.label_dir.as_deref();

    validate_arguments(data_dir, image_dir, label_dir, &options.class_file, options.valid_size)?;

    let classes = read_classes(&options.class_file)?;
    let listing = list_dataset(data_dir, image_dir, label_dir)?;
    let (images, labels) = validate_dataset(&listing, &IMAGE_FORMATS, &classes)?;
    tracing::info!("Found {} image/label pairs and {} classes", images.len(), classes.len());

    let split = train_valid_split(images, labels, options.valid_size)?;
    tracing::info!(
        "Split dataset into {} training and {} validation samples",
        split.train_len(),
        split.valid_len()
    );

    // validate_arguments guarantees one of these combinations is set.
    let (Some(source_images), Some(source_labels)) = (
        DatasetListing::image_dir(data_dir, image_dir),
        DatasetListing::label_dir(data_dir, label_dir),
    ) else {
        anyhow::bail!("No image or label directory to copy from");
    };
    let sources = SourceDirs {
        images: source_images.to_path_buf(),
        labels: source_labels.to_path_buf(),
    };

    let layout = DatasetLayout::new(options.output_dir.join(&config.dataset_dir_name));
    let copied = layout.materialize(&sources, &split)?;
    tracing::debug!("Copied {} files into {:?}", copied, layout.root());

    let visible_root = config.dataset_root.as_deref().unwrap_or(layout.root());
    let dataset_config = layout.root().join(&config.dataset_config_name);
    layout.spec(visible_root, &classes).write(&dataset_config)?;
    tracing::info!("Wrote dataset config {:?}", dataset_config);

    Ok(PrepareSummary {
        dataset_root: layout.root().to_path_buf(),
        dataset_config,
        split,
        classes,
    })
}
