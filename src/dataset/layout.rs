use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::split::SplitResult;

const IMAGES_DIR_NAME: &str = "images";
const LABELS_DIR_NAME: &str = "labels";
const TRAIN_DIR_NAME: &str = "train";
const VALID_DIR_NAME: &str = "valid";

/// Where the unsplit images and labels currently live.
#[derive(Debug, Clone)]
pub struct SourceDirs {
    pub images: PathBuf,
    pub labels: PathBuf,
}

/// Dataset description consumed by the training framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub train: PathBuf,
    pub val: PathBuf,
    pub nc: usize,
    pub names: Vec<String>,
}

/// Conventional split layout:
///
/// ```text
/// <root>/images/train  <root>/images/valid
/// <root>/labels/train  <root>/labels/valid
/// ```
///
/// The framework finds each label by swapping `images` for `labels` in the
/// image path, so the two trees must mirror each other.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR_NAME)
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.root.join(LABELS_DIR_NAME)
    }

    pub fn train_images(&self) -> PathBuf {
        self.images_dir().join(TRAIN_DIR_NAME)
    }

    pub fn valid_images(&self) -> PathBuf {
        self.images_dir().join(VALID_DIR_NAME)
    }

    pub fn train_labels(&self) -> PathBuf {
        self.labels_dir().join(TRAIN_DIR_NAME)
    }

    pub fn valid_labels(&self) -> PathBuf {
        self.labels_dir().join(VALID_DIR_NAME)
    }

    /// Create the four split directories if they are missing.
    pub fn create_dirs(&self) -> anyhow::Result<()> {
        for dir in [
            self.train_images(),
            self.train_labels(),
            self.valid_images(),
            self.valid_labels(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory {:?}", dir))?;
        }
        Ok(())
    }

    /// Copy every file of `split` from `sources` into its split directory,
    /// keeping file names. Stops at the first failure; files copied so far
    /// stay in place.
    pub fn materialize(&self, sources: &SourceDirs, split: &SplitResult) -> anyhow::Result<usize> {
        self.create_dirs()?;

        let batches = [
            (&split.train_images, &sources.images, self.train_images()),
            (&split.valid_images, &sources.images, self.valid_images()),
            (&split.train_labels, &sources.labels, self.train_labels()),
            (&split.valid_labels, &sources.labels, self.valid_labels()),
        ];

        let mut copied = 0;
        for (files, source_dir, dest_dir) in batches {
            for file in files {
                let from = source_dir.join(file);
                let to = dest_dir.join(file);
                fs::copy(&from, &to)
                    .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
                copied += 1;
            }
            tracing::debug!("Copied {} files into {:?}", files.len(), dest_dir);
        }

        Ok(copied)
    }

    /// Describe this layout for the framework. `visible_root` is where the
    /// framework will see `root`, which differs when the data is moved.
    pub fn spec(&self, visible_root: &Path, classes: &[String]) -> DatasetSpec {
        let visible = DatasetLayout::new(visible_root);
        DatasetSpec {
            train: visible.train_images(),
            val: visible.valid_images(),
            nc: classes.len(),
            names: classes.to_vec(),
        }
    }
}

impl DatasetSpec {
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)
            .with_context(|| format!("Failed to write dataset config {:?}", path))?;
        Ok(())
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset config {:?}", path))?;
        let spec = serde_yaml::from_str(&yaml)
            .with_context(|| format!("Failed to parse dataset config {:?}", path))?;
        Ok(spec)
    }
}
