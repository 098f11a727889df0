use std::fs;
use std::path::Path;

use anyhow::Context;
use tempdir::TempDir;

use super::DetectionResult;
use crate::framework::{self, DetectArgs, Framework};

/// Runs object detection on a file or directory of media.
pub trait Detector: Send + Sync {
    /// Detect objects in `source` with the model at `weights`. The result is
    /// keyed by each processed file.
    fn detect(&self, weights: &Path, source: &Path) -> anyhow::Result<DetectionResult>;

    /// Human-readable name (used in logs)
    fn name(&self) -> &str;
}

/// Detector backed by the framework's detection script, which writes its
/// per-file summary to a JSON file.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    framework: Framework,
}

impl CommandDetector {
    pub fn new(framework: Framework) -> Self {
        Self { framework }
    }
}

impl Detector for CommandDetector {
    fn detect(&self, weights: &Path, source: &Path) -> anyhow::Result<DetectionResult> {
        let scratch = TempDir::new("yolokit-detect")?;
        let result_path = scratch.path().join("result.json");

        let mut args = DetectArgs::new(weights, source);
        args.project = Some(scratch.path().join("runs"));
        args.result_json = Some(result_path.clone());

        framework::run(self.framework.detect_command(&args))?;

        let json = fs::read_to_string(&result_path)
            .with_context(|| format!("Detector wrote no result file at {:?}", result_path))?;
        let result = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse detection result {:?}", result_path))?;
        Ok(result)
    }

    fn name(&self) -> &str {
        "Framework Detection Script"
    }
}
