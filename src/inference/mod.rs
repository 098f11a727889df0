pub mod detector;
pub mod media;
pub mod server;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempdir::TempDir;
use thiserror::Error;
use uuid::Uuid;

use crate::config::InferenceConfig;
pub use detector::{CommandDetector, Detector};
pub use media::{Media, MediaKind};

/// One detection as reported by the framework. Passed through untouched.
pub type DetectionRecord = serde_json::Map<String, serde_json::Value>;

/// Per-file detector output: detections grouped by class, and the number of
/// detections per class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileDetections(
    pub BTreeMap<String, Vec<DetectionRecord>>,
    pub BTreeMap<String, u64>,
);

impl FileDetections {
    pub fn records(&self) -> &BTreeMap<String, Vec<DetectionRecord>> {
        &self.0
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.1
    }

    /// Records of each class followed by that class's count record.
    pub fn flatten(&self) -> Vec<OutputEntry> {
        let mut output = Vec::new();
        for (class, records) in self.records() {
            output.extend(records.iter().cloned().map(OutputEntry::Detection));
            let object_count = self
                .counts()
                .get(class)
                .copied()
                .unwrap_or(records.len() as u64);
            output.push(OutputEntry::Count(ObjectCount {
                object: class.clone(),
                object_count,
            }));
        }
        output
    }
}

/// Detector output keyed by the source file it was produced from.
pub type DetectionResult = BTreeMap<String, FileDetections>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictRequest {
    pub media: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectCount {
    pub object: String,
    pub object_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputEntry {
    Detection(DetectionRecord),
    Count(ObjectCount),
    /// Entries of one input file, keyed by its file name.
    File(BTreeMap<String, Vec<OutputEntry>>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictResponse {
    pub output: Vec<OutputEntry>,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("The request contains no media")]
    EmptyRequest,

    #[error("Media item {index} is not valid base64: {source}")]
    InvalidPayload {
        index: usize,
        source: base64::DecodeError,
    },

    #[error("Uploaded image could not be decoded: {0}")]
    UndecodableImage(image::ImageError),

    #[error("Failed to store uploaded media: {0:#}")]
    Storage(anyhow::Error),

    #[error("Detection failed: {0:#}")]
    Detection(anyhow::Error),

    #[error("Detector returned no result for {0}")]
    MissingResult(String),
}

/// Turns uploaded media into detection responses.
pub struct InferenceService {
    model_path: PathBuf,
    test_file_name: String,
    work_dir: PathBuf,
    detector: Arc<dyn Detector>,
}

impl std::fmt::Debug for InferenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceService")
            .field("model_path", &self.model_path)
            .field("work_dir", &self.work_dir)
            .field("detector", &self.detector.name())
            .finish()
    }
}

impl InferenceService {
    pub fn new(
        model_path: PathBuf,
        test_file_name: impl Into<String>,
        work_dir: PathBuf,
        detector: Arc<dyn Detector>,
    ) -> Self {
        Self {
            model_path,
            test_file_name: test_file_name.into(),
            work_dir,
            detector,
        }
    }

    pub fn from_config(config: &InferenceConfig, detector: Arc<dyn Detector>) -> Self {
        Self::new(
            config.resolve_model_path(),
            config.test_file_name.clone(),
            config.resolve_work_dir(),
            detector,
        )
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, InferenceError> {
        let media = request
            .media
            .iter()
            .enumerate()
            .map(|(index, payload)| Media::decode(index, payload))
            .collect::<Result<Vec<_>, _>>()?;

        match media.len() {
            0 => Err(InferenceError::EmptyRequest),
            1 => self.predict_single(&media[0]),
            _ => self.predict_many(&media),
        }
    }

    /// One upload: images produce a flat output, videos one entry per result
    /// file. The stored upload is removed afterwards.
    fn predict_single(&self, media: &Media) -> Result<PredictResponse, InferenceError> {
        if media.kind == MediaKind::Unsupported {
            tracing::warn!("Ignoring upload of unsupported type ({} bytes)", media.bytes.len());
            return Ok(PredictResponse::default());
        }

        fs::create_dir_all(&self.work_dir)
            .map_err(|e| InferenceError::Storage(e.into()))?;
        let path = self.work_dir.join(format!(
            "{}-{}.{}",
            self.test_file_name,
            Uuid::new_v4(),
            media.extension
        ));
        if let Err(e) = media.save(&path) {
            remove_upload(&path);
            return Err(e);
        }

        let detected = self.detector.detect(&self.model_path, &path);
        remove_upload(&path);
        let result = detected.map_err(InferenceError::Detection)?;

        let output = match media.kind {
            MediaKind::Image => {
                let key = path.to_string_lossy().into_owned();
                let file = lookup_single(&result, &key)
                    .ok_or(InferenceError::MissingResult(key))?;
                file.flatten()
            }
            _ => result.iter().map(|(name, file)| per_file(name, file)).collect(),
        };
        Ok(PredictResponse { output })
    }

    /// Several uploads: stored together in a temporary directory that is
    /// removed once the response is built. Output is nested per file.
    fn predict_many(&self, media: &[Media]) -> Result<PredictResponse, InferenceError> {
        fs::create_dir_all(&self.work_dir)
            .map_err(|e| InferenceError::Storage(e.into()))?;
        let dir = TempDir::new_in(&self.work_dir, "yolokit-predict")
            .map_err(|e| InferenceError::Storage(e.into()))?;

        for (index, item) in media.iter().enumerate() {
            let path = dir.path().join(format!("{:02}-{}.{}", index + 1, Uuid::new_v4(), item.extension));
            // `dir` is removed on drop.
            item.save(&path)?;
        }

        let result = self
            .detector
            .detect(&self.model_path, dir.path())
            .map_err(InferenceError::Detection);

        let dir_path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            tracing::warn!("Failed to remove {:?}: {}", dir_path, e);
        }

        let output = result?
            .iter()
            .map(|(name, file)| per_file(name, file))
            .collect();
        Ok(PredictResponse { output })
    }
}

fn remove_upload(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to remove {:?}: {}", path, e);
        }
    }
}

/// The entry for `key`, or the only entry when the detector reported the
/// source under a different spelling.
fn lookup_single<'a>(result: &'a DetectionResult, key: &str) -> Option<&'a FileDetections> {
    result
        .get(key)
        .or_else(|| (result.len() == 1).then(|| result.values().next()).flatten())
}

fn per_file(name: &str, file: &FileDetections) -> OutputEntry {
    let file_name = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    OutputEntry::File(BTreeMap::from([(file_name, file.flatten())]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> DetectionRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn flatten_appends_count_after_each_class() {
        let file = FileDetections(
            BTreeMap::from([
                ("bus".to_string(), vec![record(json!({"object": "bus", "confidence": 0.9}))]),
                (
                    "person".to_string(),
                    vec![record(json!({"object": "person"})), record(json!({"object": "person"}))],
                ),
            ]),
            BTreeMap::from([("bus".to_string(), 1), ("person".to_string(), 2)]),
        );

        let value = serde_json::to_value(file.flatten()).unwrap();
        assert_eq!(
            value,
            json!([
                {"object": "bus", "confidence": 0.9},
                {"object": "bus", "object_count": 1},
                {"object": "person"},
                {"object": "person"},
                {"object": "person", "object_count": 2},
            ])
        );
    }

    #[test]
    fn detector_output_parses_from_pairs() {
        let raw = r#"{"/tmp/a.jpg": [{"dog": [{"object": "dog"}]}, {"dog": 1}]}"#;
        let result: DetectionResult = serde_json::from_str(raw).unwrap();
        let file = &result["/tmp/a.jpg"];
        assert_eq!(file.counts()["dog"], 1);
        assert_eq!(file.records()["dog"].len(), 1);
    }

    #[test]
    fn per_file_uses_file_name() {
        let entry = per_file("/tmp/x/01-abc.mp4", &FileDetections::default());
        assert_eq!(serde_json::to_value(entry).unwrap(), json!({"01-abc.mp4": []}));
    }
}
