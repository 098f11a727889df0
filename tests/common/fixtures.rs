use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::{Engine, prelude::BASE64_STANDARD};
use image::{ImageBuffer, Rgb};
use serde_json::json;
use tempfile::TempDir;
use yolokit::inference::{DetectionRecord, DetectionResult, Detector, FileDetections, InferenceService};

/// Turns string literals into owned file names.
pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Creates a temp directory holding the given (empty-ish) files.
/// The directory is removed when dropped.
pub fn create_dataset_dir(files: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp directory");
    for file in files {
        std::fs::write(dir.path().join(file), file.as_bytes()).expect("Failed to write dataset file");
    }
    dir
}

/// Writes a classes file named `name` into `dir`.
pub fn write_classes(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write classes file");
    path
}

/// Encodes a 16x16 red PNG as base64.
pub fn png_payload() -> String {
    let img = ImageBuffer::from_fn(16, 16, |_, _| Rgb([255u8, 0u8, 0u8]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("Failed to encode test image");
    BASE64_STANDARD.encode(bytes)
}

/// Minimal MP4 header (`ftyp` box) so content sniffing sees a video.
pub fn mp4_payload() -> String {
    let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
    bytes.extend_from_slice(b"ftypmp42");
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    bytes.extend_from_slice(b"mp42isom");
    bytes.extend_from_slice(&[0u8; 16]);
    BASE64_STANDARD.encode(bytes)
}

/// Detections for one file: two people and a bus.
pub fn sample_detections() -> FileDetections {
    let record = |object: &str, confidence: f64| -> DetectionRecord {
        json!({ "object": object, "confidence": confidence })
            .as_object()
            .cloned()
            .expect("record is an object")
    };
    FileDetections(
        BTreeMap::from([
            ("bus".to_string(), vec![record("bus", 0.91)]),
            ("person".to_string(), vec![record("person", 0.88), record("person", 0.64)]),
        ]),
        BTreeMap::from([("bus".to_string(), 1), ("person".to_string(), 2)]),
    )
}

/// What the fake detector saw on each call.
#[derive(Debug, Clone)]
pub struct DetectorCall {
    pub source: PathBuf,
    pub existed: bool,
    pub files: Vec<String>,
}

/// Detector that reports [`sample_detections`] for every file it is given and
/// records its calls.
#[derive(Default)]
pub struct FakeDetector {
    pub calls: Mutex<Vec<DetectorCall>>,
}

impl Detector for FakeDetector {
    fn detect(&self, _weights: &Path, source: &Path) -> anyhow::Result<DetectionResult> {
        let mut files = Vec::new();
        if source.is_dir() {
            for entry in std::fs::read_dir(source)? {
                files.push(entry?.path().to_string_lossy().into_owned());
            }
            files.sort();
        } else if source.is_file() {
            files.push(source.to_string_lossy().into_owned());
        }

        self.calls.lock().unwrap().push(DetectorCall {
            source: source.to_path_buf(),
            existed: source.exists(),
            files: files.clone(),
        });

        Ok(files.into_iter().map(|f| (f, sample_detections())).collect())
    }

    fn name(&self) -> &str {
        "Fake Detector"
    }
}

/// Detector that always fails, as a crashed framework process would.
pub struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&self, _weights: &Path, _source: &Path) -> anyhow::Result<DetectionResult> {
        anyhow::bail!("detector exited with code 1")
    }

    fn name(&self) -> &str {
        "Failing Detector"
    }
}

/// Creates an InferenceService writing uploads into a temp directory.
/// Returns the service, its detector and the directory (keep it alive).
pub fn create_test_service() -> (InferenceService, Arc<FakeDetector>, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let detector = Arc::new(FakeDetector::default());
    let service = InferenceService::new(
        dir.path().join("best.pt"),
        "test_file",
        dir.path().join("work"),
        detector.clone(),
    );
    (service, detector, dir)
}
