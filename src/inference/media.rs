use std::fs;
use std::path::Path;

use anyhow::Context;
use base64::{Engine, prelude::BASE64_STANDARD};

use super::InferenceError;

/// Image types the detector accepts. Uploaded images are re-encoded.
pub const IMAGE_FORMATS: [&str; 3] = ["jpg", "jpeg", "png"];
/// Video types the detector accepts. Uploaded videos are stored verbatim.
pub const VIDEO_FORMATS: [&str; 8] = ["mov", "avi", "mp4", "mpg", "mpeg", "m4v", "wmv", "mkv"];

/// Extension given to payloads whose type could not be sniffed.
const UNKNOWN_EXTENSION: &str = "bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Unsupported,
}

/// A decoded upload with its sniffed type.
#[derive(Debug, Clone)]
pub struct Media {
    pub bytes: Vec<u8>,
    pub extension: String,
    pub kind: MediaKind,
}

impl Media {
    /// Decode a base64 payload and sniff its type from the content.
    ///
    /// ASCII whitespace inside the payload is ignored.
    pub fn decode(index: usize, payload: &str) -> Result<Self, InferenceError> {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = BASE64_STANDARD
            .decode(compact.as_bytes())
            .map_err(|source| InferenceError::InvalidPayload { index, source })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let extension = infer::get(&bytes)
            .map(|kind| kind.extension())
            .unwrap_or(UNKNOWN_EXTENSION)
            .to_string();
        let kind = if IMAGE_FORMATS.contains(&extension.as_str()) {
            MediaKind::Image
        } else if VIDEO_FORMATS.contains(&extension.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Unsupported
        };
        Self { bytes, extension, kind }
    }

    /// Write the media to `path`. Images are decoded and re-encoded in the
    /// format implied by the path's extension; anything else is written
    /// verbatim.
    pub fn save(&self, path: &Path) -> Result<(), InferenceError> {
        match self.kind {
            MediaKind::Image => {
                let img = image::load_from_memory(&self.bytes).map_err(InferenceError::UndecodableImage)?;
                img.save(path)
                    .with_context(|| format!("Failed to save image {:?}", path))
                    .map_err(InferenceError::Storage)?;
            }
            MediaKind::Video | MediaKind::Unsupported => {
                fs::write(path, &self.bytes)
                    .with_context(|| format!("Failed to write media {:?}", path))
                    .map_err(InferenceError::Storage)?;
            }
        }
        Ok(())
    }
}
