//! Frame acquisition from uploaded media files.
//!
//! Supported uploads:
//! - Still images (`jpg`, `jpeg`, `png`), decoded in-memory with `image`
//! - Short videos (`mp4`), sampled with FFmpeg (feature: ingest-file-ffmpeg)
//!
//! Sources only read local paths. Decoded frames are handed to detection and
//! dropped afterwards.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

use std::path::Path;

use serde::Serialize;

pub use file::{FileConfig, FileSource, FileStats};

/// Kind of uploaded media, decided by file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub const IMAGE_EXTENSIONS: [&'static str; 3] = ["jpg", "jpeg", "png"];
    pub const VIDEO_EXTENSIONS: [&'static str; 1] = ["mp4"];

    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if Self::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(MediaKind::Image)
        } else if Self::VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Ok(MediaKind::Video)
        } else {
            Err(IngestError::UnsupportedExtension(ext))
        }
    }
}

/// Ingestion failures the monitor reacts to specifically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestError {
    UnsupportedExtension(String),
    /// Video uploads need the ingest-file-ffmpeg feature.
    VideoUnsupported,
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::UnsupportedExtension(ext) if ext.is_empty() => {
                write!(f, "media file has no extension; expected jpg, jpeg, png or mp4")
            }
            IngestError::UnsupportedExtension(ext) => write!(
                f,
                "unsupported media type '.{}'; expected jpg, jpeg, png or mp4",
                ext
            ),
            IngestError::VideoUnsupported => {
                write!(f, "video decoding requires the ingest-file-ffmpeg feature")
            }
        }
    }
}

impl std::error::Error for IngestError {}
