//! Local file frame source.
//!
//! `FileSource` turns one uploaded media file into frames:
//! - Still images decode to exactly one frame
//! - Videos are decoded with FFmpeg and decimated to a bounded sample
//!
//! The file source MUST NOT fetch remote URLs or write decoded frames anywhere.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::MediaKind;
use crate::frame::Frame;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "uploads/cctv.jpg").
    pub path: PathBuf,
    /// Keep every Nth decoded video frame.
    pub sample_every: u32,
    /// Upper bound on sampled video frames.
    pub max_frames: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            sample_every: 30,
            max_frames: 20,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    kind: MediaKind,
    backend: FileBackend,
}

enum FileBackend {
    Image(ImageFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let kind = MediaKind::from_path(&config.path)?;
        match kind {
            MediaKind::Image => Ok(Self {
                kind,
                backend: FileBackend::Image(ImageFileSource::new(config)),
            }),
            MediaKind::Video => {
                #[cfg(feature = "ingest-file-ffmpeg")]
                {
                    Ok(Self {
                        kind,
                        backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                    })
                }
                #[cfg(not(feature = "ingest-file-ffmpeg"))]
                {
                    Err(super::IngestError::VideoUnsupported.into())
                }
            }
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Next frame, or `None` once the source is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Image(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Image(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

impl Iterator for FileSource {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_captured: u64,
    pub path: PathBuf,
}

struct ImageFileSource {
    config: FileConfig,
    done: bool,
}

impl ImageFileSource {
    fn new(config: FileConfig) -> Self {
        Self {
            config,
            done: false,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let image = image::open(&self.config.path)
            .with_context(|| format!("failed to decode image {}", self.config.path.display()))?;
        let frame = Frame::from_image(image, 0);
        log::debug!(
            "FileSource: decoded {} ({}x{})",
            self.config.path.display(),
            frame.width,
            frame.height
        );
        Ok(Some(frame))
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: u64::from(self.done),
            path: self.config.path.clone(),
        }
    }
}

fn is_local_file_path(path: &std::path::Path) -> bool {
    let raw = path.to_string_lossy();
    if raw.trim().is_empty() {
        return false;
    }
    !raw.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn rejects_url_paths() {
        let config = FileConfig {
            path: PathBuf::from("https://example.com/cctv.jpg"),
            ..FileConfig::default()
        };
        let err = FileSource::new(config).err().unwrap();
        assert!(err.to_string().contains("local paths"));
    }

    #[test]
    fn image_yields_exactly_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lot.png");
        RgbImage::from_pixel(8, 6, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let mut source = FileSource::new(FileConfig {
            path,
            ..FileConfig::default()
        })
        .unwrap();
        assert_eq!(source.kind(), MediaKind::Image);

        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (8, 6));
        assert_eq!(&frame.pixels()[..3], &[10, 20, 30]);
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_captured, 1);
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    #[test]
    fn video_without_ffmpeg_is_reported() {
        use crate::ingest::IngestError;

        let err = FileSource::new(FileConfig {
            path: PathBuf::from("clip.mp4"),
            ..FileConfig::default()
        })
        .err()
        .unwrap();
        assert_eq!(
            err.downcast_ref::<IngestError>(),
            Some(&IngestError::VideoUnsupported)
        );
    }
}
