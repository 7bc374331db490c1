//! Frame sources.
//!
//! Acquisition itself happens outside this crate; a [`FrameSource`] only has
//! to hand back one fresh RGB raster per call. [`ImageFileSource`] reads the
//! frames some other process writes to disk.

use crate::config::{CameraMode, CameraSettings};
use crate::error::{AppResult, ServoError};
use async_trait::async_trait;
use image::RgbImage;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Anything that yields frames on demand.
#[async_trait]
pub trait FrameSource: Send {
    /// Acquire one fresh frame.
    ///
    /// # Errors
    /// The source is unavailable (device gone, file missing, stream ended).
    async fn acquire(&mut self) -> AppResult<RgbImage>;
}

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Frames read from disk.
#[derive(Debug)]
pub enum ImageFileSource {
    /// One file, re-read on every call.
    Snapshot(PathBuf),
    /// Remaining frames of a directory, in name order.
    Sequence(VecDeque<PathBuf>),
}

impl ImageFileSource {
    /// Re-read `path` on every acquisition.
    pub fn snapshot(path: impl Into<PathBuf>) -> Self {
        ImageFileSource::Snapshot(path.into())
    }

    /// Play back the image files of `dir` sorted by file name.
    pub fn sequence(dir: impl AsRef<Path>) -> AppResult<Self> {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        frames.sort();
        debug!(dir = %dir.as_ref().display(), frames = frames.len(), "frame sequence loaded");
        Ok(ImageFileSource::Sequence(frames.into()))
    }

    /// Build from the `[camera]` settings.
    pub fn from_settings(settings: &CameraSettings) -> AppResult<Self> {
        match settings.mode {
            CameraMode::Snapshot => Ok(Self::snapshot(&settings.source)),
            CameraMode::Sequence => Self::sequence(&settings.source),
        }
    }
}

async fn load_rgb(path: PathBuf) -> AppResult<RgbImage> {
    let frame = tokio::task::spawn_blocking(move || image::open(&path).map(|img| img.to_rgb8()))
        .await
        .map_err(|e| ServoError::Camera(format!("frame decode task failed: {e}")))??;
    Ok(frame)
}

#[async_trait]
impl FrameSource for ImageFileSource {
    async fn acquire(&mut self) -> AppResult<RgbImage> {
        match self {
            ImageFileSource::Snapshot(path) => load_rgb(path.clone()).await,
            ImageFileSource::Sequence(frames) => {
                let next = frames
                    .pop_front()
                    .ok_or_else(|| ServoError::Camera("frame sequence exhausted".to_string()))?;
                load_rgb(next).await
            }
        }
    }
}
