use std::path::Path;

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Decodes encoded image bytes into an RGB [`Frame`] with index 0.
pub fn decode_rgb_bytes(bytes: &[u8]) -> Result<Frame, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::InvalidImage("empty image payload".into()));
    }
    let rgb = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::InvalidImage(e.to_string()))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame::new(rgb.into_raw(), width, height, 3, 0))
}

/// Presents a still image as a one-frame video (`fps = 0`,
/// `total_frames = 1`) so the sampling pipeline handles both media kinds
/// through the same interface.
#[derive(Default)]
pub struct ImageFileReader {
    frame: Option<Frame>,
}

impl ImageFileReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, PipelineError> {
        let tag_path = |e: PipelineError| PipelineError::MediaOpen(format!("{}: {e}", path.display()));

        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::MediaOpen(format!("{}: {e}", path.display())))?;
        let frame = decode_rgb_bytes(&bytes).map_err(tag_path)?;

        let metadata = VideoMetadata {
            width: frame.width(),
            height: frame.height(),
            fps: 0.0,
            total_frames: 1,
            codec: String::new(),
            source_path: Some(path.to_path_buf()),
        };
        self.frame = Some(frame);
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, PipelineError>> + '_> {
        match self.frame.take() {
            Some(frame) => Box::new(std::iter::once(Ok(frame))),
            None => Box::new(std::iter::once(Err(PipelineError::MediaOpen(
                "reader not opened".into(),
            )))),
        }
    }

    fn close(&mut self) {
        self.frame = None;
    }
}
