use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::shared::constants::JPEG_QUALITY;
use crate::shared::error::PipelineError;
use crate::shared::region::NormalizedCrop;

/// Resizes crops to the fixed square input size the scorer expects.
///
/// Aspect ratio is intentionally not preserved: the scorer was trained on
/// stretched squares, so every crop maps to exactly `size` x `size`.
pub struct Normalizer {
    size: u32,
}

impl Normalizer {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Decodes, stretches to the target square, and re-encodes as JPEG.
    pub fn normalize(&self, bytes: &[u8]) -> Result<NormalizedCrop, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::InvalidImage("empty crop payload".into()));
        }
        let img = image::load_from_memory(bytes)
            .map_err(|e| PipelineError::InvalidImage(e.to_string()))?;
        let resized = img.resize_exact(self.size, self.size, FilterType::Triangle);

        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
        resized
            .to_rgb8()
            .write_with_encoder(encoder)
            .map_err(|e| PipelineError::InvalidImage(e.to_string()))?;
        Ok(out)
    }

    pub fn normalize_all(&self, crops: &[Vec<u8>]) -> Result<Vec<NormalizedCrop>, PipelineError> {
        crops.iter().map(|c| self.normalize(c)).collect()
    }
}
