use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::region::Detection;

/// Finds candidate face boxes in a frame.
///
/// Implementations return every candidate the model emits, unfiltered;
/// confidence cut-offs and geometry validation belong to the
/// [`RegionExtractor`](crate::detection::domain::region_extractor::RegionExtractor).
/// `&mut self` because inference sessions hold mutable state.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, PipelineError>;
}
