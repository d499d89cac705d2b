use std::path::Path;

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Reads frames from a video or image source.
///
/// Implementations own the decode details (codec, container format); the
/// pipeline only sees [`Frame`] and [`VideoMetadata`]. Decoder state is not
/// shareable across threads, hence one reader per source and `&mut self`
/// throughout.
pub trait VideoReader: Send {
    /// Opens a media file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, PipelineError>;

    /// Returns a lazy, single-pass iterator over frames in decode order.
    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, PipelineError>> + '_>;

    /// Releases decoder resources. Must be idempotent.
    fn close(&mut self);
}
