use std::path::PathBuf;

/// Container-level properties of an opened media source.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// Native frame rate; 0.0 when the container doesn't report one.
    pub fps: f64,
    /// Total frame count; 0 when unknown (common for some containers).
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}
