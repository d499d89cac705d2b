use thiserror::Error;

/// Failure kinds surfaced by the pipeline.
///
/// `MediaOpen` and `InvalidImage` abort the current item only.
/// `DetectorInit` means the face model never loaded and is fatal for the
/// whole run; `Detection` is an inference failure after a successful load.
/// `EmptyResult` replaces what would otherwise be a mean over zero crops.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to open media: {0}")]
    MediaOpen(String),

    #[error("face detector initialization failed: {0}")]
    DetectorInit(String),

    #[error("face detection failed: {0}")]
    Detection(String),

    #[error("invalid image data: {0}")]
    InvalidImage(String),

    #[error("no face regions produced, nothing to score")]
    EmptyResult,

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("scorer failed: {0}")]
    Scorer(String),

    #[error("cancelled")]
    Cancelled,
}
