use crate::shared::error::PipelineError;
use crate::shared::region::NormalizedCrop;

/// Destination for normalized crops.
///
/// Implementations decide naming and container format. `finish` must be
/// called exactly once after the last batch; some containers (archives)
/// are unreadable without it.
pub trait CropSink: Send {
    fn write_batch(&mut self, crops: &[NormalizedCrop]) -> Result<(), PipelineError>;

    fn finish(&mut self) -> Result<(), PipelineError>;
}
