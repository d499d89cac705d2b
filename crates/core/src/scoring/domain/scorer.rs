use crate::shared::error::PipelineError;

/// Scores one normalized crop for authenticity.
///
/// `model_id` selects which trained model evaluates the crop; the plain
/// and residual paths use different models over the same interface.
/// Higher scores mean more likely authentic.
pub trait Scorer: Send {
    fn predict(&mut self, crop: &[u8], model_id: &str) -> Result<f32, PipelineError>;
}

/// Arithmetic mean of per-crop scores.
///
/// An empty slice is a distinct failure, never a NaN: callers branch on
/// [`PipelineError::EmptyResult`] to report "no faces found".
pub fn mean_score(scores: &[f32]) -> Result<f32, PipelineError> {
    if scores.is_empty() {
        return Err(PipelineError::EmptyResult);
    }
    Ok(scores.iter().sum::<f32>() / scores.len() as f32)
}
