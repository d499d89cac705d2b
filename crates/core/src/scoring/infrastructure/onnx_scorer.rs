use std::collections::HashMap;
use std::path::PathBuf;

use crate::scoring::domain::scorer::Scorer;
use crate::shared::error::PipelineError;

/// ONNX Runtime scorer holding one lazily-built session per model id.
///
/// Crops are decoded, scaled to [0, 1] NCHW floats, and fed through the
/// session registered for the requested id.
pub struct OnnxScorer {
    registry: HashMap<String, PathBuf>,
    sessions: HashMap<String, ort::session::Session>,
}

impl OnnxScorer {
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

    /// Registers a model file under an id. Re-registering an id replaces
    /// the path and drops any session built from the old one.
    pub fn register(&mut self, model_id: &str, path: PathBuf) {
        self.sessions.remove(model_id);
        self.registry.insert(model_id.to_string(), path);
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(String::as_str)
    }

    fn session(&mut self, model_id: &str) -> Result<&mut ort::session::Session, PipelineError> {
        if !self.sessions.contains_key(model_id) {
            let path = self.registry.get(model_id).ok_or_else(|| {
                PipelineError::Scorer(format!("no model registered for id '{model_id}'"))
            })?;
            let session = ort::session::Session::builder()
                .and_then(|mut b| b.commit_from_file(path))
                .map_err(|e| PipelineError::Scorer(e.to_string()))?;
            self.sessions.insert(model_id.to_string(), session);
        }
        Ok(self
            .sessions
            .get_mut(model_id)
            .expect("session inserted above"))
    }
}

impl Default for OnnxScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl Scorer for OnnxScorer {
    fn predict(&mut self, crop: &[u8], model_id: &str) -> Result<f32, PipelineError> {
        let input = preprocess(crop)?;
        let session = self.session(model_id)?;

        let input_value = ort::value::Tensor::from_array(input)
            .map_err(|e| PipelineError::Scorer(e.to_string()))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| PipelineError::Scorer(e.to_string()))?;
        if outputs.len() == 0 {
            return Err(PipelineError::Scorer("model produced no outputs".into()));
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| PipelineError::Scorer(e.to_string()))?;
        let values = tensor
            .as_slice()
            .ok_or_else(|| PipelineError::Scorer("output is not contiguous".into()))?;
        reduce_output(values)
    }
}

/// Decodes a crop into a `[1, 3, H, W]` tensor with values in [0, 1].
fn preprocess(crop: &[u8]) -> Result<ndarray::Array4<f32>, PipelineError> {
    let img = image::load_from_memory(crop)
        .map_err(|e| PipelineError::InvalidImage(e.to_string()))?
        .to_rgb8();
    let (w, h) = img.dimensions();
    let (w, h) = (w as usize, h as usize);

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, h, w));
    for (x, y, pixel) in img.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
        }
    }
    Ok(tensor)
}

/// Collapses the model head to a single probability.
///
/// A one-value head is a logit (or an already-squashed probability); a
/// two-value head is softmaxed and the positive class taken.
fn reduce_output(values: &[f32]) -> Result<f32, PipelineError> {
    match values {
        [] => Err(PipelineError::Scorer("empty model output".into())),
        [v] => {
            if (0.0..=1.0).contains(v) {
                Ok(*v)
            } else {
                Ok(1.0 / (1.0 + (-v).exp()))
            }
        }
        [a, b] => {
            let max = a.max(*b);
            let ea = (a - max).exp();
            let eb = (b - max).exp();
            Ok(eb / (ea + eb))
        }
        other => Err(PipelineError::Scorer(format!(
            "unexpected model output arity: {}",
            other.len()
        ))),
    }
}
