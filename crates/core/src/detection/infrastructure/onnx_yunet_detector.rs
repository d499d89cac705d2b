//! YuNet face detector using ONNX Runtime via `ort`.
//!
//! YuNet sessions are shape-locked: the network is committed against the
//! exact frame dimensions and rebuilt whenever the incoming frame size
//! changes. Within one video that happens at most once.

use std::path::{Path, PathBuf};

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::region::Detection;

/// Values per output row: box (4), five landmarks (10), score (1).
const ROW_WIDTH: usize = 15;

/// Column holding the detection score.
const SCORE_COLUMN: usize = 14;

pub struct OnnxYunetDetector {
    model_path: PathBuf,
    session: Option<ort::session::Session>,
    input_width: u32,
    input_height: u32,
}

impl OnnxYunetDetector {
    /// Prepares a detector for the model at `model_path`.
    ///
    /// The inference session is created on first use, once the frame
    /// dimensions are known.
    pub fn new(model_path: &Path) -> Result<Self, PipelineError> {
        if !model_path.exists() {
            return Err(PipelineError::DetectorInit(format!(
                "model not found: {}",
                model_path.display()
            )));
        }
        Ok(Self {
            model_path: model_path.to_path_buf(),
            session: None,
            input_width: 0,
            input_height: 0,
        })
    }

    fn ensure_session(&mut self, width: u32, height: u32) -> Result<(), PipelineError> {
        if self.session.is_some() && self.input_width == width && self.input_height == height {
            return Ok(());
        }
        if self.session.is_some() {
            log::debug!(
                "frame size changed {}x{} -> {}x{}, rebuilding detector session",
                self.input_width,
                self.input_height,
                width,
                height
            );
        }
        let session = ort::session::Session::builder()
            .and_then(|mut b| b.commit_from_file(&self.model_path))
            .map_err(|e| PipelineError::DetectorInit(e.to_string()))?;
        self.session = Some(session);
        self.input_width = width;
        self.input_height = height;
        Ok(())
    }
}

impl FaceDetector for OnnxYunetDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, PipelineError> {
        self.ensure_session(frame.width(), frame.height())?;
        let session = self.session.as_mut().ok_or_else(|| {
            PipelineError::DetectorInit("detector session unavailable".into())
        })?;

        let input = frame_to_tensor(frame);
        let input_value = ort::value::Tensor::from_array(input)
            .map_err(|e| PipelineError::Detection(e.to_string()))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| PipelineError::Detection(e.to_string()))?;
        if outputs.len() == 0 {
            return Err(PipelineError::Detection(
                "model produced no outputs".into(),
            ));
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| PipelineError::Detection(e.to_string()))?;
        let shape = tensor.shape();

        // Output is [N, 15] or [1, N, 15] depending on the export.
        let (num_rows, row_width) = match shape {
            [n, w] => (*n, *w),
            [1, n, w] => (*n, *w),
            other => {
                return Err(PipelineError::Detection(format!(
                    "unexpected detector output shape: {other:?}"
                )))
            }
        };
        let data = tensor.as_slice().ok_or_else(|| {
            PipelineError::Detection("detector output is not contiguous".into())
        })?;

        Ok(parse_rows(data, num_rows, row_width))
    }
}

/// Packs RGB frame bytes into an NCHW float tensor in BGR channel order,
/// which is what the published YuNet weights were trained on.
fn frame_to_tensor(frame: &Frame) -> ndarray::Array4<f32> {
    let h = frame.height() as usize;
    let w = frame.width() as usize;
    let src = frame.as_ndarray();

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, h, w));
    for y in 0..h {
        for x in 0..w {
            tensor[[0, 0, y, x]] = src[[y, x, 2]] as f32;
            tensor[[0, 1, y, x]] = src[[y, x, 1]] as f32;
            tensor[[0, 2, y, x]] = src[[y, x, 0]] as f32;
        }
    }
    tensor
}

/// Parses flat detector output into candidate boxes.
///
/// Each well-formed row is `[x, y, w, h, lm0x, lm0y, .., lm4y, score]`.
/// Rows that are short or carry non-finite values are skipped, not fatal.
fn parse_rows(data: &[f32], num_rows: usize, row_width: usize) -> Vec<Detection> {
    let mut detections = Vec::new();
    for i in 0..num_rows {
        let start = i * row_width;
        let Some(row) = data.get(start..start + row_width) else {
            log::warn!("detector row {i} truncated, skipping");
            continue;
        };
        if row_width < ROW_WIDTH {
            log::warn!("detector row {i} has {row_width} values, expected {ROW_WIDTH}");
            continue;
        }
        let geometry = &row[..4];
        let score = row[SCORE_COLUMN];
        if !score.is_finite() || geometry.iter().any(|v| !v.is_finite()) {
            log::warn!("detector row {i} contains non-finite values, skipping");
            continue;
        }
        detections.push(Detection {
            x: geometry[0].round() as i32,
            y: geometry[1].round() as i32,
            width: geometry[2].round() as i32,
            height: geometry[3].round() as i32,
            confidence: score,
        });
    }
    detections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(x: f32, y: f32, w: f32, h: f32, score: f32) -> Vec<f32> {
        let mut r = vec![x, y, w, h];
        r.extend_from_slice(&[0.0; 10]);
        r.push(score);
        r
    }

    #[test]
    fn test_parse_rows_reads_box_and_score() {
        let data = row(10.2, 20.7, 40.0, 50.0, 0.93);
        let dets = parse_rows(&data, 1, ROW_WIDTH);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].x, 10);
        assert_eq!(dets[0].y, 21);
        assert_eq!(dets[0].width, 40);
        assert_eq!(dets[0].height, 50);
        assert!((dets[0].confidence - 0.93).abs() < 1e-6);
    }

    #[test]
    fn test_parse_rows_multiple() {
        let mut data = row(0.0, 0.0, 30.0, 30.0, 0.9);
        data.extend(row(50.0, 50.0, 20.0, 20.0, 0.6));
        let dets = parse_rows(&data, 2, ROW_WIDTH);
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[1].x, 50);
    }

    #[test]
    fn test_parse_rows_skips_nan_geometry() {
        let mut data = row(f32::NAN, 0.0, 30.0, 30.0, 0.9);
        data.extend(row(5.0, 5.0, 20.0, 20.0, 0.8));
        let dets = parse_rows(&data, 2, ROW_WIDTH);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].x, 5);
    }

    #[test]
    fn test_parse_rows_skips_infinite_score() {
        let data = row(0.0, 0.0, 30.0, 30.0, f32::INFINITY);
        assert!(parse_rows(&data, 1, ROW_WIDTH).is_empty());
    }

    #[test]
    fn test_parse_rows_skips_short_rows() {
        let data = vec![1.0f32; 8];
        assert!(parse_rows(&data, 1, 8).is_empty());
    }

    #[test]
    fn test_parse_rows_truncated_buffer() {
        // Claims two rows but only holds one and a half
        let mut data = row(0.0, 0.0, 30.0, 30.0, 0.9);
        data.extend_from_slice(&[1.0; 7]);
        let dets = parse_rows(&data, 2, ROW_WIDTH);
        assert_eq!(dets.len(), 1);
    }

    #[test]
    fn test_parse_rows_empty() {
        assert!(parse_rows(&[], 0, ROW_WIDTH).is_empty());
    }

    #[test]
    fn test_frame_to_tensor_swaps_to_bgr() {
        // Single pixel: R=10, G=20, B=30
        let frame = Frame::new(vec![10, 20, 30], 1, 1, 3, 0);
        let tensor = frame_to_tensor(&frame);
        assert_eq!(tensor.shape(), &[1, 3, 1, 1]);
        assert_eq!(tensor[[0, 0, 0, 0]], 30.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 20.0);
        assert_eq!(tensor[[0, 2, 0, 0]], 10.0);
    }

    #[test]
    fn test_new_rejects_missing_model() {
        let result = OnnxYunetDetector::new(Path::new("/nonexistent/model.onnx"));
        assert!(matches!(result, Err(PipelineError::DetectorInit(_))));
    }
}
