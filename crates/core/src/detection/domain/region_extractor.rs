use image::codecs::jpeg::JpegEncoder;

use crate::shared::constants::JPEG_QUALITY;
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::region::{Detection, FaceRegion};

/// Turns raw detections into JPEG-encoded face crops.
///
/// Applies the confidence cut-off and the geometry rules: boxes must clear
/// the threshold strictly, lie fully inside the frame, and exceed the
/// minimum side length. Failing boxes are dropped, never clamped.
pub struct RegionExtractor {
    threshold: f32,
}

impl RegionExtractor {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn extract(
        &self,
        frame: &Frame,
        detections: &[Detection],
    ) -> Result<Vec<FaceRegion>, PipelineError> {
        let mut regions = Vec::new();
        for det in detections {
            if det.confidence <= self.threshold {
                continue;
            }
            if !det.fits_within(frame.width(), frame.height()) {
                log::debug!(
                    "dropping box {}x{} at ({}, {}): outside {}x{} frame or too small",
                    det.width,
                    det.height,
                    det.x,
                    det.y,
                    frame.width(),
                    frame.height()
                );
                continue;
            }
            // fits_within guarantees non-negative coords inside the frame,
            // so a refused crop means a malformed box: skip it, not the frame
            let Some(crop) = frame.crop(
                det.x as u32,
                det.y as u32,
                det.width as u32,
                det.height as u32,
            ) else {
                log::warn!(
                    "crop rectangle {}x{} at ({}, {}) rejected, skipping",
                    det.width,
                    det.height,
                    det.x,
                    det.y
                );
                continue;
            };
            regions.push(FaceRegion {
                x: det.x,
                y: det.y,
                width: det.width,
                height: det.height,
                confidence: det.confidence,
                data: encode_jpeg(&crop)?,
            });
        }
        Ok(regions)
    }
}

/// JPEG-encodes an RGB frame at the pipeline-wide quality setting.
pub fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, PipelineError> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or_else(|| PipelineError::InvalidImage("frame buffer size mismatch".into()))?;
    img.write_with_encoder(encoder)
        .map_err(|e| PipelineError::InvalidImage(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn solid_frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![90u8; (width * height * 3) as usize], width, height, 3, 0)
    }

    fn det(x: i32, y: i32, w: i32, h: i32, confidence: f32) -> Detection {
        Detection {
            x,
            y,
            width: w,
            height: h,
            confidence,
        }
    }

    #[test]
    fn test_extracts_valid_detection() {
        let frame = solid_frame(100, 100);
        let extractor = RegionExtractor::new(0.5);

        let regions = extractor
            .extract(&frame, &[det(10, 10, 40, 40, 0.9)])
            .unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].x, 10);
        assert_eq!(regions[0].width, 40);
        assert!((regions[0].confidence - 0.9).abs() < 1e-6);
        // JPEG SOI marker
        assert_eq!(&regions[0].data[..2], &[0xFF, 0xD8]);
    }

    #[rstest]
    #[case::below_threshold(det(10, 10, 40, 40, 0.3))]
    #[case::at_threshold(det(10, 10, 40, 40, 0.5))]
    #[case::out_of_bounds(det(80, 80, 40, 40, 0.9))]
    #[case::negative_origin(det(-5, 10, 40, 40, 0.9))]
    #[case::too_small(det(10, 10, 10, 10, 0.9))]
    #[case::huge_finite_coordinates(det(i32::MAX, 10, i32::MAX, 40, 0.9))]
    fn test_rejected_detections(#[case] d: Detection) {
        let frame = solid_frame(100, 100);
        let extractor = RegionExtractor::new(0.5);
        let regions = extractor.extract(&frame, &[d]).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn test_malformed_box_never_fails_the_frame() {
        // A box that survives the finite-value filter but cannot possibly
        // fit must not abort extraction for its neighbors.
        let frame = solid_frame(100, 100);
        let extractor = RegionExtractor::new(0.5);
        let regions = extractor
            .extract(
                &frame,
                &[
                    det(i32::MAX, 10, i32::MAX, 40, 0.9),
                    det(10, 10, 40, 40, 0.9),
                ],
            )
            .unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].x, 10);
    }

    #[test]
    fn test_threshold_is_strict() {
        let frame = solid_frame(100, 100);
        let extractor = RegionExtractor::new(0.5);

        let exactly_at = extractor
            .extract(&frame, &[det(0, 0, 50, 50, 0.5)])
            .unwrap();
        assert!(exactly_at.is_empty());

        let just_above = extractor
            .extract(&frame, &[det(0, 0, 50, 50, 0.500001)])
            .unwrap();
        assert_eq!(just_above.len(), 1);
    }

    #[test]
    fn test_mixed_batch_keeps_only_valid() {
        let frame = solid_frame(100, 100);
        let extractor = RegionExtractor::new(0.5);

        let regions = extractor
            .extract(
                &frame,
                &[
                    det(0, 0, 30, 30, 0.95),
                    det(90, 90, 30, 30, 0.95), // spills over the edge
                    det(40, 40, 30, 30, 0.1),  // low confidence
                    det(50, 50, 30, 30, 0.7),
                ],
            )
            .unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].x, 0);
        assert_eq!(regions[1].x, 50);
    }

    #[test]
    fn test_no_detections_yields_empty() {
        let frame = solid_frame(100, 100);
        let extractor = RegionExtractor::new(0.5);
        assert!(extractor.extract(&frame, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_encode_jpeg_produces_decodable_output() {
        let frame = solid_frame(32, 24);
        let bytes = encode_jpeg(&frame).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 24);
    }
}
