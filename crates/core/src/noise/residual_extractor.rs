use image::RgbImage;
use imageproc::contrast::equalize_histogram;
use imageproc::filter::median_filter;

use crate::shared::config::ResidualConfig;
use crate::shared::error::PipelineError;
use crate::shared::region::FaceRegion;

/// Gains this close to 1.0 are treated as identity.
const GAIN_EPSILON: f64 = 1e-3;

/// Computes the median-filter noise residual of a face crop.
///
/// The residual is the absolute difference between the crop and its
/// median-smoothed copy, optionally amplified and histogram-equalized.
/// Camera sensor noise survives this transform while scene content is
/// mostly removed, which is what the residual scorer is trained on.
pub struct ResidualExtractor {
    config: ResidualConfig,
}

impl ResidualExtractor {
    pub fn new(config: ResidualConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResidualConfig {
        &self.config
    }

    /// Transforms one encoded crop into its PNG-encoded residual.
    pub fn process(&self, bytes: &[u8]) -> Result<Vec<u8>, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::InvalidImage("empty crop payload".into()));
        }
        let original = image::load_from_memory(bytes)
            .map_err(|e| PipelineError::InvalidImage(e.to_string()))?
            .to_rgb8();

        let mut smoothed = original.clone();
        for _ in 0..self.config.iterations() {
            smoothed = median_filter(&smoothed, 1, 1);
        }

        let mut residual = absdiff(&original, &smoothed);

        if (self.config.gain() - 1.0).abs() > GAIN_EPSILON {
            apply_gain(&mut residual, self.config.gain() as f32);
        }

        if self.config.equalize() {
            residual = equalize_channels(&residual);
        }

        encode_png(&residual)
    }

    /// Runs `process` on a worker thread, returning a receiver for the
    /// result. Output is byte-identical to the blocking form.
    pub fn process_in_background(
        &self,
        bytes: Vec<u8>,
    ) -> crossbeam_channel::Receiver<Result<Vec<u8>, PipelineError>> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let config = self.config;
        std::thread::spawn(move || {
            let extractor = ResidualExtractor::new(config);
            let _ = tx.send(extractor.process(&bytes));
        });
        rx
    }

    /// Replaces each region's pixel payload with its residual, keeping the
    /// box geometry and confidence untouched.
    pub fn process_regions(
        &self,
        regions: &[FaceRegion],
    ) -> Result<Vec<FaceRegion>, PipelineError> {
        regions
            .iter()
            .map(|r| Ok(r.with_data(self.process(&r.data)?)))
            .collect()
    }
}

fn absdiff(a: &RgbImage, b: &RgbImage) -> RgbImage {
    let mut out = RgbImage::new(a.width(), a.height());
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let pa = a.get_pixel(x, y);
        let pb = b.get_pixel(x, y);
        for c in 0..3 {
            pixel.0[c] = pa.0[c].abs_diff(pb.0[c]);
        }
    }
    out
}

/// Scales every channel value, saturating at the u8 range.
fn apply_gain(img: &mut RgbImage, gain: f32) {
    for pixel in img.pixels_mut() {
        for c in 0..3 {
            pixel.0[c] = (pixel.0[c] as f32 * gain).clamp(0.0, 255.0) as u8;
        }
    }
}

/// Histogram-equalizes each channel independently.
fn equalize_channels(img: &RgbImage) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut channels = Vec::with_capacity(3);
    for c in 0..3 {
        let gray = image::GrayImage::from_fn(w, h, |x, y| {
            image::Luma([img.get_pixel(x, y).0[c]])
        });
        channels.push(equalize_histogram(&gray));
    }
    RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([
            channels[0].get_pixel(x, y).0[0],
            channels[1].get_pixel(x, y).0[0],
            channels[2].get_pixel(x, y).0[0],
        ])
    })
}

fn encode_png(img: &RgbImage) -> Result<Vec<u8>, PipelineError> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| PipelineError::InvalidImage(e.to_string()))?;
    Ok(out.into_inner())
}
