use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::region_extractor::RegionExtractor;
use crate::imaging::normalizer::Normalizer;
use crate::noise::residual_extractor::ResidualExtractor;
use crate::scoring::domain::scorer::{mean_score, Scorer};
use crate::shared::config::ExtractionConfig;
use crate::shared::constants::{
    DEFAULT_MODEL_ID, IMAGE_CONFIDENCE_THRESHOLD, NOISE_MODEL_ID, VIDEO_CONFIDENCE_THRESHOLD,
};
use crate::shared::error::PipelineError;
use crate::shared::media::{MediaBlob, MediaKind};
use crate::shared::region::NormalizedCrop;
use crate::video::domain::frame_sampler::FrameSampler;
use crate::video::domain::video_reader::VideoReader;
use crate::video::infrastructure::image_file_reader::decode_rgb_bytes;

/// Aggregated authenticity verdict for one media input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalysisReport {
    /// Mean of the per-crop scorer outputs, in [0, 1].
    pub score: f32,
    pub regions_scored: usize,
}

pub type ReaderFactory = Box<dyn Fn() -> Box<dyn VideoReader> + Send + Sync>;

/// Scores a media blob end to end.
///
/// Video inputs are sampled and detected per frame with the streaming
/// confidence cut-off; stills are decoded once and detected with the
/// stricter cut-off. With the residual flag set, every crop is replaced
/// by its noise residual and the residual-trained model is consulted
/// instead of the default one. Scoring happens only after all crops are
/// decoded and normalized.
pub struct AnalyzeMediaUseCase {
    detector: Box<dyn FaceDetector>,
    scorer: Box<dyn Scorer>,
    reader_factory: ReaderFactory,
    config: ExtractionConfig,
    cancelled: Arc<AtomicBool>,
}

impl AnalyzeMediaUseCase {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        scorer: Box<dyn Scorer>,
        reader_factory: ReaderFactory,
        config: ExtractionConfig,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            detector,
            scorer,
            reader_factory,
            config,
            cancelled,
        }
    }

    pub fn analyze(
        &mut self,
        blob: &MediaBlob,
        use_residual: bool,
    ) -> Result<AnalysisReport, PipelineError> {
        let crops = match blob.kind() {
            MediaKind::Video => self.collect_video_crops(blob, use_residual)?,
            MediaKind::Image => self.collect_image_crops(blob, use_residual)?,
        };

        let model_id = if use_residual {
            NOISE_MODEL_ID
        } else {
            DEFAULT_MODEL_ID
        };

        let mut scores = Vec::with_capacity(crops.len());
        for crop in &crops {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(PipelineError::Cancelled);
            }
            scores.push(self.scorer.predict(crop, model_id)?);
        }

        let score = mean_score(&scores)?;
        log::info!(
            "scored {} regions with model '{model_id}': mean {score:.4}",
            scores.len()
        );
        Ok(AnalysisReport {
            score,
            regions_scored: scores.len(),
        })
    }

    fn collect_video_crops(
        &mut self,
        blob: &MediaBlob,
        use_residual: bool,
    ) -> Result<Vec<NormalizedCrop>, PipelineError> {
        let extractor = RegionExtractor::new(VIDEO_CONFIDENCE_THRESHOLD);
        let mut sampler = FrameSampler::new((self.reader_factory)(), self.config.interval_ms);
        sampler.open_blob(blob)?;

        let mut crops = Vec::new();
        {
            let mut frames = sampler.frames();
            loop {
                if self.cancelled.load(Ordering::Relaxed) {
                    return Err(PipelineError::Cancelled);
                }
                let Some(frame_result) = frames.next() else {
                    break;
                };
                let frame = frame_result?;
                let detections = self.detector.detect(&frame)?;
                let regions = extractor.extract(&frame, &detections)?;
                crops.extend(self.finalize_regions(regions, use_residual)?);
            }
        }
        sampler.close();
        Ok(crops)
    }

    fn collect_image_crops(
        &mut self,
        blob: &MediaBlob,
        use_residual: bool,
    ) -> Result<Vec<NormalizedCrop>, PipelineError> {
        let extractor = RegionExtractor::new(IMAGE_CONFIDENCE_THRESHOLD);
        // An undecodable source is a media-open failure; InvalidImage is
        // reserved for crop payloads further down the pipeline.
        let frame = decode_rgb_bytes(blob.bytes()).map_err(|e| match e {
            PipelineError::InvalidImage(msg) => PipelineError::MediaOpen(msg),
            other => other,
        })?;
        let detections = self.detector.detect(&frame)?;
        let regions = extractor.extract(&frame, &detections)?;
        self.finalize_regions(regions, use_residual)
    }

    fn finalize_regions(
        &self,
        regions: Vec<crate::shared::region::FaceRegion>,
        use_residual: bool,
    ) -> Result<Vec<NormalizedCrop>, PipelineError> {
        let normalizer = Normalizer::new(self.config.resolution);
        let residual = use_residual.then(|| ResidualExtractor::new(self.config.residual));

        regions
            .into_iter()
            .map(|region| {
                let data = match &residual {
                    Some(extractor) => extractor.process(&region.data)?,
                    None => region.data,
                };
                normalizer.normalize(&data)
            })
            .collect()
    }
}
