use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::region_extractor::RegionExtractor;
use crate::imaging::normalizer::Normalizer;
use crate::noise::residual_extractor::ResidualExtractor;
use crate::pipeline::worker_pool;
use crate::shared::error::PipelineError;
use crate::shared::region::{FaceRegion, NormalizedCrop};
use crate::sink::domain::batch_writer::BatchWriter;
use crate::video::domain::frame_sampler::FrameSampler;

/// What one extraction run produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub frames_sampled: usize,
    pub regions_written: usize,
}

/// Offline face-crop extraction for a single media source.
///
/// Sampled frames run through detection on the calling thread (the
/// inference session is not shareable), then each frame's regions are
/// residual-transformed and normalized on a bounded worker pool before
/// being handed to the batch writer.
pub struct ExtractFacesUseCase {
    detector: Box<dyn FaceDetector>,
    extractor: RegionExtractor,
    residual: Option<ResidualExtractor>,
    normalizer: Normalizer,
    workers: usize,
    cancelled: Arc<AtomicBool>,
}

impl ExtractFacesUseCase {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        extractor: RegionExtractor,
        residual: Option<ResidualExtractor>,
        normalizer: Normalizer,
        workers: usize,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            detector,
            extractor,
            residual,
            normalizer,
            workers,
            cancelled,
        }
    }

    /// Drains the opened sampler into the writer.
    ///
    /// Consumes the writer: the final flush and container close happen
    /// here, so a returned summary means everything is on disk.
    pub fn run(
        &mut self,
        sampler: &mut FrameSampler,
        writer: BatchWriter,
    ) -> Result<ExtractionSummary, PipelineError> {
        let mut writer = writer;
        let mut frames_sampled = 0;

        let mut frames = sampler.frames();
        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(PipelineError::Cancelled);
            }
            let Some(frame_result) = frames.next() else {
                break;
            };
            let frame = frame_result?;
            frames_sampled += 1;

            let detections = self.detector.detect(&frame)?;
            let regions = self.extractor.extract(&frame, &detections)?;
            log::debug!(
                "frame {}: {} detections, {} regions kept",
                frame.index(),
                detections.len(),
                regions.len()
            );

            let crops = self.process_regions(regions)?;
            writer.push_all(crops)?;
        }
        drop(frames);
        sampler.close();

        let regions_written = writer.finish()?;
        log::info!("extracted {regions_written} regions from {frames_sampled} sampled frames");
        Ok(ExtractionSummary {
            frames_sampled,
            regions_written,
        })
    }

    fn process_regions(
        &self,
        regions: Vec<FaceRegion>,
    ) -> Result<Vec<NormalizedCrop>, PipelineError> {
        let residual = &self.residual;
        let normalizer = &self.normalizer;
        let outcomes = worker_pool::run_indexed(
            regions,
            self.workers,
            || (),
            |_, region: FaceRegion| -> Result<NormalizedCrop, PipelineError> {
                let data = match residual {
                    Some(extractor) => extractor.process(&region.data)?,
                    None => region.data,
                };
                normalizer.normalize(&data)
            },
        );
        outcomes.into_iter().collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;

    use crate::shared::config::ResidualConfig;
    use crate::shared::constants::VIDEO_CONFIDENCE_THRESHOLD;
    use crate::shared::frame::Frame;
    use crate::shared::media::MediaBlob;
    use crate::shared::region::Detection;
    use crate::shared::video_metadata::VideoMetadata;
    use crate::sink::domain::crop_sink::CropSink;
    use crate::video::domain::video_reader::VideoReader;

    pub(crate) struct StubReader {
        frames: Vec<Frame>,
        fps: f64,
    }

    impl StubReader {
        pub(crate) fn new(count: usize, width: u32, height: u32, fps: f64) -> Self {
            let frames = (0..count)
                .map(|i| {
                    Frame::new(
                        vec![128u8; (width * height * 3) as usize],
                        width,
                        height,
                        3,
                        i,
                    )
                })
                .collect();
            Self { frames, fps }
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, path: &Path) -> Result<VideoMetadata, PipelineError> {
            Ok(VideoMetadata {
                width: 64,
                height: 64,
                fps: self.fps,
                total_frames: self.frames.len(),
                codec: String::new(),
                source_path: Some(path.to_path_buf()),
            })
        }

        fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, PipelineError>> + '_> {
            Box::new(self.frames.drain(..).map(Ok))
        }

        fn close(&mut self) {}
    }

    pub(crate) struct StubDetector {
        pub detections: Vec<Detection>,
    }

    impl crate::detection::domain::face_detector::FaceDetector for StubDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, PipelineError> {
            Ok(self.detections.clone())
        }
    }

    struct CountingSink {
        count: std::sync::Arc<std::sync::atomic::AtomicUsize>,
        finished: std::sync::Arc<AtomicBool>,
    }

    impl CropSink for CountingSink {
        fn write_batch(&mut self, crops: &[NormalizedCrop]) -> Result<(), PipelineError> {
            self.count.fetch_add(crops.len(), Ordering::SeqCst);
            Ok(())
        }

        fn finish(&mut self) -> Result<(), PipelineError> {
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn one_face() -> Vec<Detection> {
        vec![Detection {
            x: 8,
            y: 8,
            width: 32,
            height: 32,
            confidence: 0.95,
        }]
    }

    fn use_case(detections: Vec<Detection>, residual: bool) -> ExtractFacesUseCase {
        ExtractFacesUseCase::new(
            Box::new(StubDetector { detections }),
            RegionExtractor::new(VIDEO_CONFIDENCE_THRESHOLD),
            residual.then(|| ResidualExtractor::new(ResidualConfig::default())),
            Normalizer::new(48),
            2,
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn sampler(frame_count: usize, fps: f64) -> FrameSampler {
        let mut s = FrameSampler::new(Box::new(StubReader::new(frame_count, 64, 64, fps)), 1000);
        s.open_blob(&MediaBlob::video(vec![0u8; 8])).unwrap();
        s
    }

    #[test]
    fn test_ten_seconds_yields_ten_regions() {
        // 300 frames at 30 fps with 1000ms sampling -> 10 frames, one face each
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let finished = std::sync::Arc::new(AtomicBool::new(false));
        let writer = BatchWriter::new(
            Box::new(CountingSink {
                count: count.clone(),
                finished: finished.clone(),
            }),
            100,
        );

        let mut uc = use_case(one_face(), false);
        let mut sampler = sampler(300, 30.0);
        let summary = uc.run(&mut sampler, writer).unwrap();

        assert_eq!(summary.frames_sampled, 10);
        assert_eq!(summary.regions_written, 10);
        assert_eq!(count.load(Ordering::SeqCst), 10);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_no_detections_still_finishes_writer() {
        let finished = std::sync::Arc::new(AtomicBool::new(false));
        let writer = BatchWriter::new(
            Box::new(CountingSink {
                count: Default::default(),
                finished: finished.clone(),
            }),
            100,
        );

        let mut uc = use_case(Vec::new(), false);
        let mut sampler = sampler(60, 30.0);
        let summary = uc.run(&mut sampler, writer).unwrap();
        assert_eq!(summary.frames_sampled, 2);
        assert_eq!(summary.regions_written, 0);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_residual_path_produces_same_counts() {
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let writer = BatchWriter::new(
            Box::new(CountingSink {
                count: count.clone(),
                finished: Default::default(),
            }),
            100,
        );

        let mut uc = use_case(one_face(), true);
        let mut sampler = sampler(90, 30.0);
        let summary = uc.run(&mut sampler, writer).unwrap();
        assert_eq!(summary.regions_written, 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cancellation_aborts_before_first_frame() {
        let writer = BatchWriter::new(
            Box::new(CountingSink {
                count: Default::default(),
                finished: Default::default(),
            }),
            100,
        );

        let cancelled = Arc::new(AtomicBool::new(true));
        let mut uc = ExtractFacesUseCase::new(
            Box::new(StubDetector {
                detections: one_face(),
            }),
            RegionExtractor::new(VIDEO_CONFIDENCE_THRESHOLD),
            None,
            Normalizer::new(48),
            1,
            cancelled,
        );
        let mut sampler = sampler(30, 30.0);
        let result = uc.run(&mut sampler, writer);
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[test]
    fn test_out_of_bounds_detections_are_dropped_not_fatal() {
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let writer = BatchWriter::new(
            Box::new(CountingSink {
                count: count.clone(),
                finished: Default::default(),
            }),
            100,
        );

        // Box spills past the 64x64 stub frames
        let mut uc = use_case(
            vec![Detection {
                x: 50,
                y: 50,
                width: 32,
                height: 32,
                confidence: 0.95,
            }],
            false,
        );
        let mut sampler = sampler(30, 30.0);
        let summary = uc.run(&mut sampler, writer).unwrap();
        assert_eq!(summary.frames_sampled, 1);
        assert_eq!(summary.regions_written, 0);
    }
}
