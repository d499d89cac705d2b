use std::io::Write;
use std::path::Path;

use crate::shared::constants::FALLBACK_FPS;
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::media::MediaBlob;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Frames to keep: every `stride`-th decoded frame covers one sampling
/// interval. fps at or below zero falls back to [`FALLBACK_FPS`].
pub fn sample_stride(fps: f64, interval_ms: u32) -> usize {
    let fps = if fps > 0.0 { fps } else { FALLBACK_FPS };
    let stride = (fps * interval_ms as f64 / 1000.0).round() as usize;
    stride.max(1)
}

/// Samples frames from a video at a fixed time interval.
///
/// A [`MediaBlob`] is materialized to a private temp file so the file-based
/// decoder can open it; the file is removed when sampling ends, on every
/// path (the handle deletes it on drop).
pub struct FrameSampler {
    reader: Box<dyn VideoReader>,
    interval_ms: u32,
    temp: Option<tempfile::NamedTempFile>,
    stride: usize,
}

impl FrameSampler {
    pub fn new(reader: Box<dyn VideoReader>, interval_ms: u32) -> Self {
        Self {
            reader,
            interval_ms,
            temp: None,
            stride: 1,
        }
    }

    /// Writes the blob to a scoped temp file and opens it for sampling.
    pub fn open_blob(&mut self, blob: &MediaBlob) -> Result<VideoMetadata, PipelineError> {
        let mut temp = tempfile::NamedTempFile::new()?;
        temp.write_all(blob.bytes())?;
        temp.flush()?;

        let metadata = match self.reader.open(temp.path()) {
            Ok(m) => m,
            Err(e) => {
                // temp dropped here, file removed
                return Err(e);
            }
        };
        self.stride = sample_stride(metadata.fps, self.interval_ms);
        self.temp = Some(temp);
        Ok(metadata)
    }

    /// Opens an on-disk video directly, without the temp-file hop.
    pub fn open_path(&mut self, path: &Path) -> Result<VideoMetadata, PipelineError> {
        let metadata = self.reader.open(path)?;
        self.stride = sample_stride(metadata.fps, self.interval_ms);
        Ok(metadata)
    }

    /// Lazy single-pass sequence of sampled frames in source order.
    ///
    /// Decode errors pass through; frames off the sampling grid are decoded
    /// and discarded.
    pub fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, PipelineError>> + '_> {
        let stride = self.stride;
        Box::new(self.reader.frames().filter(move |result| match result {
            Ok(frame) => frame.index() % stride == 0,
            Err(_) => true,
        }))
    }

    /// Releases the decoder and deletes the temp file. Idempotent.
    pub fn close(&mut self) {
        self.reader.close();
        self.temp = None;
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::one_per_second_at_30fps(30.0, 1000, 30)]
    #[case::one_per_second_at_25fps(25.0, 1000, 25)]
    #[case::half_second(30.0, 500, 15)]
    #[case::rounds_to_nearest(29.97, 1000, 30)]
    #[case::interval_shorter_than_frame(30.0, 10, 1)]
    #[case::fallback_when_fps_zero(0.0, 1000, 30)]
    #[case::fallback_when_fps_negative(-1.0, 1000, 30)]
    fn test_sample_stride(#[case] fps: f64, #[case] interval_ms: u32, #[case] expected: usize) {
        assert_eq!(sample_stride(fps, interval_ms), expected);
    }

    struct StubReader {
        frames: Vec<Frame>,
        fps: f64,
        fail_open: bool,
    }

    impl StubReader {
        fn with_frames(count: usize, fps: f64) -> Self {
            let frames = (0..count)
                .map(|i| Frame::new(vec![0u8; 12], 2, 2, 3, i))
                .collect();
            Self {
                frames,
                fps,
                fail_open: false,
            }
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, path: &Path) -> Result<VideoMetadata, PipelineError> {
            if self.fail_open {
                return Err(PipelineError::MediaOpen("stub".into()));
            }
            Ok(VideoMetadata {
                width: 2,
                height: 2,
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

    #[test]
    fn test_samples_every_stride_th_frame() {
        // 300 frames at 30 fps with 1000ms interval -> frames 0, 30, ..., 270
        let reader = StubReader::with_frames(300, 30.0);
        let mut sampler = FrameSampler::new(Box::new(reader), 1000);
        sampler.open_blob(&MediaBlob::video(vec![0u8; 16])).unwrap();

        let sampled: Vec<Frame> = sampler.frames().map(|f| f.unwrap()).collect();
        assert_eq!(sampled.len(), 10);
        for (i, frame) in sampled.iter().enumerate() {
            assert_eq!(frame.index(), i * 30);
        }
    }

    #[test]
    fn test_fps_fallback_uses_30() {
        let reader = StubReader::with_frames(90, 0.0);
        let mut sampler = FrameSampler::new(Box::new(reader), 1000);
        sampler.open_blob(&MediaBlob::video(vec![0u8; 16])).unwrap();

        let sampled: Vec<_> = sampler.frames().collect();
        assert_eq!(sampled.len(), 3);
    }

    #[test]
    fn test_short_video_yields_first_frame_only() {
        let reader = StubReader::with_frames(10, 30.0);
        let mut sampler = FrameSampler::new(Box::new(reader), 1000);
        sampler.open_blob(&MediaBlob::video(vec![0u8; 16])).unwrap();

        let sampled: Vec<_> = sampler.frames().collect();
        assert_eq!(sampled.len(), 1);
    }

    #[test]
    fn test_temp_file_removed_after_close() {
        let reader = StubReader::with_frames(1, 30.0);
        let mut sampler = FrameSampler::new(Box::new(reader), 1000);
        sampler.open_blob(&MediaBlob::video(vec![1, 2, 3])).unwrap();

        let temp_path = sampler.temp.as_ref().unwrap().path().to_path_buf();
        assert!(temp_path.exists());
        sampler.close();
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_temp_file_removed_on_open_error() {
        let mut reader = StubReader::with_frames(0, 30.0);
        reader.fail_open = true;
        let mut sampler = FrameSampler::new(Box::new(reader), 1000);

        let result = sampler.open_blob(&MediaBlob::video(vec![1, 2, 3]));
        assert!(matches!(result, Err(PipelineError::MediaOpen(_))));
        assert!(sampler.temp.is_none());
    }

    #[test]
    fn test_blob_bytes_reach_the_reader() {
        let reader = StubReader::with_frames(1, 30.0);
        let mut sampler = FrameSampler::new(Box::new(reader), 1000);
        sampler
            .open_blob(&MediaBlob::video(vec![7u8; 32]))
            .unwrap();

        let temp_path = sampler.temp.as_ref().unwrap().path().to_path_buf();
        assert_eq!(std::fs::read(temp_path).unwrap(), vec![7u8; 32]);
    }

    #[test]
    fn test_close_idempotent() {
        let reader = StubReader::with_frames(1, 30.0);
        let mut sampler = FrameSampler::new(Box::new(reader), 1000);
        sampler.open_blob(&MediaBlob::video(vec![0])).unwrap();
        sampler.close();
        sampler.close();
    }
}
