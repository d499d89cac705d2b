use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::region_extractor::RegionExtractor;
use crate::imaging::normalizer::Normalizer;
use crate::noise::residual_extractor::ResidualExtractor;
use crate::pipeline::analyze_media_use_case::ReaderFactory;
use crate::pipeline::extract_faces_use_case::{ExtractFacesUseCase, ExtractionSummary};
use crate::pipeline::worker_pool;
use crate::shared::config::ExtractionConfig;
use crate::shared::constants::{VIDEO_CONFIDENCE_THRESHOLD, VIDEO_EXTENSIONS};
use crate::shared::error::PipelineError;
use crate::sink::domain::batch_writer::BatchWriter;
use crate::video::domain::frame_sampler::FrameSampler;

/// One file's result in a directory run. Failures stay attached to their
/// file; they never abort the batch.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<ExtractionSummary, PipelineError>,
}

pub type DetectorFactory =
    Box<dyn Fn() -> Result<Box<dyn FaceDetector>, PipelineError> + Send + Sync>;

/// Batch extraction over every matching video under a root directory.
///
/// Files are enumerated recursively, matched against the extension
/// allow-list case-insensitively, and processed by a bounded pool with
/// one detector per worker. Each file writes its crops under a
/// destination subdirectory mirroring its relative path, so parallel
/// files never collide.
pub struct ExtractDirectoryUseCase {
    detector_factory: DetectorFactory,
    reader_factory: ReaderFactory,
    config: ExtractionConfig,
    use_residual: bool,
    workers: usize,
    cancelled: Arc<AtomicBool>,
}

impl ExtractDirectoryUseCase {
    pub fn new(
        detector_factory: DetectorFactory,
        reader_factory: ReaderFactory,
        config: ExtractionConfig,
        use_residual: bool,
        workers: usize,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            detector_factory,
            reader_factory,
            config,
            use_residual,
            workers,
            cancelled,
        }
    }

    pub fn run(&self, root: &Path, destination: &Path) -> Result<Vec<FileOutcome>, PipelineError> {
        self.run_with_extensions(root, destination, VIDEO_EXTENSIONS)
    }

    /// Outcomes come back in path-sorted order regardless of which worker
    /// finished first.
    pub fn run_with_extensions(
        &self,
        root: &Path,
        destination: &Path,
        extensions: &[&str],
    ) -> Result<Vec<FileOutcome>, PipelineError> {
        let mut files = Vec::new();
        collect_files(root, extensions, &mut files)?;
        files.sort();
        log::info!("found {} matching files under {}", files.len(), root.display());

        let jobs: Vec<(PathBuf, PathBuf)> = files
            .into_iter()
            .map(|path| {
                let rel = path.strip_prefix(root).unwrap_or(&path).with_extension("");
                let file_dest = destination.join(rel);
                (path, file_dest)
            })
            .collect();

        let outcomes = worker_pool::run_indexed(
            jobs,
            self.workers,
            || self.worker_state(),
            |state, (path, file_dest)| self.process_file(state, path, &file_dest),
        );
        Ok(outcomes)
    }

    fn worker_state(&self) -> Result<ExtractFacesUseCase, String> {
        let detector = (self.detector_factory)().map_err(|e| e.to_string())?;
        Ok(ExtractFacesUseCase::new(
            detector,
            RegionExtractor::new(VIDEO_CONFIDENCE_THRESHOLD),
            self.use_residual
                .then(|| ResidualExtractor::new(self.config.residual)),
            Normalizer::new(self.config.resolution),
            1,
            self.cancelled.clone(),
        ))
    }

    fn process_file(
        &self,
        state: &mut Result<ExtractFacesUseCase, String>,
        path: PathBuf,
        file_dest: &Path,
    ) -> FileOutcome {
        let result = match state {
            Err(msg) => Err(PipelineError::DetectorInit(msg.clone())),
            Ok(use_case) => {
                if self.cancelled.load(Ordering::Relaxed) {
                    Err(PipelineError::Cancelled)
                } else {
                    self.extract_one(use_case, &path, file_dest)
                }
            }
        };
        if let Err(ref e) = result {
            log::warn!("{}: {e}", path.display());
        }
        FileOutcome { path, result }
    }

    fn extract_one(
        &self,
        use_case: &mut ExtractFacesUseCase,
        path: &Path,
        file_dest: &Path,
    ) -> Result<ExtractionSummary, PipelineError> {
        let mut sampler = FrameSampler::new((self.reader_factory)(), self.config.interval_ms);
        sampler.open_path(path)?;
        let writer = BatchWriter::for_destination(file_dest, self.config.flush_threshold)?;
        use_case.run(&mut sampler, writer)
    }
}

fn collect_files(
    dir: &Path,
    extensions: &[&str],
    out: &mut Vec<PathBuf>,
) -> Result<(), PipelineError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, extensions, out)?;
        } else if matches_extension(&path, extensions) {
            out.push(path);
        }
    }
    Ok(())
}

fn matches_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}
