use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use veriface_core::detection::domain::face_detector::FaceDetector;
use veriface_core::detection::infrastructure::model_resolver;
use veriface_core::detection::infrastructure::onnx_yunet_detector::OnnxYunetDetector;
use veriface_core::pipeline::analyze_media_use_case::AnalyzeMediaUseCase;
use veriface_core::pipeline::extract_directory_use_case::ExtractDirectoryUseCase;
use veriface_core::pipeline::extract_faces_use_case::ExtractFacesUseCase;
use veriface_core::scoring::infrastructure::onnx_scorer::OnnxScorer;
use veriface_core::shared::config::{ExtractionConfig, ResidualConfig};
use veriface_core::shared::constants::{
    DEFAULT_MODEL_ID, IMAGE_CONFIDENCE_THRESHOLD, NOISE_MODEL_ID, VIDEO_CONFIDENCE_THRESHOLD,
    VIDEO_EXTENSIONS, YUNET_MODEL_NAME, YUNET_MODEL_URL,
};
use veriface_core::shared::media::MediaBlob;
use veriface_core::detection::domain::region_extractor::RegionExtractor;
use veriface_core::imaging::normalizer::Normalizer;
use veriface_core::noise::residual_extractor::ResidualExtractor;
use veriface_core::sink::domain::batch_writer::BatchWriter;
use veriface_core::video::domain::frame_sampler::FrameSampler;
use veriface_core::video::domain::video_reader::VideoReader;
use veriface_core::video::infrastructure::ffmpeg_reader::FfmpegReader;

/// Face authenticity scoring and crop extraction for videos and images.
#[derive(Parser)]
#[command(name = "veriface")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score a media file and print its authenticity verdict.
    Analyze {
        /// Input video or image file.
        input: PathBuf,

        /// Path to the scorer model for plain crops.
        #[arg(long)]
        model: Option<PathBuf>,

        /// Path to the scorer model for noise residuals.
        #[arg(long)]
        noise_model: Option<PathBuf>,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Extract normalized face crops from one media file.
    Extract {
        /// Input video or image file.
        input: PathBuf,

        /// Output directory, or a .zip path for a single archive.
        output: PathBuf,

        /// Region workers (default: CPU count).
        #[arg(long)]
        jobs: Option<usize>,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Extract crops from every video under a directory.
    ExtractDir {
        /// Root directory to scan recursively.
        input: PathBuf,

        /// Output directory; each file gets its own subdirectory.
        output: PathBuf,

        /// Parallel file workers (default: CPU count).
        #[arg(long)]
        jobs: Option<usize>,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[derive(Args)]
struct PipelineArgs {
    /// Milliseconds between sampled video frames.
    #[arg(long, default_value = "1000")]
    interval: u32,

    /// Side length of the square output crops.
    #[arg(long, default_value = "200")]
    resolution: u32,

    /// Work on noise residuals instead of plain crops.
    #[arg(long)]
    noise: bool,

    /// Median filter passes for the residual (1-10).
    #[arg(long, default_value = "1")]
    iterations: u32,

    /// Residual amplification factor (0.1-100).
    #[arg(long, default_value = "1.0")]
    gain: f64,

    /// Skip per-channel histogram equalization of the residual.
    #[arg(long)]
    no_equalize: bool,

    /// Buffered crops before an automatic flush.
    #[arg(long, default_value = "100")]
    flush_threshold: usize,
}

impl PipelineArgs {
    fn to_config(&self) -> ExtractionConfig {
        ExtractionConfig {
            interval_ms: self.interval,
            resolution: self.resolution,
            residual: ResidualConfig::new(self.iterations, self.gain, !self.no_equalize),
            flush_threshold: self.flush_threshold,
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Analyze {
            input,
            model,
            noise_model,
            pipeline,
        } => run_analyze(&input, model, noise_model, &pipeline),
        Command::Extract {
            input,
            output,
            jobs,
            pipeline,
        } => run_extract(&input, &output, jobs, &pipeline),
        Command::ExtractDir {
            input,
            output,
            jobs,
            pipeline,
        } => run_extract_dir(&input, &output, jobs, &pipeline),
    }
}

fn run_analyze(
    input: &Path,
    model: Option<PathBuf>,
    noise_model: Option<PathBuf>,
    pipeline: &PipelineArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut scorer = OnnxScorer::new();
    if let Some(path) = model {
        scorer.register(DEFAULT_MODEL_ID, path);
    }
    if let Some(path) = noise_model {
        scorer.register(NOISE_MODEL_ID, path);
    }
    let needed = if pipeline.noise {
        NOISE_MODEL_ID
    } else {
        DEFAULT_MODEL_ID
    };
    if !scorer.model_ids().any(|id| id == needed) {
        return Err(format!(
            "no scorer model registered for '{needed}': pass --{}",
            if pipeline.noise { "noise-model" } else { "model" }
        )
        .into());
    }

    let blob = read_blob(input)?;
    let mut use_case = AnalyzeMediaUseCase::new(
        build_detector()?,
        Box::new(scorer),
        Box::new(|| Box::new(FfmpegReader::new()) as Box<dyn VideoReader>),
        pipeline.to_config(),
        Arc::new(AtomicBool::new(false)),
    );
    let report = use_case.analyze(&blob, pipeline.noise)?;

    println!(
        "{}: score {:.4} over {} regions",
        input.display(),
        report.score,
        report.regions_scored
    );
    Ok(())
}

fn run_extract(
    input: &Path,
    output: &Path,
    jobs: Option<usize>,
    pipeline: &PipelineArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline.to_config();
    let threshold = if is_video(input) {
        VIDEO_CONFIDENCE_THRESHOLD
    } else {
        IMAGE_CONFIDENCE_THRESHOLD
    };

    let mut use_case = ExtractFacesUseCase::new(
        build_detector()?,
        RegionExtractor::new(threshold),
        pipeline
            .noise
            .then(|| ResidualExtractor::new(config.residual)),
        Normalizer::new(config.resolution),
        jobs.unwrap_or_else(num_cpus::get),
        Arc::new(AtomicBool::new(false)),
    );

    let mut sampler = FrameSampler::new(open_reader(input), config.interval_ms);
    sampler.open_path(input)?;
    let writer = BatchWriter::for_destination(output, config.flush_threshold)?;
    let summary = use_case.run(&mut sampler, writer)?;

    println!(
        "{}: wrote {} crops from {} sampled frames to {}",
        input.display(),
        summary.regions_written,
        summary.frames_sampled,
        output.display()
    );
    Ok(())
}

fn run_extract_dir(
    input: &Path,
    output: &Path,
    jobs: Option<usize>,
    pipeline: &PipelineArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    // Resolve once up front so workers share the downloaded file.
    let model_path = resolve_detector_model()?;
    let factory_path = model_path.clone();

    let use_case = ExtractDirectoryUseCase::new(
        Box::new(move || {
            Ok(Box::new(OnnxYunetDetector::new(&factory_path)?) as Box<dyn FaceDetector>)
        }),
        Box::new(|| Box::new(FfmpegReader::new()) as Box<dyn VideoReader>),
        pipeline.to_config(),
        pipeline.noise,
        jobs.unwrap_or_else(num_cpus::get),
        Arc::new(AtomicBool::new(false)),
    );

    let outcomes = use_case.run(input, output)?;

    let mut failures = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(summary) => println!(
                "{}: {} crops from {} frames",
                outcome.path.display(),
                summary.regions_written,
                summary.frames_sampled
            ),
            Err(e) => {
                failures += 1;
                println!("{}: FAILED: {e}", outcome.path.display());
            }
        }
    }
    println!("{} files processed, {failures} failed", outcomes.len());
    if failures > 0 && failures == outcomes.len() {
        return Err("every file failed".into());
    }
    Ok(())
}

fn build_detector() -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let model_path = resolve_detector_model()?;
    Ok(Box::new(OnnxYunetDetector::new(&model_path)?))
}

fn resolve_detector_model() -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YUNET_MODEL_NAME}");
    let path = model_resolver::resolve(
        YUNET_MODEL_NAME,
        YUNET_MODEL_URL,
        None,
        Some(Box::new(download_progress)),
    )?;
    eprintln!();
    Ok(path)
}

fn read_blob(input: &Path) -> Result<MediaBlob, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(input)
        .map_err(|e| format!("cannot read {}: {e}", input.display()))?;
    Ok(if is_video(input) {
        MediaBlob::video(bytes)
    } else {
        MediaBlob::image(bytes)
    })
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn open_reader(input: &Path) -> Box<dyn VideoReader> {
    if is_video(input) {
        Box::new(FfmpegReader::new())
    } else {
        Box::new(
            veriface_core::video::infrastructure::image_file_reader::ImageFileReader::new(),
        )
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
