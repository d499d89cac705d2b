pub const YUNET_MODEL_NAME: &str = "face_detection_yunet_2023mar.onnx";
pub const YUNET_MODEL_URL: &str =
    "https://github.com/opencv/opencv_zoo/raw/main/models/face_detection_yunet/face_detection_yunet_2023mar.onnx";

/// Confidence cut-off for detections coming from sampled video frames.
pub const VIDEO_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Confidence cut-off for detections on single still images.
///
/// Deliberately stricter than [`VIDEO_CONFIDENCE_THRESHOLD`]: the two call
/// sites have always used different cut-offs and scoring behavior depends
/// on keeping them distinct.
pub const IMAGE_CONFIDENCE_THRESHOLD: f32 = 0.9;

/// Boxes with width or height at or below this are discarded as degenerate.
pub const MIN_REGION_SIZE: i32 = 10;

/// JPEG quality for crops and normalized output.
pub const JPEG_QUALITY: u8 = 95;

/// Buffered crops above this count trigger an automatic flush.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 100;

/// Milliseconds between sampled video frames.
pub const DEFAULT_INTERVAL_MS: u32 = 1000;

/// Side length of the square crops handed to the scorer.
pub const DEFAULT_RESOLUTION: u32 = 200;

/// Assumed frame rate when the container reports none.
pub const FALLBACK_FPS: f64 = 30.0;

/// Scorer model identifiers for the plain and residual paths.
pub const DEFAULT_MODEL_ID: &str = "default";
pub const NOISE_MODEL_ID: &str = "noise";

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "3gp", "ts",
];
