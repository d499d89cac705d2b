//! Media-to-feature pipeline for face authenticity scoring.
//!
//! Raw image/video bytes go through frame sampling, face region detection,
//! optional noise-residual extraction, and normalization, ending either in
//! batched dataset output or in per-crop scoring aggregated to a single
//! probability. Decode, inference, and filesystem concerns live in
//! `infrastructure` modules; the `domain` modules hold the traits and the
//! pure pipeline logic.

pub mod detection;
pub mod imaging;
pub mod noise;
pub mod pipeline;
pub mod scoring;
pub mod shared;
pub mod sink;
pub mod video;
