pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod media;
pub mod region;
pub mod video_metadata;
