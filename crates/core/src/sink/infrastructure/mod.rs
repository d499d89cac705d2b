pub mod directory_sink;
pub mod zip_sink;
