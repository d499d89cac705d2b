pub mod batch_writer;
pub mod crop_sink;
