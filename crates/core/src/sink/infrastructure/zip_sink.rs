use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::shared::error::PipelineError;
use crate::shared::region::NormalizedCrop;
use crate::sink::domain::crop_sink::CropSink;

fn zip_error(e: zip::result::ZipError) -> PipelineError {
    PipelineError::Io(std::io::Error::other(e.to_string()))
}

/// Writes crops as sequential `face_NNN.jpg` entries in a zip archive.
///
/// The archive is invalid until `finish` writes the central directory, so
/// the writer refuses entries after that point.
pub struct ZipSink {
    writer: Option<ZipWriter<File>>,
    counter: usize,
}

impl ZipSink {
    pub fn create(path: &Path) -> Result<Self, PipelineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: Some(ZipWriter::new(file)),
            counter: 0,
        })
    }
}

impl CropSink for ZipSink {
    fn write_batch(&mut self, crops: &[NormalizedCrop]) -> Result<(), PipelineError> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            PipelineError::Io(std::io::Error::other("archive already finished"))
        })?;
        for crop in crops {
            let name = format!("face_{:03}.jpg", self.counter);
            writer
                .start_file(name, SimpleFileOptions::default())
                .map_err(zip_error)?;
            writer.write_all(crop)?;
            self.counter += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PipelineError> {
        if let Some(writer) = self.writer.take() {
            writer.finish().map_err(zip_error)?;
        }
        Ok(())
    }
}
