use std::path::Path;

use crate::shared::error::PipelineError;
use crate::shared::region::NormalizedCrop;
use crate::sink::domain::crop_sink::CropSink;
use crate::sink::infrastructure::directory_sink::DirectorySink;
use crate::sink::infrastructure::zip_sink::ZipSink;

/// Buffers crops and hands them to the sink in batches.
///
/// A flush fires automatically once the buffer exceeds the threshold;
/// `finish` flushes whatever remains and closes the sink, so short runs
/// that never hit the threshold still land on disk.
pub struct BatchWriter {
    sink: Box<dyn CropSink>,
    buffer: Vec<NormalizedCrop>,
    flush_threshold: usize,
    written: usize,
}

impl BatchWriter {
    pub fn new(sink: Box<dyn CropSink>, flush_threshold: usize) -> Self {
        Self {
            sink,
            buffer: Vec::new(),
            flush_threshold: flush_threshold.max(1),
            written: 0,
        }
    }

    /// Picks the sink from the destination path: a `.zip` extension means
    /// an archive, anything else a directory of loose files. A non-zip
    /// extension is stripped so `out.dat` becomes the directory `out`.
    pub fn for_destination(
        destination: &Path,
        flush_threshold: usize,
    ) -> Result<Self, PipelineError> {
        let is_zip = destination
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        let sink: Box<dyn CropSink> = if is_zip {
            Box::new(ZipSink::create(destination)?)
        } else if destination.extension().is_some() {
            let dir = destination.with_extension("");
            log::debug!(
                "destination {} has a file extension, writing to {}",
                destination.display(),
                dir.display()
            );
            Box::new(DirectorySink::create(&dir)?)
        } else {
            Box::new(DirectorySink::create(destination)?)
        };
        Ok(Self::new(sink, flush_threshold))
    }

    /// Crops written to the sink so far, excluding the buffered tail.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn push(&mut self, crop: NormalizedCrop) -> Result<(), PipelineError> {
        self.buffer.push(crop);
        if self.buffer.len() > self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    pub fn push_all(&mut self, crops: Vec<NormalizedCrop>) -> Result<(), PipelineError> {
        for crop in crops {
            self.push(crop)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PipelineError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.sink.write_batch(&self.buffer)?;
        self.written += self.buffer.len();
        self.buffer.clear();
        Ok(())
    }

    /// Flushes the tail and closes the sink. Consumes the writer so no
    /// crops can arrive after the container is sealed.
    pub fn finish(mut self) -> Result<usize, PipelineError> {
        self.flush()?;
        self.sink.finish()?;
        Ok(self.written)
    }
}
