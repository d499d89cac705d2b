use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::shared::error::PipelineError;
use crate::shared::region::NormalizedCrop;
use crate::sink::domain::crop_sink::CropSink;

/// Writes crops as loose `face_<uuid>.jpg` files in a directory.
///
/// Random names let concurrent runs share one output directory without
/// clobbering each other.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn create(dir: &Path) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CropSink for DirectorySink {
    fn write_batch(&mut self, crops: &[NormalizedCrop]) -> Result<(), PipelineError> {
        for crop in crops {
            let name = format!("face_{}.jpg", Uuid::new_v4());
            std::fs::write(self.dir.join(name), crop)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}
