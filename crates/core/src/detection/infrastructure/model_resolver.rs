use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::error::PipelineError;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("no usable model cache directory on this platform")]
    NoCacheDir,
    #[error("fetching {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("storing model at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<ModelResolveError> for PipelineError {
    fn from(e: ModelResolveError) -> Self {
        PipelineError::DetectorInit(e.to_string())
    }
}

/// Progress callback: `(bytes_downloaded, total_bytes)`. `total_bytes` is 0
/// when the server sends no Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Locates a model file by name, downloading it on a cache miss.
///
/// Lookup order: user cache directory, then the bundled directory (if any),
/// then a streamed download into the cache.
pub fn resolve(
    name: &str,
    url: &str,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache_dir = model_cache_dir()?;
    let cached = cache_dir.join(name);
    if cached.exists() {
        return Ok(cached);
    }

    if let Some(bundled) = bundled_dir.map(|d| d.join(name)) {
        if bundled.exists() {
            return Ok(bundled);
        }
    }

    fs::create_dir_all(&cache_dir).map_err(|e| ModelResolveError::Store {
        path: cache_dir.clone(),
        source: e,
    })?;
    log::info!("downloading {name} from {url}");
    download(url, &cached, progress)?;
    Ok(cached)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/VeriFace/models/`
/// - Linux: `$XDG_CACHE_HOME/VeriFace/models/` or `~/.cache/VeriFace/models/`
/// - Windows: `%LOCALAPPDATA%/VeriFace/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join("VeriFace").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Streams a download to `<dest>.part`, renaming to `dest` only on success.
/// A failed or interrupted download leaves no partial file behind.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let part = dest.with_extension("part");
    let result = stream_to_part(url, dest, &part, progress);
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

fn stream_to_part(
    url: &str,
    dest: &Path,
    part: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let store_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| ModelResolveError::Store {
            path: path.clone(),
            source,
        }
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Fetch {
            url: url.to_string(),
            source: e,
        })?;
    let total = response.content_length().unwrap_or(0);

    let file = fs::File::create(part).map_err(store_error(part))?;
    let mut sink = ProgressWriter {
        file,
        written: 0,
        total,
        progress,
    };
    io::copy(&mut response, &mut sink).map_err(store_error(part))?;
    sink.file.flush().map_err(store_error(part))?;
    drop(sink);

    fs::rename(part, dest).map_err(store_error(dest))
}

struct ProgressWriter {
    file: fs::File,
    written: u64,
    total: u64,
    progress: Option<ProgressFn>,
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.written += n as u64;
        if let Some(cb) = &self.progress {
            cb(self.written, self.total);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
