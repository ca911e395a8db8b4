//! PNG snapshots of rendered images.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use compute::{Image, MemoryDevice};

/// Writes images into one directory, prefixing every file with the time
/// the exporter was created so repeated runs never overwrite each other.
#[derive(Debug)]
pub struct PngExporter {
    dir: PathBuf,
    stamp: String,
    written: Vec<PathBuf>,
}

impl PngExporter {
    /// Creates `dir` if needed.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            stamp: chrono::Local::now().format("%Y%m%d-%H%M%S").to_string(),
            written: Vec::new(),
        })
    }

    /// Saves the host copy of `image` as `<stamp>_<label>_<frame>.png`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be encoded or written.
    pub fn save(&mut self, image: &Image<[u8; 4]>, frame: u64, label: &str) -> Result<PathBuf> {
        let dims = image.dims();
        let bytes: Vec<u8> = bytemuck::cast_slice(image.data(MemoryDevice::Host)).to_vec();
        let buffer = image::RgbaImage::from_raw(dims.x, dims.y, bytes)
            .context("image buffer does not match its dimensions")?;
        let path = self
            .dir
            .join(format!("{}_{label}_{frame:04}.png", self.stamp));
        buffer
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "exported image");
        self.written.push(path.clone());
        Ok(path)
    }

    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    #[must_use]
    pub fn into_written(self) -> Vec<PathBuf> {
        self.written
    }
}
