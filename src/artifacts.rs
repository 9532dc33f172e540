//! Output directory with fixed artifact names.
//!
//! Each run overwrites the previous run's files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PipelineError, Result};

pub const DISCOVERY_FILE: &str = "discovery.json";
pub const MEMO_FILE: &str = "memo.txt";
pub const AUDIO_FILE: &str = "memo.mp3";

#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn discovery_path(&self) -> PathBuf {
        self.root.join(DISCOVERY_FILE)
    }

    pub fn memo_path(&self) -> PathBuf {
        self.root.join(MEMO_FILE)
    }

    pub fn audio_path(&self) -> PathBuf {
        self.root.join(AUDIO_FILE)
    }

    /// Write `contents` to `path`, creating the output directory first.
    pub fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| PipelineError::io(&self.root, e))?;
        fs::write(path, contents).map_err(|e| PipelineError::io(path, e))?;
        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_directory_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let out = OutputDir::new(tmp.path().join("nested/output"));

        out.write(&out.memo_path(), b"first").unwrap();
        out.write(&out.memo_path(), b"second").unwrap();

        assert_eq!(fs::read(out.memo_path()).unwrap(), b"second");
        assert!(out.memo_path().ends_with("nested/output/memo.txt"));
    }
}
