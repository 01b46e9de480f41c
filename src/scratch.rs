//! Scratch output files.
//!
//! A [`ScratchOutput`] owns the temporary file a transform writes into. The
//! file is deleted when the value is dropped, on every path, unless it is
//! explicitly [retained](ScratchOutput::retain) at a stable location.

use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};

use crate::errors::{HarnessError, HarnessResult};

const SCRATCH_PREFIX: &str = ".goldrun-";

#[derive(Debug)]
pub struct ScratchOutput {
    file: NamedTempFile,
}

impl ScratchOutput {
    /// Creates a uniquely named scratch file in `dir`.
    ///
    /// The name never includes the fixture name, so it stays short however
    /// long the case names get.
    pub fn create_in(dir: &Path) -> HarnessResult<Self> {
        let file = Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| HarnessError::io(dir, e))?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// A second handle on the file, suitable for a child's stdout.
    pub fn writer(&self) -> std::io::Result<File> {
        self.file.reopen()
    }

    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.file.path())
    }

    /// Moves the scratch file to `dest`, replacing anything already there.
    ///
    /// Falls back to copying when `dest` is on another filesystem.
    pub fn retain(self, dest: &Path) -> HarnessResult<PathBuf> {
        match self.file.persist(dest) {
            Ok(_) => Ok(dest.to_path_buf()),
            Err(e) => {
                let file = e.file;
                std::fs::copy(file.path(), dest).map_err(|err| HarnessError::io(dest, err))?;
                Ok(dest.to_path_buf())
            }
        }
    }
}

/// True when `name` looks like a leftover scratch file.
pub fn is_scratch_name(name: &str) -> bool {
    name.starts_with(SCRATCH_PREFIX) && name.ends_with(".tmp")
}
