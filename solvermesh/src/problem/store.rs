//! File persistence for problem and data descriptions.

use crate::error::SolverError;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes received problem and data files under the problem-file directory.
///
/// The store flattens incoming names to their final path component so a
/// hostile file name cannot escape the directory.
#[derive(Clone, Debug)]
pub struct ProblemStore {
    directory: PathBuf,
}

impl ProblemStore {
    /// Creates a store rooted at `directory`, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, SolverError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|error| SolverError::io(&directory, error))?;
        Ok(Self { directory })
    }

    /// The directory files are stored under.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Saves file contents under the given name, returning the full path.
    pub fn save(&self, file_name: &str, contents: &str) -> Result<PathBuf, SolverError> {
        let flattened = Path::new(file_name)
            .file_name()
            .ok_or_else(|| {
                SolverError::io(
                    self.directory.join(file_name),
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty file name"),
                )
            })?
            .to_owned();

        let path = self.directory.join(flattened);
        fs::write(&path, contents).map_err(|error| SolverError::io(&path, error))?;
        Ok(path)
    }
}
