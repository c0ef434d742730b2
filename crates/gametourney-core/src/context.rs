// Current-tournament context file: which tournament commands act on.

use std::path::{Path, PathBuf};

use atomic_write_file::AtomicWriteFile;
use thiserror::Error;
use tracing::info;

use crate::models::Tournament;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no current tournament is set ({path} does not exist); run `set-tournament` or `new-tournament` first")]
    NotSet { path: PathBuf },

    #[error("failed to access tournament context file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("tournament context file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize tournament context for {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Make `tournament` the current one by writing it to `path`.
///
/// The file is replaced atomically, so readers see either the previous
/// tournament or the new one.
pub fn set_current_tournament(path: &Path, tournament: &Tournament) -> Result<(), ContextError> {
    let io_error = |source| ContextError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let mut file = AtomicWriteFile::open(path).map_err(io_error)?;
    serde_json::to_writer_pretty(&mut file, tournament).map_err(|e| ContextError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;
    file.commit().map_err(io_error)?;

    info!(tournament_id = tournament.id, name = %tournament.name, "current tournament set");
    Ok(())
}

/// Read the current tournament from `path`.
pub fn get_current_tournament(path: &Path) -> Result<Tournament, ContextError> {
    if !path.exists() {
        return Err(ContextError::NotSet {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|e| ContextError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| ContextError::Malformed {
        path: path.to_path_buf(),
        source: e,
    })
}
