use geostitch_lib::StitchError;
use std::path::PathBuf;

/// Failures that abort a run
///
/// Problems with individual fragments never end up here; the engine reports them as
/// diagnostics in the output document.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    Write(#[from] std::io::Error),

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to encode output: {0}")]
    Encode(serde_json::Error),

    #[error("Fragment {id}: {source}")]
    Category { id: u64, source: StitchError },

    #[error("Boundary relation {0} has no closed outer ring")]
    EmptyBoundary(u64),
}

pub type Result<T> = std::result::Result<T, CliError>;
