//! Fatal setup errors for the sitegrab tools.
//!
//! Per-site fetch failures are never represented here: they are data and end
//! up in the output record's `error` field. This enum covers only the
//! conditions that abort a run with a non-zero exit code.

/// Fatal errors for the grab and sift binaries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The sitelist could not be resolved to any hostnames.
    #[error("unreadable sitelist: {0}")]
    Sitelist(String),

    /// An output file could not be created.
    #[error("cannot create output file {path}: {source}")]
    CreateFile {
        path: String,
        source: std::io::Error,
    },

    /// An output folder could not be created.
    #[error("cannot create output folder {path}: {source}")]
    CreateFolder {
        path: String,
        source: std::io::Error,
    },

    /// A configured output format is not recognized.
    #[error("unknown output format: {0}")]
    UnknownFormat(String),

    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// A regular expression failed to compile.
    #[error("invalid regular expression {pattern}: {message}")]
    Regex { pattern: String, message: String },

    /// The input glob pattern is malformed.
    #[error("invalid glob pattern {pattern}: {message}")]
    Glob { pattern: String, message: String },
}
