// error.rs — Error types for scratch tree provisioning.

use std::ffi::OsString;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building, filling or tearing down a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// One of the workspace directories (or a parent of a written file)
    /// could not be created.
    #[error("failed to create {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The in-process cached search path disagrees with the environment,
    /// so patching it could not be reversed reliably.
    #[error("{variable} {environment:?} doesn't match cached value {cached:?}")]
    ConfigurationMismatch {
        variable: String,
        environment: OsString,
        cached: OsString,
    },

    /// The destination file could not be opened for writing.
    #[error("couldn't open {path} for writing: {source}")]
    FileOpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file to copy from could not be opened.
    #[error("failed to open {path}: {source}")]
    SourceOpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Copying bytes into the destination failed part way.
    #[error("copy into {path} failed: {source}")]
    CopyFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The template collaborator refused to render.
    #[error("failed to generate from template '{template}': {source}")]
    TemplateRenderFailed {
        template: String,
        source: minijinja::Error,
    },

    /// A [`SourceFile`](crate::SourceFile) carried neither content nor a source path.
    #[error("source file for '{}' has neither content nor a source path", .dest.display())]
    InvalidSourceFile { dest: PathBuf },

    /// A relative path would land outside the `src` directory.
    #[error("path '{path}' resolves outside the source directory")]
    PathEscapesSource { path: String },

    /// Removing the workspace tree during teardown failed.
    #[error("failed to remove {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading back a file or listing the source tree failed.
    #[error("I/O error at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The scaffold configuration file could not be read or parsed.
    #[error("invalid scaffold config {path}: {message}")]
    ConfigLoad { path: PathBuf, message: String },
}
