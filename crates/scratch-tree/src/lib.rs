//! # scratch-tree
//!
//! Disposable source trees laid out the way GOPATH-style toolchains expect.
//!
//! A [`Workspace`] owns a root directory with `src/`, `pkg/` and `bin/`
//! beneath it, optionally prepends that root to a search path variable,
//! and accepts files by direct write, copy, or template rendering. Reset
//! restores the variable and, when asked, deletes the tree.
//!
//! ## Key components
//!
//! - [`Workspace`] — lifecycle of one tree: create, fill, reset.
//! - [`SearchPath`] — the environment variable plus its in-process cached
//!   copy. [`ProcessSearchPath`] is the real thing, [`MemorySearchPath`]
//!   an in-memory stand-in for tests.
//! - [`SourceFile`] — declarative "put this file there" entries, used by
//!   [`Workspace::copy_all`] and by [`ScaffoldConfig`] files.
//!
//! ```no_run
//! use scratch_tree::{SourceFile, Workspace};
//!
//! let ws = Workspace::with_temporary_directory(
//!     "fixture",
//!     &[SourceFile::with_content("example.com/hello/hello.go", "package hello\n")],
//! )?;
//! // GOPATH now starts with ws.root(); run the build here.
//! ws.reset();
//! # Ok::<(), scratch_tree::WorkspaceError>(())
//! ```

pub mod config;
pub mod error;
pub mod search_path;
pub mod source_file;
pub mod workspace;

pub use config::{ScaffoldConfig, SearchPathConfig};
pub use error::WorkspaceError;
pub use search_path::{MemorySearchPath, ProcessSearchPath, SearchPath};
pub use source_file::SourceFile;
pub use workspace::Workspace;
