// workspace.rs — A disposable toolchain-style source tree.
//
// A Workspace owns a root directory laid out the way GOPATH-style toolchains
// expect it:
//
//   root/
//     src/   <- every ingested file lands here
//     pkg/
//     bin/
//
// Key design:
// - The three subdirectories are created eagerly, owner-only (0700)
// - Optionally the root is prepended to a search path variable; the value
//   it replaced is kept so teardown can put it back verbatim
// - Files arrive by direct write, copy, or template rendering
// - Teardown never fails: errors are collected and logged

use std::env;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::config::ScaffoldConfig;
use crate::error::WorkspaceError;
use crate::search_path::{ProcessSearchPath, SearchPath};
use crate::source_file::SourceFile;

/// Permission bits for every directory the workspace creates.
pub const DIR_MODE: u32 = 0o700;

/// Permission bits for every file the workspace creates.
pub const FILE_MODE: u32 = 0o600;

/// A provisioned `src`/`pkg`/`bin` tree.
///
/// Tear it down with [`reset`](Workspace::reset). A workspace dropped
/// without an explicit reset is reset on drop.
#[derive(Debug)]
pub struct Workspace<S: SearchPath = ProcessSearchPath> {
    root: PathBuf,
    src_dir: PathBuf,
    pkg_dir: PathBuf,
    bin_dir: PathBuf,

    search_path: S,

    /// Search path value before this workspace patched it.
    /// `Some` exactly when construction mutated the search path.
    original_search_path: Option<OsString>,

    delete_on_reset: bool,
    torn_down: bool,
}

impl Workspace<ProcessSearchPath> {
    /// Create a workspace rooted at `dir`, patching the default search
    /// path variable (`GOPATH`) when `mutate_search_path` is set.
    pub fn create(dir: impl AsRef<Path>, mutate_search_path: bool) -> Result<Self, WorkspaceError> {
        Self::create_with(dir, ProcessSearchPath::default(), mutate_search_path)
    }

    /// Create a workspace in a fresh temporary directory, patch `GOPATH`,
    /// and fill it with `files`. The directory is deleted on reset.
    pub fn with_temporary_directory(
        prefix: &str,
        files: &[SourceFile],
    ) -> Result<Self, WorkspaceError> {
        Self::with_temporary_directory_using(prefix, files, ProcessSearchPath::default())
    }

    /// Provision a workspace as described by `config`, patching the
    /// configured variable of the real process environment.
    pub fn from_config(config: &ScaffoldConfig) -> Result<Self, WorkspaceError> {
        let search_path = ProcessSearchPath::new(config.search_path.variable.clone());
        Self::from_config_with(config, search_path)
    }
}

impl<S: SearchPath> Workspace<S> {
    /// Create a workspace rooted at `dir` against an explicit search path.
    ///
    /// `dir` may already exist. Relative paths are made absolute against
    /// the current directory so the patched search path stays meaningful.
    pub fn create_with(
        dir: impl AsRef<Path>,
        search_path: S,
        mutate_search_path: bool,
    ) -> Result<Self, WorkspaceError> {
        let root = absolute(dir.as_ref())?;
        let src_dir = root.join("src");
        let pkg_dir = root.join("pkg");
        let bin_dir = root.join("bin");

        for dir in [&src_dir, &pkg_dir, &bin_dir] {
            create_private_dir_all(dir)?;
        }
        tracing::debug!(root = %root.display(), "created workspace layout");

        let original_search_path = if mutate_search_path {
            Some(search_path.prepend(&root)?)
        } else {
            None
        };

        Ok(Self {
            root,
            src_dir,
            pkg_dir,
            bin_dir,
            search_path,
            original_search_path,
            delete_on_reset: false,
            torn_down: false,
        })
    }

    /// Allocate a temporary directory named after `prefix`, create a
    /// search-path-patching workspace in it and copy `files` in.
    ///
    /// Nothing leaks on failure: the directory is removed and the search
    /// path restored before the error is returned.
    pub fn with_temporary_directory_using(
        prefix: &str,
        files: &[SourceFile],
        search_path: S,
    ) -> Result<Self, WorkspaceError> {
        Self::temporary(prefix, search_path, true)?.filled_with(files)
    }

    /// Provision a workspace as described by `config` against an explicit
    /// search path. The configured variable name is not consulted.
    pub fn from_config_with(config: &ScaffoldConfig, search_path: S) -> Result<Self, WorkspaceError> {
        let mutate = config.search_path.mutate;
        let mut workspace = match &config.root {
            Some(root) => {
                let mut workspace = Self::create_with(root, search_path, mutate)?;
                workspace.delete_on_reset = config.delete_root;
                workspace
            }
            None => {
                let mut workspace = Self::temporary(&config.prefix, search_path, mutate)?;
                workspace.set_delete_on_reset(config.keep);
                workspace
            }
        };
        workspace = workspace.filled_with(&config.files)?;
        tracing::info!(
            root = %workspace.root.display(),
            files = config.files.len(),
            "provisioned workspace from config"
        );
        Ok(workspace)
    }

    /// A workspace in a new temporary directory, marked for deletion.
    fn temporary(prefix: &str, search_path: S, mutate: bool) -> Result<Self, WorkspaceError> {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(|source| WorkspaceError::DirectoryCreationFailed {
                path: env::temp_dir(),
                source,
            })?;

        // `temp` still owns the directory here, so a failed create removes it.
        let mut workspace = Self::create_with(temp.path(), search_path, mutate)?;
        let _ = temp.keep();
        workspace.delete_on_reset = true;
        Ok(workspace)
    }

    /// Copy `files` in, tearing the workspace down if any of them fails.
    fn filled_with(self, files: &[SourceFile]) -> Result<Self, WorkspaceError> {
        match self.copy_all(files) {
            Ok(()) => Ok(self),
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Root of the tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `src` directory; every relative path in this API is under it.
    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    pub fn pkg_dir(&self) -> &Path {
        &self.pkg_dir
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// The search path value this workspace replaced, if it patched one.
    pub fn original_search_path(&self) -> Option<&OsStr> {
        self.original_search_path.as_deref()
    }

    pub fn mutates_search_path(&self) -> bool {
        self.original_search_path.is_some()
    }

    pub fn deletes_on_reset(&self) -> bool {
        self.delete_on_reset
    }

    /// Choose whether reset removes the tree. `keep = true` keeps it.
    pub fn set_delete_on_reset(&mut self, keep: bool) {
        self.delete_on_reset = !keep;
    }

    /// Write everything from `content` to `path` (relative to `src`),
    /// creating intermediate directories. An existing file is truncated.
    pub fn write_file(
        &self,
        path: impl AsRef<Path>,
        mut content: impl Read,
    ) -> Result<(), WorkspaceError> {
        let full_path = self.resolve_path(path.as_ref())?;

        if let Some(parent) = full_path.parent() {
            create_private_dir_all(parent)?;
        }

        let mut file =
            open_private_file(&full_path).map_err(|source| WorkspaceError::FileOpenFailed {
                path: full_path.clone(),
                source,
            })?;

        let written =
            io::copy(&mut content, &mut file).map_err(|source| WorkspaceError::CopyFailed {
                path: full_path.clone(),
                source,
            })?;

        tracing::debug!(path = %full_path.display(), bytes = written, "wrote workspace file");
        Ok(())
    }

    /// Copy the file at `src` to `dest` (relative to `src_dir`).
    pub fn copy_file(
        &self,
        dest: impl AsRef<Path>,
        src: impl AsRef<Path>,
    ) -> Result<(), WorkspaceError> {
        let src = src.as_ref();
        let input = fs::File::open(src).map_err(|source| WorkspaceError::SourceOpenFailed {
            path: src.to_path_buf(),
            source,
        })?;
        self.write_file(dest, input)
    }

    /// Render `template` with `args` and write the output to `path`.
    pub fn generate_file<A: Serialize>(
        &self,
        path: impl AsRef<Path>,
        template: &minijinja::Template<'_, '_>,
        args: A,
    ) -> Result<(), WorkspaceError> {
        let rendered =
            template
                .render(args)
                .map_err(|source| WorkspaceError::TemplateRenderFailed {
                    template: template.name().to_string(),
                    source,
                })?;
        self.write_file(path, rendered.as_bytes())
    }

    /// Materialise `files` in order, stopping at the first failure.
    /// Files written before the failure stay on disk.
    pub fn copy_all(&self, files: &[SourceFile]) -> Result<(), WorkspaceError> {
        for file in files {
            match (&file.content, &file.src) {
                (Some(content), _) => self.write_file(&file.dest, content.as_slice())?,
                (None, Some(src)) => self.copy_file(&file.dest, src)?,
                (None, None) => {
                    return Err(WorkspaceError::InvalidSourceFile {
                        dest: file.dest.clone(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Read a file back from `src`.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, WorkspaceError> {
        let full_path = self.resolve_path(path.as_ref())?;
        fs::read(&full_path).map_err(|source| WorkspaceError::ReadFailed {
            path: full_path,
            source,
        })
    }

    /// All files under `src`, as sorted `/`-separated relative paths.
    pub fn list_files(&self) -> Result<Vec<String>, WorkspaceError> {
        let mut files = Vec::new();
        walk_dir(&self.src_dir, &self.src_dir, &mut files)?;
        files.sort();
        Ok(files)
    }

    /// Restore the search path and, if marked, delete the tree.
    /// Failures are logged, never returned.
    pub fn reset(mut self) {
        log_teardown_errors(self.teardown());
    }

    /// Like [`reset`](Workspace::reset), but hands back what went wrong.
    pub fn try_reset(mut self) -> Vec<WorkspaceError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Vec<WorkspaceError> {
        let mut errors = Vec::new();
        if self.torn_down {
            return errors;
        }
        self.torn_down = true;

        // Last writer wins: whatever happened in between is overwritten.
        if let Some(original) = self.original_search_path.take() {
            self.search_path.set(&original);
            tracing::info!(
                variable = self.search_path.variable(),
                value = ?original,
                "restored search path"
            );
        }

        if self.delete_on_reset {
            match fs::remove_dir_all(&self.root) {
                Ok(()) => tracing::debug!(root = %self.root.display(), "removed workspace"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => errors.push(WorkspaceError::RemoveFailed {
                    path: self.root.clone(),
                    source,
                }),
            }
        }
        errors
    }

    /// Resolve a path relative to `src`, rejecting anything that could
    /// climb out of it.
    fn resolve_path(&self, relative_path: &Path) -> Result<PathBuf, WorkspaceError> {
        let escapes = relative_path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(WorkspaceError::PathEscapesSource {
                path: relative_path.display().to_string(),
            });
        }
        Ok(self.src_dir.join(relative_path))
    }
}

impl<S: SearchPath> Drop for Workspace<S> {
    fn drop(&mut self) {
        log_teardown_errors(self.teardown());
    }
}

fn log_teardown_errors(errors: Vec<WorkspaceError>) {
    for e in errors {
        tracing::warn!("workspace teardown: {}", e);
    }
}

fn absolute(dir: &Path) -> Result<PathBuf, WorkspaceError> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    env::current_dir()
        .map(|cwd| cwd.join(dir))
        .map_err(|source| WorkspaceError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source,
        })
}

fn create_private_dir_all(path: &Path) -> Result<(), WorkspaceError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
        .create(path)
        .map_err(|source| WorkspaceError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source,
        })
}

fn open_private_file(path: &Path) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.read(true).write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    options.open(path)
}

/// Recursively walk a directory and collect relative file paths.
fn walk_dir(dir: &Path, root: &Path, files: &mut Vec<String>) -> Result<(), WorkspaceError> {
    let entries = fs::read_dir(dir).map_err(|source| WorkspaceError::ReadFailed {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| WorkspaceError::ReadFailed {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| WorkspaceError::ReadFailed {
            path: path.clone(),
            source,
        })?;

        // Symlinks are listed, never followed, so a link cycle can't recurse.
        if file_type.is_dir() {
            walk_dir(&path, root, files)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let parts: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }

    Ok(())
}
