//! Scaffold configuration, usually read from a `scratch-tree.toml` file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;
use crate::search_path::DEFAULT_VARIABLE;
use crate::source_file::SourceFile;

/// Everything needed to provision a workspace in one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaffoldConfig {
    /// Name hint for the temporary directory.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Use this directory instead of allocating a temporary one.
    /// A configured root is never deleted unless `delete_root` is set.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Remove a configured `root` on reset. Ignored for temporary roots.
    #[serde(default)]
    pub delete_root: bool,

    /// Keep a temporary root on disk after reset.
    #[serde(default)]
    pub keep: bool,

    /// Search path patching.
    #[serde(default)]
    pub search_path: SearchPathConfig,

    /// Files to place under `src/`, in order.
    #[serde(default)]
    pub files: Vec<SourceFile>,
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            root: None,
            delete_root: false,
            keep: false,
            search_path: SearchPathConfig::default(),
            files: Vec::new(),
        }
    }
}

/// Which variable to patch, and whether to patch it at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPathConfig {
    /// Environment variable holding the search path list.
    #[serde(default = "default_variable")]
    pub variable: String,

    /// Prepend the workspace root to the variable.
    #[serde(default = "default_mutate")]
    pub mutate: bool,
}

impl Default for SearchPathConfig {
    fn default() -> Self {
        Self {
            variable: default_variable(),
            mutate: default_mutate(),
        }
    }
}

// Serde default functions
fn default_prefix() -> String {
    "scratch-tree".to_string()
}

fn default_variable() -> String {
    DEFAULT_VARIABLE.to_string()
}

fn default_mutate() -> bool {
    true
}

impl ScaffoldConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load a config file. Relative `src` paths in `files` are resolved
    /// against the config file's directory.
    pub fn load(path: &Path) -> Result<Self, WorkspaceError> {
        let content = std::fs::read_to_string(path).map_err(|e| WorkspaceError::ConfigLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_toml_str(&content).map_err(|e| WorkspaceError::ConfigLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Some(base) = path.parent() {
            for file in &mut config.files {
                if let Some(src) = file.src.as_mut() {
                    if src.is_relative() {
                        *src = base.join(&*src);
                    }
                }
            }
        }
        Ok(config)
    }

    /// Try to load config, returning default if the file is missing or bad.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("using default scaffold config: {}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ScaffoldConfig::from_toml_str("").unwrap();
        assert_eq!(config.prefix, "scratch-tree");
        assert_eq!(config.search_path.variable, "GOPATH");
        assert!(config.search_path.mutate);
        assert!(!config.keep);
        assert!(config.root.is_none());
        assert!(config.files.is_empty());
    }

    #[test]
    fn parses_files_and_search_path() {
        let config = ScaffoldConfig::from_toml_str(
            r#"
prefix = "fixture"
keep = true

[search_path]
variable = "MY_PATH"
mutate = false

[[files]]
dest = "a/a.go"
content = "package a\n"

[[files]]
dest = "b/b.go"
src = "/fixtures/b.go"
"#,
        )
        .unwrap();

        assert_eq!(config.prefix, "fixture");
        assert!(config.keep);
        assert_eq!(config.search_path.variable, "MY_PATH");
        assert!(!config.search_path.mutate);
        assert_eq!(
            config.files,
            vec![
                SourceFile::with_content("a/a.go", "package a\n"),
                SourceFile::copied_from("b/b.go", "/fixtures/b.go"),
            ]
        );
    }

    #[test]
    fn load_resolves_relative_sources() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scratch-tree.toml");
        std::fs::write(
            &path,
            "[[files]]\ndest = \"c.go\"\nsrc = \"testdata/c.go\"\n",
        )
        .unwrap();

        let config = ScaffoldConfig::load(&path).unwrap();
        assert_eq!(
            config.files[0].src.as_deref(),
            Some(dir.path().join("testdata/c.go").as_path())
        );
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "files = 3").unwrap();

        let err = ScaffoldConfig::load(&path).unwrap_err();
        assert!(matches!(err, WorkspaceError::ConfigLoad { .. }));
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let dir = tempdir().unwrap();
        let config = ScaffoldConfig::load_or_default(&dir.path().join("missing.toml"));
        assert_eq!(config.prefix, "scratch-tree");
    }
}
