//! Declarative description of one file to place in a workspace.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A file to materialise under a workspace's `src` directory.
///
/// Either `content` is written verbatim, or the file at `src` is copied.
/// When both are set, `content` wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Destination, relative to the workspace's `src` directory.
    pub dest: PathBuf,

    /// Path of an existing file to copy from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<PathBuf>,

    /// Literal file content. Written as text in config files.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "content_text"
    )]
    pub content: Option<Vec<u8>>,
}

impl SourceFile {
    /// A file whose bytes are given directly.
    pub fn with_content(dest: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            dest: dest.into(),
            src: None,
            content: Some(content.into()),
        }
    }

    /// A file copied from `src` on disk.
    pub fn copied_from(dest: impl Into<PathBuf>, src: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            src: Some(src.into()),
            content: None,
        }
    }
}

mod content_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(content: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match content {
            Some(bytes) => s.serialize_some(&*String::from_utf8_lossy(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Ok(Option::<String>::deserialize(d)?.map(String::into_bytes))
    }
}
