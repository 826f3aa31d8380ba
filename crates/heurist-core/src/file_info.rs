use serde::{Deserialize, Serialize};
use std::path::Path;

/// A file handed over by the scanner: its display name and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub content: Vec<u8>,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read(path)?;
        Ok(Self::new(path.display().to_string(), content))
    }

    /// Content as text; invalid UTF-8 sequences become replacement characters.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}
