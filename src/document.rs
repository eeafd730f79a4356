use crate::error::{RagError, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Metadata key holding the path a document was loaded from
pub const SOURCE_KEY: &str = "source";

/// Represents a document with its content and metadata
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// The actual text content of the document
    pub content: String,
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Document {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata field. When an [`Index`](crate::index::Index)
    /// stores chunk contents, its `content` key replaces a field of that name.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Path the document was loaded from, if any
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// Loads a single text file
pub struct TextLoader {
    path: PathBuf,
}

impl TextLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        TextLoader {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<Document> {
        debug!("Reading text document: {}", self.path.display());
        let content =
            fs::read_to_string(&self.path).map_err(|e| RagError::io(&self.path, e))?;

        Ok(Document::new(content).with_metadata(SOURCE_KEY, self.path.display().to_string()))
    }
}

/// Loads every file under a directory whose name ends with an extension.
///
/// The walk is recursive and results are ordered by path. Any unreadable
/// directory entry or matching file aborts the whole load.
pub struct DirectoryLoader {
    dir: PathBuf,
    extension: String,
}

impl DirectoryLoader {
    pub fn new<P: AsRef<Path>>(dir: P, extension: impl Into<String>) -> Self {
        DirectoryLoader {
            dir: dir.as_ref().to_path_buf(),
            extension: extension.into(),
        }
    }

    pub fn load(&self) -> Result<Vec<Document>> {
        let mut paths = Vec::new();

        for entry in WalkDir::new(&self.dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.dir).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
                RagError::io(path, source)
            })?;

            if entry.file_type().is_file() && self.matches(entry.path()) {
                paths.push(entry.into_path());
            }
        }

        let documents = paths
            .iter()
            .map(|path| TextLoader::new(path).load())
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Loaded {} documents from {} (*{})",
            documents.len(),
            self.dir.display(),
            self.extension
        );

        Ok(documents)
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(&self.extension))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_matching_files_recursively_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second").unwrap();
        fs::write(dir.path().join("a.txt"), "first").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.txt"), "third").unwrap();

        let documents = DirectoryLoader::new(dir.path(), ".txt").load().unwrap();

        let contents: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert!(documents[0].source().unwrap().ends_with("a.txt"));
        assert!(documents[2].source().unwrap().ends_with("c.txt"));
    }

    #[test]
    fn empty_directory_yields_no_documents() {
        let dir = tempfile::tempdir().unwrap();
        let documents = DirectoryLoader::new(dir.path(), ".txt").load().unwrap();
        assert!(documents.is_empty());
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let err = DirectoryLoader::new(&missing, ".txt").load().unwrap_err();
        assert!(matches!(err, RagError::Io { .. }));
    }

    #[test]
    fn text_loader_sets_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.txt");
        fs::write(&path, "hello").unwrap();

        let document = TextLoader::new(&path).load().unwrap();
        assert_eq!(document.content, "hello");
        assert_eq!(document.source(), Some(path.display().to_string().as_str()));
    }
}
