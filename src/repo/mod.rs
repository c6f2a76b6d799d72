//! Source repository access
//!
//! This module handles:
//! - Discovering the Python files to ingest
//! - Running the extractor over them with per-file failure isolation
//! - Configuration and small filesystem helpers

mod config;

pub use config::{
    Config, EmbeddingConfig, LlmSettings, PathsConfig, SearchConfig, CONFIG_FILE,
    EMBEDDING_API_KEY_ENV, LLM_API_KEY_ENV,
};

use crate::error::Result;
use crate::extract::{CodeChunk, PythonExtractor};
use std::path::{Path, PathBuf};

/// A directory tree of Python sources
pub struct SourceRepo {
    root: PathBuf,
    config: Config,
}

/// Outcome of walking a repository
#[derive(Debug, Default)]
pub struct Ingested {
    /// Chunks in file order, then definition order
    pub chunks: Vec<CodeChunk>,
    /// Python files visited
    pub files: usize,
    /// Files that could not be read, decoded or parsed
    pub skipped: Vec<String>,
}

impl SourceRepo {
    /// Open the tree rooted at `root`
    pub fn open(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            root: root.into(),
            config: config.clone(),
        }
    }

    /// Repository-relative paths of every `.py` file, sorted
    pub fn python_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in walkdir::WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }

            let relative = match entry.path().strip_prefix(&self.root) {
                Ok(rel) => relative_path_string(rel),
                Err(_) => continue,
            };

            if self.config.should_ignore(&relative) {
                tracing::debug!("Ignoring {}", relative);
                continue;
            }

            files.push(relative);
        }

        Ok(files)
    }

    /// Extract chunks from every Python file
    ///
    /// Unreadable or unparseable files are logged and skipped.
    pub fn ingest(&self, extractor: &mut PythonExtractor) -> Result<Ingested> {
        let files = self.python_files()?;
        tracing::info!("Found {} Python files under {:?}", files.len(), self.root);

        let mut ingested = Ingested {
            files: files.len(),
            ..Ingested::default()
        };

        for relative in files {
            let bytes = match std::fs::read(self.root.join(&relative)) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("Could not read {}: {}", relative, e);
                    ingested.skipped.push(relative);
                    continue;
                }
            };

            match extractor.extract_bytes(&relative, &bytes) {
                Ok(chunks) => {
                    tracing::debug!("{}: {} chunks", relative, chunks.len());
                    ingested.chunks.extend(chunks);
                }
                Err(e) => {
                    tracing::warn!("Skipping file: {}", e);
                    ingested.skipped.push(relative);
                }
            }
        }

        Ok(ingested)
    }
}

/// `/`-separated form of a relative path
fn relative_path_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write `bytes` to `path` via a sibling temporary file and a rename
///
/// Readers see either the previous file or the complete new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_all(&[(path, bytes)])
}

/// Replace several files together
///
/// Every temp file is written before any target is renamed, so a failed
/// write leaves all targets as they were.
pub fn write_atomic_all(files: &[(&Path, &[u8])]) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());

    for (path, bytes) in files {
        let tmp_path = temp_path(path);
        if let Err(e) = std::fs::write(&tmp_path, bytes) {
            for (tmp, _) in &staged {
                let _ = std::fs::remove_file(tmp);
            }
            return Err(e.into());
        }
        staged.push((tmp_path, *path));
    }

    for (i, (tmp_path, path)) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(tmp_path, path) {
            for (tmp, _) in &staged[i..] {
                let _ = std::fs::remove_file(tmp);
            }
            return Err(e.into());
        }
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "pkg/b.py", b"def beta():\n    return 2\n");
        write(root, "pkg/a.py", b"def alpha():\n    return 1\n\n\ndef alpha2():\n    pass\n");
        write(root, "pkg/__pycache__/a.py", b"def cached():\n    pass\n");
        write(root, ".venv/lib/site.py", b"def site():\n    pass\n");
        write(root, "README.md", b"# readme\n");
        write(root, "setup.py", b"def setup():\n    pass\n");
        dir
    }

    #[test]
    fn test_python_files_sorted_and_filtered() {
        let dir = sample_tree();
        let repo = SourceRepo::open(dir.path(), &Config::default());

        let files = repo.python_files().unwrap();
        assert_eq!(files, vec!["pkg/a.py", "pkg/b.py", "setup.py"]);
    }

    #[test]
    fn test_ingest_collects_chunks_in_file_order() {
        let dir = sample_tree();
        let repo = SourceRepo::open(dir.path(), &Config::default());
        let mut extractor = PythonExtractor::new().unwrap();

        let ingested = repo.ingest(&mut extractor).unwrap();
        let names: Vec<_> = ingested
            .chunks
            .iter()
            .map(|c| c.symbol_name.as_str())
            .collect();

        assert_eq!(ingested.files, 3);
        assert_eq!(names, vec!["alpha", "alpha2", "beta", "setup"]);
        assert!(ingested.skipped.is_empty());
    }

    #[test]
    fn test_ingest_skips_bad_files() {
        let dir = sample_tree();
        write(dir.path(), "pkg/broken.py", b"def broken(:\n");
        write(dir.path(), "pkg/latin1.py", &[0x64, 0x65, 0x66, 0x20, 0xe9, 0x28]);

        let repo = SourceRepo::open(dir.path(), &Config::default());
        let mut extractor = PythonExtractor::new().unwrap();
        let ingested = repo.ingest(&mut extractor).unwrap();

        assert_eq!(ingested.files, 5);
        assert_eq!(ingested.skipped, vec!["pkg/broken.py", "pkg/latin1.py"]);
        assert_eq!(ingested.chunks.len(), 4);
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.md");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_write_atomic_all_keeps_targets_on_failure() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.bin");
        let second = dir.path().join("b.json");
        write_atomic_all(&[(first.as_path(), &b"old-a"[..]), (second.as_path(), &b"old-b"[..])]).unwrap();

        // a directory in the temp slot makes the second write fail
        fs::create_dir(dir.path().join(".b.json.tmp")).unwrap();
        let result =
            write_atomic_all(&[(first.as_path(), &b"new-a"[..]), (second.as_path(), &b"new-b"[..])]);

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&first).unwrap(), "old-a");
        assert_eq!(fs::read_to_string(&second).unwrap(), "old-b");
        assert!(!dir.path().join(".a.bin.tmp").exists());
    }
}
