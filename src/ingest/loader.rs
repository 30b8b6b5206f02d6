// Markdown loader: every non-empty *.md file under a root, recursively
use std::path::{Path, PathBuf};

use crate::errors::{QaError, Result};

/// One loaded source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub text: String,
    pub source: String,
}

/// Load markdown documents under `root`, sorted by path
///
/// Invalid UTF-8 is replaced rather than rejected. Unreadable files are
/// skipped with a warning.
pub fn load_markdown_files(root: impl AsRef<Path>) -> Result<Vec<SourceDocument>> {
    let root = root.as_ref();
    if !root.exists() {
        return Err(QaError::Ingest(format!("Path does not exist: {}", root.display())));
    }

    let mut paths = Vec::new();
    collect_markdown(root, &mut paths)?;
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        match std::fs::read(&path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                if !text.trim().is_empty() {
                    documents.push(SourceDocument {
                        text,
                        source: path.display().to_string(),
                    });
                }
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to load document"),
        }
    }

    tracing::info!(count = documents.len(), root = %root.display(), "loaded markdown documents");
    Ok(documents)
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if dir.is_file() {
        if is_markdown(dir) {
            out.push(dir.to_path_buf());
        }
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_markdown(&path, out)?;
        } else if is_markdown(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_markdown(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_loads_nested_markdown_only() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("guides/deep")).unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\nplanner").unwrap();
        std::fs::write(dir.path().join("guides/deep/b.md"), "executor").unwrap();
        std::fs::write(dir.path().join("guides/notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("empty.md"), "   \n").unwrap();

        let docs = load_markdown_files(dir.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].source.ends_with("a.md"));
        assert!(docs[1].source.ends_with("b.md"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.md"), [b'o', b'k', 0xff, b'!']).unwrap();

        let docs = load_markdown_files(dir.path()).unwrap();
        assert_eq!(docs[0].text, "ok\u{fffd}!");
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = load_markdown_files(dir.path().join("nope"));
        assert!(matches!(result, Err(QaError::Ingest(_))));
    }
}
