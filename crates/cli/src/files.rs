//! Local source collection and upload batching.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use protocol::{BundleFile, BundleFiles, SupportedFiles, MAX_PAYLOAD};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Files larger than this are never bundled.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the collected root, `/`-separated.
    pub bundle_path: String,
    /// Hex-encoded SHA-256 of `content`.
    pub hash: String,
    pub content: String,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Walks `root` and returns every file the service accepts, sorted by path.
///
/// Hidden directories are skipped. Oversized and non-UTF-8 files are left out.
pub fn collect(root: &Path, filters: &SupportedFiles) -> anyhow::Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && is_hidden(e)));

    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !filters.accepts(name) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > MAX_FILE_SIZE {
            debug!(path = %entry.path().display(), size, "skipping oversized file");
            continue;
        }
        let bytes = std::fs::read(entry.path()).with_context(|| format!("failed to read {}", entry.path().display()))?;
        let Ok(content) = String::from_utf8(bytes) else {
            debug!(path = %entry.path().display(), "skipping non-UTF-8 file");
            continue;
        };

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let bundle_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        files.push(SourceFile {
            hash: content_hash(&content),
            bundle_path,
            content,
        });
    }
    Ok(files)
}

/// The hash-only file map sent with `create_bundle`.
pub fn descriptor(files: &[SourceFile]) -> BundleFiles {
    files
        .iter()
        .map(|f| (f.bundle_path.clone(), BundleFile::Hash(f.hash.clone())))
        .collect()
}

/// Splits the content of `missing` files into extend payloads below
/// [`MAX_PAYLOAD`]. A single file that exceeds the limit on its own still gets
/// a batch of its own; the server rejects it with 413.
pub fn content_batches(files: &[SourceFile], missing: &[String]) -> Vec<BundleFiles> {
    // JSON quoting and separators around each entry.
    const ENTRY_OVERHEAD: usize = 32;

    let by_path: HashMap<&str, &SourceFile> = files.iter().map(|f| (f.bundle_path.as_str(), f)).collect();
    let mut batches = Vec::new();
    let mut current = BundleFiles::new();
    let mut current_size = 0;

    for path in missing {
        let Some(file) = by_path.get(path.trim_start_matches('/')) else {
            warn!(path = %path, "server asked for a file that was not collected");
            continue;
        };
        let size = file.bundle_path.len() + file.hash.len() + file.content.len() + ENTRY_OVERHEAD;
        if !current.is_empty() && current_size + size > MAX_PAYLOAD {
            batches.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current.insert(
            path.clone(),
            BundleFile::Content {
                hash: file.hash.clone(),
                content: file.content.clone(),
            },
        );
        current_size += size;
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn filters() -> SupportedFiles {
        SupportedFiles {
            config_files: vec![".dcignore".into()],
            extensions: vec![".js".into()],
        }
    }

    fn source(path: &str, content: &str) -> SourceFile {
        SourceFile {
            bundle_path: path.into(),
            hash: content_hash(content),
            content: content.into(),
        }
    }

    #[test]
    fn collects_accepted_files_and_skips_hidden_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("src/app.js"), "app").unwrap();
        fs::write(dir.path().join("src/nested/util.js"), "util").unwrap();
        fs::write(dir.path().join("src/readme.md"), "docs").unwrap();
        fs::write(dir.path().join(".git/hook.js"), "hidden").unwrap();
        fs::write(dir.path().join(".dcignore"), "node_modules").unwrap();

        let files = collect(dir.path(), &filters()).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.bundle_path.as_str()).collect();
        assert_eq!(paths, vec![".dcignore", "src/app.js", "src/nested/util.js"]);
        assert_eq!(files[1].hash, content_hash("app"));
    }

    #[test]
    fn hashes_are_hex_sha256() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn descriptor_carries_hashes_only() {
        let files = vec![source("a.js", "a")];
        let map = descriptor(&files);
        assert_eq!(map.get("a.js"), Some(&BundleFile::Hash(content_hash("a"))));
    }

    #[test]
    fn batches_only_include_missing_files() {
        let files = vec![source("a.js", "a"), source("b.js", "b")];
        let batches = content_batches(&files, &["b.js".to_string(), "ghost.js".to_string()]);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert!(matches!(batches[0].get("b.js"), Some(BundleFile::Content { content, .. }) if content == "b"));
    }

    #[test]
    fn large_uploads_are_split() {
        let big = "x".repeat(MAX_PAYLOAD / 2);
        let files = vec![source("a.js", &big), source("b.js", &big), source("c.js", "c")];
        let missing: Vec<String> = files.iter().map(|f| f.bundle_path.clone()).collect();

        let batches = content_batches(&files, &missing);
        assert_eq!(batches.len(), 2);
        assert!(batches[0].contains_key("a.js"));
        assert!(batches[1].contains_key("b.js"));
        assert!(batches[1].contains_key("c.js"));
    }
}
