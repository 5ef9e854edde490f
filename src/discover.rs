//! Document discovery over the configured documents folder.
//!
//! Walks the root, applies include/exclude globs and the parser extension
//! filter, and fingerprints each file with SHA-256 of its raw bytes. A file
//! that cannot be read is skipped with a warning rather than aborting the
//! scan.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::DocumentsConfig;
use crate::models::{DocStatus, DocumentMetadata};

pub fn scan_documents(
    config: &DocumentsConfig,
    supported_extensions: &[String],
) -> Result<Vec<DocumentMetadata>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Documents root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if !supported_extensions.iter().any(|e| e == &extension) {
            continue;
        }

        match file_to_metadata(path, &extension) {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        }
    }

    // Sort for deterministic ordering
    documents.sort_by(|a, b| a.locator.cmp(&b.locator));

    Ok(documents)
}

fn file_to_metadata(path: &Path, extension: &str) -> Result<DocumentMetadata> {
    let bytes = std::fs::read(path)?;
    let size = bytes.len() as i64;
    let fingerprint = fingerprint_bytes(&bytes);

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(DocumentMetadata {
        locator: path.to_string_lossy().to_string(),
        file_name,
        extension: extension.to_string(),
        size,
        fingerprint,
        status: DocStatus::Discovered,
        error: None,
        chunk_count: 0,
        last_processed_at: None,
    })
}

/// Stable digest of a document's content, used to detect changes without
/// re-parsing.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(fingerprint_bytes(b"hello"), fingerprint_bytes(b"hello"));
        assert_ne!(fingerprint_bytes(b"hello"), fingerprint_bytes(b"hello!"));
    }
}
