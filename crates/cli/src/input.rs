use std::path::{Path, PathBuf};

use anyhow::Context;
use ocrjob_core::types::FileBlob;

/// Read every path into a [`FileBlob`] named after the file's base name.
pub async fn load_files(paths: &[PathBuf]) -> anyhow::Result<Vec<FileBlob>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "Loaded file");
        files.push(FileBlob::new(display_name(path), content));
    }
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
