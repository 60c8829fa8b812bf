use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Expand command line arguments into image paths.
///
/// Directories contribute their image files (non-recursive, sorted by name).
/// Other arguments are passed through untouched so the worker reports
/// unreadable files itself.
pub fn collect_images(args: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for arg in args {
        if !arg.is_dir() {
            images.push(arg.clone());
            continue;
        }

        let mut entries = fs::read_dir(arg)
            .with_context(|| format!("Failed to read directory {}", arg.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect::<Vec<_>>();
        entries.sort();

        tracing::debug!(dir = %arg.display(), images = entries.len(), "Scanned directory");
        images.extend(entries);
    }

    Ok(images)
}
