//! `.tar.gz` bundling of the output tree.

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, HeaderMode};
use tickpack_core::{Error, Result};
use tracing::info;

/// What went into an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Bundle `src_dir` into a gzip-compressed tar at `dest`.
///
/// Entry names are relative to the parent of `src_dir`, so archiving
/// `out/parsed_data` yields entries under `parsed_data/`. Entries are added
/// in sorted order with deterministic headers.
pub fn archive_directory(src_dir: &Path, dest: &Path) -> Result<ArchiveStats> {
    if !src_dir.is_dir() {
        return Err(Error::archive(format!("{} is not a directory", src_dir.display())));
    }
    if let (Ok(src), Some(parent)) = (src_dir.canonicalize(), dest.parent()) {
        let dest_dir = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if dest_dir.canonicalize().map(|d| d.starts_with(&src)).unwrap_or(false) {
            return Err(Error::archive(format!(
                "archive {} would be written inside {}",
                dest.display(),
                src_dir.display()
            )));
        }
    }

    let prefix = src_dir
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_default();

    let mut entries = Vec::new();
    collect_entries(src_dir, &prefix, &mut entries)?;

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let file = File::create(dest).map_err(|e| io_error(dest, e))?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.mode(HeaderMode::Deterministic);

    let mut stats = ArchiveStats::default();
    if !prefix.as_os_str().is_empty() {
        builder
            .append_dir(&prefix, src_dir)
            .map_err(|e| io_error(src_dir, e))?;
        stats.directories += 1;
    }
    for (path, name, is_dir) in &entries {
        if *is_dir {
            builder.append_dir(name, path).map_err(|e| io_error(path, e))?;
            stats.directories += 1;
        } else {
            builder
                .append_path_with_name(path, name)
                .map_err(|e| io_error(path, e))?;
            stats.files += 1;
            stats.bytes += path.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }

    let encoder = builder.into_inner().map_err(|e| io_error(dest, e))?;
    encoder.finish().map_err(|e| io_error(dest, e))?;

    info!(
        archive = %dest.display(),
        files = stats.files,
        bytes = stats.bytes,
        "Archive written"
    );
    Ok(stats)
}

/// Depth-first listing in name order: (disk path, archive name, is_dir).
fn collect_entries(dir: &Path, name: &Path, out: &mut Vec<(PathBuf, PathBuf, bool)>) -> Result<()> {
    let mut children = std::fs::read_dir(dir)
        .map_err(|e| io_error(dir, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| io_error(dir, e))?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let path = child.path();
        let child_name = name.join(child.file_name());
        let is_dir = child.file_type().map_err(|e| io_error(&path, e))?.is_dir();
        out.push((path.clone(), child_name.clone(), is_dir));
        if is_dir {
            collect_entries(&path, &child_name, out)?;
        }
    }
    Ok(())
}

fn io_error(path: &Path, err: std::io::Error) -> Error {
    Error::archive(format!("{}: {err}", path.display()))
}
