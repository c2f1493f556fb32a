//! File utility functions for listing and filtering files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Conventional raster image extensions accepted as visible-sensor input.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// Delimited text grid extensions accepted as thermal-sensor input.
pub const GRID_EXTENSIONS: &[&str] = &["csv"];

/// Returns paths to all files in a directory matching the given extensions,
/// sorted by file name. Extensions are matched case-insensitively.
///
/// Subdirectories are walked recursively when `recursive` is set.
pub fn files_with_extensions(
    dir: &Path,
    extensions: &[&str],
    recursive: bool,
) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(dir, extensions, recursive, &mut files)?;
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
    Ok(files)
}

fn collect_files(
    dir: &Path,
    extensions: &[&str],
    recursive: bool,
    out: &mut Vec<PathBuf>,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect_files(&path, extensions, recursive, out)?;
            }
            continue;
        }
        if !path.is_file() {
            continue;
        }
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        if extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_with_extensions_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.JPG", "a.jpg", "c.csv", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let files = files_with_extensions(dir.path(), IMAGE_EXTENSIONS, false).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.JPG"]);
    }

    #[test]
    fn test_files_with_extensions_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("day1");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("m1.csv"), b"1").unwrap();
        fs::write(nested.join("m0.csv"), b"1").unwrap();

        let flat = files_with_extensions(dir.path(), GRID_EXTENSIONS, false).unwrap();
        assert_eq!(flat.len(), 1);

        let deep = files_with_extensions(dir.path(), GRID_EXTENSIONS, true).unwrap();
        assert_eq!(deep.len(), 2);
        assert_eq!(deep[0].file_name().unwrap(), "m0.csv");
    }

    #[test]
    fn test_files_with_extensions_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(files_with_extensions(&dir.path().join("absent"), GRID_EXTENSIONS, false).is_err());
    }
}
