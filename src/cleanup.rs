//! Removal of transient run artifacts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Remove a file or directory tree; a missing path is not an error
pub fn remove_path(path: &Path) -> io::Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Remove `path` and create it again empty
pub fn recreate_dir(path: &Path) -> io::Result<()> {
    remove_path(path)?;
    fs::create_dir_all(path)
}

/// Fixed-path artifacts that must not outlive the run.
///
/// `cleanup` removes them and reports errors; if the run ends early they are
/// removed on drop instead.
#[derive(Debug)]
pub struct TransientArtifacts {
    paths: Vec<PathBuf>,
    cleaned: bool,
}

impl TransientArtifacts {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            cleaned: false,
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove every artifact, attempting all of them before reporting the first error
    pub fn cleanup(&mut self) -> io::Result<()> {
        self.cleaned = true;
        let mut first_error = None;
        for path in &self.paths {
            if let Err(e) = remove_path(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove transient artifact");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for TransientArtifacts {
    fn drop(&mut self) {
        if !self.cleaned {
            let _ = self.cleanup();
        }
    }
}

/// Files directly inside `dir`, sorted by name, with their sizes
pub fn list_files(dir: &Path) -> io::Result<Vec<(String, u64)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            let size = entry.metadata().map_err(io::Error::from)?.len();
            files.push((entry.file_name().to_string_lossy().to_string(), size));
        }
    }
    Ok(files)
}

/// `1234567` -> `1,234,567`
pub fn format_bytes(bytes: u64) -> String {
    let digits = bytes.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_path_handles_files_dirs_and_missing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plan.xctestplan");
        let tree = dir.path().join("bundle.xcresult");
        fs::write(&file, "{}").unwrap();
        fs::create_dir_all(tree.join("Data")).unwrap();
        fs::write(tree.join("Data/blob"), "x").unwrap();

        remove_path(&file).unwrap();
        remove_path(&tree).unwrap();
        remove_path(&dir.path().join("missing")).unwrap();

        assert!(!file.exists());
        assert!(!tree.exists());
    }

    #[test]
    fn test_recreate_dir_empties_contents() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("screenshots");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.png"), "old").unwrap();

        recreate_dir(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_transient_artifacts_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let plan = dir.path().join("Plan.xctestplan");
        fs::write(&plan, "{}").unwrap();

        {
            let _artifacts = TransientArtifacts::new(vec![plan.clone()]);
        }
        assert!(!plan.exists());
    }

    #[test]
    fn test_transient_artifacts_explicit_cleanup() {
        let dir = TempDir::new().unwrap();
        let bundle = dir.path().join("r.xcresult");
        fs::create_dir_all(&bundle).unwrap();

        let mut artifacts = TransientArtifacts::new(vec![bundle.clone(), dir.path().join("absent")]);
        artifacts.cleanup().unwrap();
        assert!(!bundle.exists());
    }

    #[test]
    fn test_list_files_sorted_with_sizes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("02_Explore.png"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("01_Photos.png"), vec![0u8; 3]).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![("01_Photos.png".to_string(), 3), ("02_Explore.png".to_string(), 10)]
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0");
        assert_eq!(format_bytes(999), "999");
        assert_eq!(format_bytes(1000), "1,000");
        assert_eq!(format_bytes(1234567), "1,234,567");
    }
}
