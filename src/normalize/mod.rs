//! Screenshot naming
//!
//! Attachment display names carry a run-specific suffix, e.g.
//! `01_Photos_0_8843E7BB-1234-4A5B-9C8D-288126A6EEBC.png`. The suffix
//! (`_<digits>_<36-char UUID>`) is stripped to give a stable output name
//! (`01_Photos.png`). Names without the suffix are used as they are.

use regex_lite::Regex;
use std::collections::HashSet;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};

use crate::cleanup::recreate_dir;
use crate::extract::AttachmentEntry;
use crate::progress::Progress;

/// A screenshot copied into the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedScreenshot {
    /// Output file name
    pub name: String,

    /// Full output path
    pub path: PathBuf,

    /// Exported file it was copied from
    pub exported_file_name: String,
}

/// Maps attachment display names to output file names
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    extension: String,
    suffix: Regex,
}

impl NameNormalizer {
    /// Normalizer for attachments with file extension `extension` (e.g. "png")
    pub fn new(extension: &str) -> Result<Self, regex_lite::Error> {
        let pattern = format!(
            r"_\d+_[0-9A-Fa-f-]{{36}}\.{}$",
            regex_lite::escape(extension)
        );
        Ok(Self {
            extension: extension.to_string(),
            suffix: Regex::new(&pattern)?,
        })
    }

    /// `.png` style suffix
    fn dotted_extension(&self) -> String {
        format!(".{}", self.extension)
    }

    /// Whether an exported file has the expected extension
    pub fn accepts(&self, exported_file_name: &str) -> bool {
        exported_file_name.ends_with(&self.dotted_extension())
    }

    /// Output name for a display name
    pub fn output_name(&self, suggested: &str) -> String {
        self.suffix
            .replace(suggested, self.dotted_extension().as_str())
            .into_owned()
    }

    /// Copy every usable attachment from `staging_dir` into a fresh `output_dir`.
    ///
    /// Entries with another extension or whose file is missing are skipped.
    /// When two entries map to the same name the later one wins.
    pub fn copy_all(
        &self,
        entries: &[AttachmentEntry],
        staging_dir: &Path,
        output_dir: &Path,
        progress: &Progress,
    ) -> io::Result<Vec<SavedScreenshot>> {
        recreate_dir(output_dir)?;

        let mut saved: Vec<SavedScreenshot> = Vec::new();
        let mut seen = HashSet::new();

        for entry in entries {
            if !self.accepts(&entry.exported_file_name) {
                continue;
            }

            let source = staging_dir.join(&entry.exported_file_name);
            if !source.is_file() {
                tracing::debug!(file = %entry.exported_file_name, "manifest entry has no exported file");
                continue;
            }

            let name = match contained_name(&self.output_name(&entry.suggested_name)) {
                Some(name) => name,
                None => {
                    tracing::warn!(name = %entry.suggested_name, "attachment name has no file component, skipped");
                    continue;
                }
            };
            let dest = output_dir.join(&name);

            if !seen.insert(name.clone()) {
                tracing::warn!(
                    name = %name,
                    test = %entry.test_context,
                    "duplicate screenshot name, overwriting earlier copy"
                );
                saved.retain(|s| s.name != name);
            }

            copy_preserving_times(&source, &dest)?;
            progress.detail(format!("  {}", name));

            saved.push(SavedScreenshot {
                name,
                path: dest,
                exported_file_name: entry.exported_file_name.clone(),
            });
        }

        Ok(saved)
    }
}

/// Final path component of `name`, so a manifest name cannot leave the
/// output directory
fn contained_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

/// Copy bytes and permissions, then carry over access and modification times
fn copy_preserving_times(source: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(source, dest)?;

    let meta = fs::metadata(source)?;
    let times = FileTimes::new()
        .set_accessed(meta.accessed()?)
        .set_modified(meta.modified()?);
    File::options().write(true).open(dest)?.set_times(times)
}
