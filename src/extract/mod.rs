//! Attachment extraction
//!
//! Exports image attachments from the result bundle into a private staging
//! directory and reads the manifest written alongside them. The staging
//! directory is removed when the `StagedExport` is closed or dropped.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use xcshots_xcrun::{XcrunError, MANIFEST_FILE};

use crate::tools::AttachmentExporter;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The export produced no manifest, so the run captured nothing
    #[error(
        "No {} found exporting attachments from {}; no screenshots captured?",
        MANIFEST_FILE,
        .result_bundle.display()
    )]
    NoManifest { result_bundle: PathBuf },

    #[error("invalid attachment manifest: {0}")]
    InvalidManifest(#[from] serde_json::Error),

    #[error(transparent)]
    Tool(#[from] XcrunError),

    #[error("failed to prepare export directory: {0}")]
    Io(#[from] io::Error),
}

/// One exported attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentEntry {
    /// Generated file name inside the export directory
    pub exported_file_name: String,

    /// Display name recorded for the attachment (falls back to the exported name)
    pub suggested_name: String,

    /// Identifier of the test that produced the attachment
    pub test_context: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestTest {
    #[serde(default)]
    test_identifier: String,
    #[serde(default)]
    attachments: Vec<ManifestAttachment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestAttachment {
    #[serde(default)]
    exported_file_name: String,
    #[serde(default)]
    suggested_human_readable_name: Option<String>,
}

/// Flatten an xcresulttool manifest into entries, in document order
pub fn parse_manifest(json: &[u8]) -> Result<Vec<AttachmentEntry>, serde_json::Error> {
    let tests: Vec<ManifestTest> = serde_json::from_slice(json)?;

    Ok(tests
        .into_iter()
        .flat_map(|test| {
            let context = test.test_identifier;
            test.attachments.into_iter().map(move |att| AttachmentEntry {
                suggested_name: att
                    .suggested_human_readable_name
                    .unwrap_or_else(|| att.exported_file_name.clone()),
                exported_file_name: att.exported_file_name,
                test_context: context.clone(),
            })
        })
        .collect())
}

/// Exported attachments waiting to be copied out
#[derive(Debug)]
pub struct StagedExport {
    dir: TempDir,
    entries: Vec<AttachmentEntry>,
}

impl StagedExport {
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn entries(&self) -> &[AttachmentEntry] {
        &self.entries
    }

    /// Delete the staging directory
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// Export attachments of `attachment_type` from `result_bundle`
pub fn extract(
    exporter: &dyn AttachmentExporter,
    result_bundle: &Path,
    attachment_type: &str,
) -> Result<StagedExport, ExtractError> {
    let dir = tempfile::Builder::new().prefix("xcshots-export-").tempdir()?;
    exporter.export_attachments(result_bundle, dir.path(), attachment_type)?;

    let manifest_path = dir.path().join(MANIFEST_FILE);
    let manifest = match fs::read(&manifest_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(export_dir = %dir.path().display(), "export produced no manifest");
            return Err(ExtractError::NoManifest {
                result_bundle: result_bundle.to_path_buf(),
            });
        }
        Err(e) => return Err(ExtractError::Io(e)),
    };

    let entries = parse_manifest(&manifest)?;
    tracing::debug!(attachments = entries.len(), "manifest read");

    Ok(StagedExport { dir, entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use xcshots_xcrun::XcrunResult;

    const MANIFEST: &str = r#"[
      {
        "testIdentifier": "ImmichLensUITests/testScreenshotPhotos()",
        "attachments": [
          {
            "exportedFileName": "8843E7BB-1234-4A5B-9C8D-288126A6EEBC.png",
            "suggestedHumanReadableName": "01_Photos_0_8843E7BB-1234-4A5B-9C8D-288126A6EEBC.png",
            "isAssociatedWithFailure": false
          }
        ]
      },
      {
        "testIdentifier": "ImmichLensUITests/testLaunch()"
      },
      {
        "testIdentifier": "ImmichLensUITests/testScreenshotExplore()",
        "attachments": [
          { "exportedFileName": "AAAA.png" },
          { "exportedFileName": "BBBB.png", "suggestedHumanReadableName": "02_Explore.png" }
        ]
      }
    ]"#;

    #[test]
    fn test_parse_manifest_flattens_in_order() {
        let entries = parse_manifest(MANIFEST.as_bytes()).unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].exported_file_name, "8843E7BB-1234-4A5B-9C8D-288126A6EEBC.png");
        assert_eq!(
            entries[0].suggested_name,
            "01_Photos_0_8843E7BB-1234-4A5B-9C8D-288126A6EEBC.png"
        );
        assert_eq!(entries[0].test_context, "ImmichLensUITests/testScreenshotPhotos()");

        assert_eq!(entries[1].suggested_name, "AAAA.png");
        assert_eq!(entries[2].suggested_name, "02_Explore.png");
        assert_eq!(entries[2].test_context, "ImmichLensUITests/testScreenshotExplore()");
    }

    #[test]
    fn test_parse_manifest_rejects_non_array() {
        assert!(parse_manifest(br#"{"attachments": []}"#).is_err());
    }

    struct WritingExporter {
        manifest: Option<&'static str>,
    }

    impl AttachmentExporter for WritingExporter {
        fn export_attachments(&self, _bundle: &Path, out: &Path, attachment_type: &str) -> XcrunResult<()> {
            assert_eq!(attachment_type, "png");
            fs::write(out.join("AAAA.png"), b"png").unwrap();
            if let Some(manifest) = self.manifest {
                fs::write(out.join(MANIFEST_FILE), manifest).unwrap();
            }
            Ok(())
        }
    }

    #[test]
    fn test_extract_reads_manifest_and_closes() {
        let exporter = WritingExporter {
            manifest: Some(r#"[{"testIdentifier": "t", "attachments": [{"exportedFileName": "AAAA.png"}]}]"#),
        };
        let staged = extract(&exporter, Path::new("r.xcresult"), "png").unwrap();
        let dir = staged.dir().to_path_buf();

        assert!(dir.join("AAAA.png").exists());
        assert_eq!(staged.entries().len(), 1);

        staged.close().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_extract_without_manifest() {
        let exporter = WritingExporter { manifest: None };
        let err = extract(&exporter, Path::new("/repo/screenshots.xcresult"), "png").unwrap_err();
        match err {
            ExtractError::NoManifest { ref result_bundle } => {
                assert_eq!(result_bundle, Path::new("/repo/screenshots.xcresult"))
            }
            ref other => panic!("unexpected error: {:?}", other),
        }
        let message = err.to_string();
        assert!(message.starts_with("No manifest.json found"));
        assert!(message.contains("/repo/screenshots.xcresult"));
        assert!(!message.contains("xcshots-export-"));
    }
}
