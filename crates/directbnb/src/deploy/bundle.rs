use std::collections::BTreeMap;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::DeployError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    /// Slash separated, rooted at the build directory (`/assets/app.js`).
    pub path: String,
    pub bytes: Vec<u8>,
    pub digest: String,
    pub content_type: String,
}

/// Every regular file of a build output directory, ready for upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentBundle {
    pub files: Vec<BundleFile>,
}

impl DeploymentBundle {
    pub fn collect(root: &Path) -> Result<Self, DeployError> {
        if !root.is_dir() {
            return Err(DeployError::MissingBuildOutput(root.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|err| DeployError::Bundle(err.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|err| DeployError::Bundle(err.to_string()))?;
            let path = format!(
                "/{}",
                relative
                    .components()
                    .map(|part| part.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            );
            let bytes = std::fs::read(entry.path())?;
            let digest = hex::encode(Sha256::digest(&bytes));
            let content_type = mime_guess::from_path(entry.path())
                .first_or_octet_stream()
                .essence_str()
                .to_string();
            files.push(BundleFile {
                path,
                bytes,
                digest,
                content_type,
            });
        }
        Ok(Self { files })
    }

    /// `/relative/path` → SHA-256 hex digest.
    pub fn manifest(&self) -> BTreeMap<String, String> {
        self.files
            .iter()
            .map(|file| (file.path.clone(), file.digest.clone()))
            .collect()
    }

    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|file| file.bytes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
