//! Class label sets
//!
//! A classifier outputs an index; the label set maps it back to a name. The
//! ordering matches an image-folder dataset: one class per sub-directory,
//! sorted by name.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::error::{MaskClassifierError, Result, ResultExt};

/// Default labels of the face-mask dataset, in sorted directory order
pub const DEFAULT_LABELS: [&str; 2] = ["with_mask", "without_mask"];

/// Ordered list of class names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    names: Vec<String>,
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::from_names(DEFAULT_LABELS)
    }
}

impl LabelSet {
    /// Build a label set from names, kept in the given order
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a label set from the sub-directories of a dataset root
    ///
    /// Each sub-directory is one class; classes are sorted by name.
    pub fn from_image_folder(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(MaskClassifierError::PathNotFound(root.to_path_buf()));
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        if names.is_empty() {
            return Err(MaskClassifierError::Config(format!(
                "no class directories found in {:?}",
                root
            )));
        }

        debug!("Found {} classes in {:?}", names.len(), root);
        Ok(Self { names })
    }

    /// Load a label set from a file
    ///
    /// `.json` files hold an array of strings; anything else is read as one
    /// label per line, ignoring blank lines.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MaskClassifierError::PathNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let labels = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("invalid label file {:?}", path))?
        } else {
            Self::from_names(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty()),
            )
        };

        Ok(labels)
    }

    /// Name of class `index`
    pub fn get(&self, index: usize) -> Result<&str> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or(MaskClassifierError::LabelOutOfRange {
                index,
                len: self.names.len(),
            })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.names.iter().any(|name| name == label)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_labels() {
        let labels = LabelSet::default();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(0).unwrap(), "with_mask");
        assert_eq!(labels.get(1).unwrap(), "without_mask");
    }

    #[test]
    fn test_out_of_range_index() {
        let labels = LabelSet::from_names(["a", "b"]);
        assert!(matches!(
            labels.get(2),
            Err(MaskClassifierError::LabelOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_image_folder_is_sorted_and_skips_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("without_mask")).unwrap();
        std::fs::create_dir(dir.path().join("with_mask")).unwrap();
        std::fs::write(dir.path().join("README.txt"), "not a class").unwrap();

        let labels = LabelSet::from_image_folder(dir.path()).unwrap();
        assert_eq!(labels.names(), &["with_mask".to_string(), "without_mask".to_string()]);
    }

    #[test]
    fn test_image_folder_errors() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            LabelSet::from_image_folder(dir.path()),
            Err(MaskClassifierError::Config(_))
        ));
        assert!(matches!(
            LabelSet::from_image_folder(&dir.path().join("missing")),
            Err(MaskClassifierError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_from_text_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "mask\n\n  no_mask  \n").unwrap();

        let labels = LabelSet::from_file(&path).unwrap();
        assert_eq!(labels, LabelSet::from_names(["mask", "no_mask"]));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(&path, r#"["cat", "dog", "bird"]"#).unwrap();

        let labels = LabelSet::from_file(&path).unwrap();
        assert_eq!(labels.len(), 3);
        assert!(labels.contains("dog"));

        std::fs::write(&path, r#"{"not": "a list"}"#).unwrap();
        assert!(LabelSet::from_file(&path).is_err());
    }
}
