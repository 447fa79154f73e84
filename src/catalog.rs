//! Class catalog loaded from a label manifest.
//!
//! The manifest is a UTF-8 text file with one label per line. The position of
//! a label in the catalog is the class id written into converted annotations.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::TrainerError;

/// Manifest entries that never become classes.
pub const SENTINEL_LABELS: [&str; 2] = ["__ignore__", "_background_"];

/// Ordered list of class labels.
///
/// Built once from a manifest and never mutated afterwards. Entries keep the
/// manifest order; a label listed twice is kept twice and resolves to its
/// first position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassCatalog {
    labels: Vec<String>,
}

impl ClassCatalog {
    /// Builds a catalog from label strings, trimming them and dropping blanks
    /// and sentinel names.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels = labels
            .into_iter()
            .map(|label| label.as_ref().trim().to_string())
            .filter(|label| !label.is_empty() && !SENTINEL_LABELS.contains(&label.as_str()))
            .collect();
        Self { labels }
    }

    /// Canonical class id for `label`, or `None` if the label is not cataloged.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|known| known == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterates `(class_id, label)` pairs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(id, label)| (id, label.as_str()))
    }
}

/// Load a class catalog from a manifest file.
pub fn load_catalog(manifest_path: &Path) -> Result<ClassCatalog, TrainerError> {
    if !manifest_path.is_file() {
        return Err(TrainerError::not_found("label manifest", manifest_path));
    }

    let content = fs::read_to_string(manifest_path)?;
    Ok(ClassCatalog::from_labels(content.lines()))
}

/// Write a manifest file with one trimmed label per line.
///
/// Blank entries are skipped so a trailing comma in a user-typed class list
/// does not produce an empty class.
pub fn write_manifest<S: AsRef<str>>(path: &Path, labels: &[S]) -> Result<(), TrainerError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = fs::File::create(path)?;
    for label in labels {
        let trimmed = label.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        writeln!(file, "{trimmed}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_catalog_excludes_sentinels_and_trims() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let manifest = temp.path().join("labels.txt");
        fs::write(&manifest, "__ignore__\n_background_\n  dent \nscratch\r\n\n").expect("write");

        let catalog = load_catalog(&manifest).expect("load catalog");
        assert_eq!(catalog.labels(), ["dent", "scratch"]);
        assert_eq!(catalog.index_of("scratch"), Some(1));
        assert_eq!(catalog.index_of("__ignore__"), None);
    }

    #[test]
    fn load_catalog_keeps_verbatim_duplicates() {
        let catalog = ClassCatalog::from_labels(["a", "b", "a"]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.index_of("a"), Some(0));
    }

    #[test]
    fn load_catalog_missing_manifest_is_not_found() {
        let err = load_catalog(Path::new("does/not/exist.txt")).unwrap_err();
        assert!(matches!(err, TrainerError::NotFound { .. }));
    }

    #[test]
    fn write_manifest_round_trips_through_load() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let manifest = temp.path().join("nested/labels.txt");
        write_manifest(&manifest, &[" cat", "dog ", ""]).expect("write manifest");

        assert_eq!(fs::read_to_string(&manifest).expect("read"), "cat\ndog\n");
        let catalog = load_catalog(&manifest).expect("load catalog");
        assert_eq!(catalog.labels(), ["cat", "dog"]);
    }
}
