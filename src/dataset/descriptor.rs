//! Dataset descriptor: the YAML file the training tool reads to find a dataset.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::ClassCatalog;
use crate::error::TrainerError;

/// Location and class map of a prepared dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Absolute dataset root.
    pub path: PathBuf,
    /// Train images, relative to `path`.
    pub train: String,
    /// Validation images, relative to `path`.
    pub val: String,
    /// `class_id -> label`, in catalog order.
    pub names: BTreeMap<usize, String>,
}

impl DatasetDescriptor {
    pub fn new(
        root: impl Into<PathBuf>,
        train: impl Into<String>,
        val: impl Into<String>,
        catalog: &ClassCatalog,
    ) -> Self {
        Self {
            path: root.into(),
            train: train.into(),
            val: val.into(),
            names: catalog
                .iter()
                .map(|(id, label)| (id, label.to_string()))
                .collect(),
        }
    }

    /// Serialize to `path`. The file is written once and never updated.
    pub fn write(&self, path: &Path) -> Result<(), TrainerError> {
        let yaml = serde_yaml::to_string(self).map_err(|source| TrainerError::YamlWrite {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, yaml)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, TrainerError> {
        if !path.is_file() {
            return Err(TrainerError::not_found("dataset descriptor", path));
        }
        let data = fs::read_to_string(path)?;
        serde_yaml::from_str(&data).map_err(|source| TrainerError::YamlParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_yaml_lists_names_by_id() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let catalog = ClassCatalog::from_labels(["dent", "scratch", "it's"]);
        let descriptor =
            DatasetDescriptor::new(temp.path(), "images/train", "images/val", &catalog);

        let out = temp.path().join("dataset.yaml");
        descriptor.write(&out).expect("write descriptor");

        let yaml = fs::read_to_string(&out).expect("read descriptor");
        assert!(yaml.contains("train: images/train"));
        assert!(yaml.contains("val: images/val"));
        assert!(yaml.contains("0: dent"));
        assert!(yaml.contains("1: scratch"));

        let restored = DatasetDescriptor::read(&out).expect("read back");
        assert_eq!(restored, descriptor);
    }
}
