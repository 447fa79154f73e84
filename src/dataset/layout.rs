//! Output directory layouts and the small filesystem helpers they need.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

use crate::error::TrainerError;

/// Image extensions recognised in source directories, in lookup priority order.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["bmp", "jpeg", "png", "jpg"];

/// Second-resolution local timestamp used in generated directory and file names.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// `<save_dir>/dataset_<timestamp>`.
pub fn timestamped_dataset_root(save_dir: &Path) -> PathBuf {
    save_dir.join(format!("dataset_{}", timestamp()))
}

/// Create `path` from scratch, deleting whatever was there before.
///
/// Returns the absolute path of the new directory.
pub fn create_fresh_dir(path: &Path) -> Result<PathBuf, TrainerError> {
    if path.exists() {
        warn!(
            "Directory {} already exists. Deleting and recreating it.",
            path.display()
        );
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
    }
    fs::create_dir_all(path)?;
    Ok(fs::canonicalize(path)?)
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

pub fn is_image_file(path: &Path) -> bool {
    has_extension(path, &IMAGE_EXTENSIONS)
}

/// `<root>/images/{train,val}` + `<root>/labels/{train,val}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectionLayout {
    pub root: PathBuf,
    pub train_images: PathBuf,
    pub val_images: PathBuf,
    pub train_labels: PathBuf,
    pub val_labels: PathBuf,
}

impl DetectionLayout {
    /// Create the layout fresh under `root`.
    pub fn create(root: &Path) -> Result<Self, TrainerError> {
        let root = create_fresh_dir(root)?;
        let layout = Self {
            train_images: root.join("images").join("train"),
            val_images: root.join("images").join("val"),
            train_labels: root.join("labels").join("train"),
            val_labels: root.join("labels").join("val"),
            root,
        };
        for dir in [
            &layout.train_images,
            &layout.val_images,
            &layout.train_labels,
            &layout.val_labels,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(layout)
    }

    pub fn images_dir(&self, subset: Subset) -> &Path {
        match subset {
            Subset::Train => &self.train_images,
            Subset::Val => &self.val_images,
        }
    }

    pub fn labels_dir(&self, subset: Subset) -> &Path {
        match subset {
            Subset::Train => &self.train_labels,
            Subset::Val => &self.val_labels,
        }
    }
}

/// `<root>/{train,val}/<class>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassificationLayout {
    pub root: PathBuf,
    pub train: PathBuf,
    pub val: PathBuf,
}

impl ClassificationLayout {
    /// Create the layout fresh under `root`, with one directory per class in
    /// both subsets.
    pub fn create<S: AsRef<str>>(root: &Path, classes: &[S]) -> Result<Self, TrainerError> {
        let root = create_fresh_dir(root)?;
        let layout = Self {
            train: root.join("train"),
            val: root.join("val"),
            root,
        };
        for class in classes {
            fs::create_dir_all(layout.train.join(class.as_ref()))?;
            fs::create_dir_all(layout.val.join(class.as_ref()))?;
        }
        Ok(layout)
    }

    pub fn class_dir(&self, subset: Subset, class: &str) -> PathBuf {
        match subset {
            Subset::Train => self.train.join(class),
            Subset::Val => self.val.join(class),
        }
    }
}

/// Which side of a split a sample lands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Subset {
    Train,
    Val,
}

impl Subset {
    pub fn as_str(self) -> &'static str {
        match self {
            Subset::Train => "train",
            Subset::Val => "val",
        }
    }
}
