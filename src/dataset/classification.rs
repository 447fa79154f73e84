//! Classification datasets: one directory per class to `{train,val}/<class>`.
//!
//! The source tree must already be sorted by hand: its top level holds only
//! directories, named exactly after the catalog labels, and everything below
//! them is an image.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use super::descriptor::DatasetDescriptor;
use super::layout::{is_image_file, timestamp, ClassificationLayout, Subset};
use super::report::{SkippedSample, SplitReport};
use super::split::{split_samples, SplitOptions};
use super::TaskMode;
use crate::catalog::ClassCatalog;
use crate::error::TrainerError;

/// Images found for one class directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassMembers {
    pub label: String,
    pub images: Vec<PathBuf>,
}

/// Check that `source_dir` is a hand-sorted classification tree matching
/// `catalog`, and collect each class's images in catalog order.
///
/// Reports only the first violation, checked in this order: a top-level
/// entry that is not a directory, a class-count mismatch, a directory name
/// missing from the catalog, a non-image file anywhere below a class.
pub fn validate_sorted_tree(
    source_dir: &Path,
    catalog: &ClassCatalog,
) -> Result<Vec<ClassMembers>, TrainerError> {
    if !source_dir.is_dir() {
        return Err(TrainerError::not_found("source directory", source_dir));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(source_dir)? {
        entries.push(entry?.path());
    }
    entries.sort();

    if let Some(stray) = entries.iter().find(|path| !path.is_dir()) {
        return Err(TrainerError::Validation {
            path: stray.clone(),
            message: "expected only class directories, found a non-directory entry".to_string(),
        });
    }

    let expected: BTreeSet<&str> = catalog.labels().iter().map(String::as_str).collect();
    if entries.len() != expected.len() {
        return Err(TrainerError::Validation {
            path: source_dir.to_path_buf(),
            message: format!(
                "found {} class directories but the catalog has {} label(s)",
                entries.len(),
                expected.len()
            ),
        });
    }

    for dir in &entries {
        let name = dir.file_name().and_then(|name| name.to_str()).unwrap_or("");
        if !expected.contains(name) {
            return Err(TrainerError::Validation {
                path: dir.clone(),
                message: format!("directory name '{name}' is not a catalog label"),
            });
        }
    }

    let mut members = Vec::with_capacity(expected.len());
    for label in expected {
        let class_dir = source_dir.join(label);
        let mut images = Vec::new();
        for entry in WalkDir::new(&class_dir).sort_by_file_name() {
            let entry = entry.map_err(|source| TrainerError::Validation {
                path: class_dir.clone(),
                message: format!("failed while traversing directory: {source}"),
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            if !is_image_file(entry.path()) {
                return Err(TrainerError::Validation {
                    path: entry.path().to_path_buf(),
                    message: "not a recognised image file".to_string(),
                });
            }
            images.push(entry.path().to_path_buf());
        }
        members.push(ClassMembers {
            label: label.to_string(),
            images,
        });
    }

    // Report classes in catalog order rather than name order.
    members.sort_by_key(|member| catalog.index_of(&member.label));
    Ok(members)
}

/// Split a hand-sorted classification tree into `output_root/{train,val}/<class>`.
///
/// Each class is shuffled and cut independently. A descriptor is written at
/// the end of the run with `train`/`val` pointing at the subset directories.
pub fn convert_and_split_classification(
    source_dir: &Path,
    output_root: &Path,
    catalog: &ClassCatalog,
    opts: &SplitOptions,
) -> Result<SplitReport, TrainerError> {
    let members = validate_sorted_tree(source_dir, catalog)?;
    let classes: Vec<&str> = members.iter().map(|m| m.label.as_str()).collect();
    let layout = ClassificationLayout::create(output_root, &classes)?;

    let (mut total, mut train, mut val) = (0, 0, 0);
    let mut skipped = Vec::new();

    for class in members {
        // Subset directories are flat, so a second image with the same file
        // name would overwrite the first.
        let mut names = BTreeSet::new();
        let mut images = Vec::with_capacity(class.images.len());
        for image in class.images {
            total += 1;
            let name = image.file_name().map(|name| name.to_os_string());
            if names.insert(name) {
                images.push(image);
            } else {
                let reason = format!("duplicate file name within class '{}'", class.label);
                warn!("Skipping {}: {}", image.display(), reason);
                skipped.push(SkippedSample {
                    path: image,
                    reason,
                });
            }
        }

        let plan = split_samples(images, opts);
        train += plan.train.len();
        val += plan.val.len();
        info!(
            "Class '{}': Train Data Num: {}, Val Data Num: {}",
            class.label,
            plan.train.len(),
            plan.val.len()
        );

        for (subset, images) in [(Subset::Train, plan.train), (Subset::Val, plan.val)] {
            let dst_dir = layout.class_dir(subset, &class.label);
            for image in images {
                if let Err(err) = copy_into(&image, &dst_dir) {
                    warn!("Skipping {}: {}", image.display(), err);
                    skipped.push(SkippedSample::from_error(&image, &err));
                }
            }
        }
    }
    info!(
        "Total Data Num: {}, Train Data Num: {}, Val Data Num: {}",
        total, train, val
    );

    let descriptor_path = layout.root.join(format!("dataset_{}.yaml", timestamp()));
    DatasetDescriptor::new(&layout.root, "train", "val", catalog).write(&descriptor_path)?;
    info!("DataSet Split Complete. {}", layout.root.display());

    Ok(SplitReport {
        task: TaskMode::Classify,
        root: layout.root,
        descriptor: descriptor_path,
        total,
        train,
        val,
        skipped,
    })
}

/// Create one empty sorting directory per catalog label inside `source_dir`.
///
/// Existing directories are left alone so sorting can resume.
pub fn prepare_sorting_dirs(
    source_dir: &Path,
    catalog: &ClassCatalog,
) -> Result<Vec<PathBuf>, TrainerError> {
    if !source_dir.is_dir() {
        return Err(TrainerError::not_found("source directory", source_dir));
    }

    let mut dirs = Vec::with_capacity(catalog.len());
    for (_, label) in catalog.iter() {
        let dir = source_dir.join(label);
        fs::create_dir_all(&dir)?;
        dirs.push(dir);
    }
    Ok(dirs)
}

fn copy_into(image: &Path, dst_dir: &Path) -> Result<(), TrainerError> {
    let name = image.file_name().ok_or_else(|| TrainerError::Conversion {
        path: image.to_path_buf(),
        message: "image has no file name".to_string(),
    })?;
    fs::copy(image, dst_dir.join(name))?;
    Ok(())
}
