//! Detection datasets: polygon JSON + image pairs to `images/` + `labels/`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::descriptor::DatasetDescriptor;
use super::layout::{has_extension, timestamp, DetectionLayout, Subset, IMAGE_EXTENSIONS};
use super::report::{SkippedSample, SplitReport};
use super::split::{split_samples, SplitOptions};
use super::TaskMode;
use crate::annotation::{convert_detection_annotation, read_polygon_file, write_label_file};
use crate::catalog::ClassCatalog;
use crate::error::TrainerError;

/// Fewest annotation files a detection split accepts.
pub const MIN_LABELED_SAMPLES: usize = 11;

/// Extension of the polygon annotation sidecar files.
pub const ANNOTATION_EXTENSION: &str = "json";

/// Convert a directory of image + polygon JSON pairs into a detection layout
/// under `output_root` and write its descriptor.
///
/// Fails before touching the filesystem if the source holds fewer than
/// [`MIN_LABELED_SAMPLES`] annotation files. Samples that cannot be converted
/// are logged and listed in the report; they never abort the run.
pub fn convert_and_split_detection(
    source_dir: &Path,
    output_root: &Path,
    catalog: &ClassCatalog,
    opts: &SplitOptions,
) -> Result<SplitReport, TrainerError> {
    if !source_dir.is_dir() {
        return Err(TrainerError::not_found("source directory", source_dir));
    }

    let annotation_files = collect_annotation_files(source_dir)?;
    let total = annotation_files.len();
    if total < MIN_LABELED_SAMPLES {
        return Err(TrainerError::InsufficientData {
            path: source_dir.to_path_buf(),
            found: total,
            required: MIN_LABELED_SAMPLES,
        });
    }

    let plan = split_samples(annotation_files, opts);
    let (train, val) = (plan.train.len(), plan.val.len());
    info!(
        "Total Data Num: {}, Train Data Num: {}, Val Data Num: {}",
        total, train, val
    );

    let layout = DetectionLayout::create(output_root)?;

    let mut skipped = Vec::new();
    for (subset, files) in [(Subset::Train, plan.train), (Subset::Val, plan.val)] {
        for json_path in files {
            if let Err(err) = convert_sample(&json_path, subset, &layout, catalog) {
                warn!("Skipping {}: {}", json_path.display(), err);
                skipped.push(SkippedSample::from_error(&json_path, &err));
            }
        }
    }

    let descriptor_path = layout.root.join(format!("dataset_{}.yaml", timestamp()));
    DatasetDescriptor::new(&layout.root, "images/train", "images/val", catalog)
        .write(&descriptor_path)?;
    info!("DataSet Split Complete. {}", descriptor_path.display());

    Ok(SplitReport {
        task: TaskMode::Detect,
        root: layout.root,
        descriptor: descriptor_path,
        total,
        train,
        val,
        skipped,
    })
}

/// Annotation files directly inside `dir`, sorted by file name.
///
/// Sorting makes a seeded shuffle reproducible regardless of directory
/// iteration order.
pub fn collect_annotation_files(dir: &Path) -> Result<Vec<PathBuf>, TrainerError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, &[ANNOTATION_EXTENSION]) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// The image sharing `annotation_path`'s base name, trying extensions in
/// [`IMAGE_EXTENSIONS`] order.
pub fn find_companion_image(annotation_path: &Path) -> Option<PathBuf> {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| annotation_path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

fn convert_sample(
    json_path: &Path,
    subset: Subset,
    layout: &DetectionLayout,
    catalog: &ClassCatalog,
) -> Result<(), TrainerError> {
    let image_path =
        find_companion_image(json_path).ok_or_else(|| TrainerError::Conversion {
            path: json_path.to_path_buf(),
            message: format!(
                "no companion image found (tried {})",
                IMAGE_EXTENSIONS.join(", ")
            ),
        })?;

    let record = read_polygon_file(json_path)?;
    let (width, height) = match read_image_dimensions(&image_path) {
        Ok(size) => size,
        Err(err) => {
            debug!(
                "{}; using size recorded in {}",
                err,
                json_path.display()
            );
            (record.image_width, record.image_height)
        }
    };
    if width == 0 || height == 0 {
        return Err(TrainerError::Conversion {
            path: json_path.to_path_buf(),
            message: format!("image size {width}x{height} is degenerate"),
        });
    }

    let rows = convert_detection_annotation(width, height, &record.shapes, catalog);

    let (Some(image_name), Some(stem)) = (image_path.file_name(), json_path.file_stem()) else {
        return Err(TrainerError::Conversion {
            path: json_path.to_path_buf(),
            message: "sample has no file name".to_string(),
        });
    };

    fs::copy(&image_path, layout.images_dir(subset).join(image_name))?;

    let mut label_name = stem.to_os_string();
    label_name.push(".txt");
    write_label_file(&layout.labels_dir(subset).join(label_name), &rows)
}

fn read_image_dimensions(path: &Path) -> Result<(u32, u32), TrainerError> {
    let size = imagesize::size(path).map_err(|source| TrainerError::ImageDimensionRead {
        path: path.to_path_buf(),
        source,
    })?;

    let width = u32::try_from(size.width).map_err(|_| TrainerError::Conversion {
        path: path.to_path_buf(),
        message: format!("image width {} does not fit in u32", size.width),
    })?;
    let height = u32::try_from(size.height).map_err(|_| TrainerError::Conversion {
        path: path.to_path_buf(),
        message: format!("image height {} does not fit in u32", size.height),
    })?;

    Ok((width, height))
}
