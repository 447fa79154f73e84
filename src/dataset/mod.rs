//! Dataset preparation: labeling hand-off and train/val conversion.
//!
//! A [`DatasetVariant`] bundles a source directory, a class catalog and an
//! output root behind one contract for both task types:
//!
//! - [`DatasetVariant::label_data`] hands the source over for labeling
//!   (the annotation editor for detection, sorting directories for
//!   classification).
//! - [`DatasetVariant::convert_and_split`] builds the canonical train/val
//!   layout and its descriptor.

pub mod classification;
pub mod descriptor;
pub mod detection;
pub mod layout;
pub mod report;
pub mod split;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use serde::Serialize;
use tracing::info;

pub use descriptor::DatasetDescriptor;
pub use layout::{timestamped_dataset_root, Subset};
pub use report::{SkippedSample, SplitReport};
pub use split::{SplitOptions, SplitPlan};

use crate::catalog::{load_catalog, ClassCatalog};
use crate::error::TrainerError;
use crate::job::{ensure_tool, JobHandle, JobSupervisor, ToolCommand};

/// The kind of model a dataset is prepared for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    Classify,
    Detect,
}

impl TaskMode {
    /// Name understood by the training tool's `task=` setting.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskMode::Classify => "classify",
            TaskMode::Detect => "detect",
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paths shared by both dataset variants.
#[derive(Clone, Debug)]
pub struct DatasetPaths {
    /// Raw images (and, for detection, their polygon JSON sidecars).
    pub source_dir: PathBuf,
    /// Label manifest the catalog is read from.
    pub manifest: PathBuf,
    /// Dataset root to (re)create on conversion.
    pub output_root: PathBuf,
}

impl DatasetPaths {
    /// Manifest location used when none is given.
    ///
    /// Detection keeps `labels.txt` inside the source, next to the polygon
    /// files. A classification source may only hold class directories, so
    /// its manifest is the sibling file `<source name>_labels.txt`.
    pub fn default_manifest(task: TaskMode, source_dir: &Path) -> PathBuf {
        match task {
            TaskMode::Detect => source_dir.join("labels.txt"),
            TaskMode::Classify => {
                let source =
                    fs::canonicalize(source_dir).unwrap_or_else(|_| source_dir.to_path_buf());
                match source.file_name() {
                    Some(name) => {
                        source.with_file_name(format!("{}_labels.txt", name.to_string_lossy()))
                    }
                    None => source.join("labels.txt"),
                }
            }
        }
    }

    /// Whether the manifest sits directly inside the source directory.
    fn manifest_in_source(&self) -> bool {
        let resolve = |path: &Path| fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let source = resolve(&self.source_dir);
        resolve(&self.manifest).parent() == Some(source.as_path())
    }
}

/// Hand-sorted class folders.
#[derive(Clone, Debug)]
pub struct ClassificationDataset {
    paths: DatasetPaths,
    catalog: ClassCatalog,
}

/// Images annotated with the external polygon editor.
#[derive(Clone, Debug)]
pub struct DetectionDataset {
    paths: DatasetPaths,
    catalog: ClassCatalog,
    label_tool: Option<PathBuf>,
}

/// One of the mutually exclusive dataset preparation modes.
#[derive(Clone, Debug)]
pub enum DatasetVariant {
    Classification(ClassificationDataset),
    Detection(DetectionDataset),
}

/// What [`DatasetVariant::label_data`] started.
#[derive(Debug)]
pub enum LabelingSession {
    /// The annotation editor, running as a supervised job.
    Editor(JobHandle),
    /// Empty per-class folders for manual sorting.
    SortingDirs(Vec<PathBuf>),
}

impl DatasetVariant {
    /// Open a dataset for `task`, loading its catalog.
    ///
    /// Fails early if the source directory or manifest is missing, or if a
    /// classification manifest lives inside the class tree it describes.
    /// `label_tool` is only used by the detection variant.
    pub fn open(
        task: TaskMode,
        paths: DatasetPaths,
        label_tool: Option<PathBuf>,
    ) -> Result<Self, TrainerError> {
        if !paths.source_dir.is_dir() {
            return Err(TrainerError::not_found("source directory", &paths.source_dir));
        }
        if task == TaskMode::Classify && paths.manifest_in_source() {
            return Err(TrainerError::InvalidArgument {
                message: format!(
                    "classification manifest {} must not be inside the source directory {}",
                    paths.manifest.display(),
                    paths.source_dir.display()
                ),
            });
        }
        let catalog = load_catalog(&paths.manifest)?;
        info!(
            "Use {} task mode with {} class(es)",
            task,
            catalog.len()
        );

        Ok(match task {
            TaskMode::Classify => {
                DatasetVariant::Classification(ClassificationDataset { paths, catalog })
            }
            TaskMode::Detect => DatasetVariant::Detection(DetectionDataset {
                paths,
                catalog,
                label_tool,
            }),
        })
    }

    pub fn task(&self) -> TaskMode {
        match self {
            DatasetVariant::Classification(_) => TaskMode::Classify,
            DatasetVariant::Detection(_) => TaskMode::Detect,
        }
    }

    pub fn catalog(&self) -> &ClassCatalog {
        match self {
            DatasetVariant::Classification(ds) => &ds.catalog,
            DatasetVariant::Detection(ds) => &ds.catalog,
        }
    }

    fn paths(&self) -> &DatasetPaths {
        match self {
            DatasetVariant::Classification(ds) => &ds.paths,
            DatasetVariant::Detection(ds) => &ds.paths,
        }
    }

    /// Directory the user labels in.
    pub fn label_source(&self) -> &Path {
        &self.paths().source_dir
    }

    pub fn output_root(&self) -> &Path {
        &self.paths().output_root
    }

    /// Hand the source over for labeling.
    pub fn label_data(&self, supervisor: &JobSupervisor) -> Result<LabelingSession, TrainerError> {
        match self {
            DatasetVariant::Classification(ds) => {
                let dirs = classification::prepare_sorting_dirs(&ds.paths.source_dir, &ds.catalog)?;
                info!(
                    "Created {} sorting folder(s) in {}",
                    dirs.len(),
                    ds.paths.source_dir.display()
                );
                Ok(LabelingSession::SortingDirs(dirs))
            }
            DatasetVariant::Detection(ds) => {
                let command = ds.label_command()?;
                let handle = supervisor.launch(&command, None)?;
                Ok(LabelingSession::Editor(handle))
            }
        }
    }

    /// Convert the source into the canonical layout under the output root.
    pub fn convert_and_split(&self, opts: &SplitOptions) -> Result<SplitReport, TrainerError> {
        match self {
            DatasetVariant::Classification(ds) => classification::convert_and_split_classification(
                &ds.paths.source_dir,
                &ds.paths.output_root,
                &ds.catalog,
                opts,
            ),
            DatasetVariant::Detection(ds) => detection::convert_and_split_detection(
                &ds.paths.source_dir,
                &ds.paths.output_root,
                &ds.catalog,
                opts,
            ),
        }
    }

    /// Run [`convert_and_split`](Self::convert_and_split) on its own thread.
    pub fn spawn_convert_and_split(
        self,
        opts: SplitOptions,
    ) -> thread::JoinHandle<Result<SplitReport, TrainerError>> {
        thread::spawn(move || self.convert_and_split(&opts))
    }
}

impl DetectionDataset {
    /// `<label_tool> <source_dir> --labels <manifest> --nodata --autosave`
    pub fn label_command(&self) -> Result<ToolCommand, TrainerError> {
        let tool = self
            .label_tool
            .as_deref()
            .ok_or_else(|| TrainerError::InvalidArgument {
                message: "no annotation tool configured for detection labeling".to_string(),
            })?;
        ensure_tool("annotation tool", tool)?;

        Ok(ToolCommand::new(tool)
            .arg(&self.paths.source_dir)
            .arg("--labels")
            .arg(&self.paths.manifest)
            .arg("--nodata")
            .arg("--autosave"))
    }
}
