//! Training configuration assembly.
//!
//! A build merges the YAML template with the run's settings, creates a fresh
//! `Proj_<timestamp>` directory under the work directory and writes the
//! merged result there as `tmp_config.yaml`. The training tool only ever
//! sees that file's path.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::dataset::layout::{create_fresh_dir, timestamp};
use crate::dataset::TaskMode;
use crate::error::TrainerError;

/// File name of the merged configuration inside a project directory.
pub const CONFIG_FILE_NAME: &str = "tmp_config.yaml";

/// Run-specific training settings.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainRequest {
    pub task: TaskMode,
    /// Dataset descriptor (detection) or dataset root (classification).
    pub dataset: PathBuf,
    /// File name of a model inside the pretrained model directory.
    pub pretrained_model: String,
    pub epochs: u32,
    pub batch: u32,
    pub imgsz: u32,
    pub learning_rate: f64,
    /// `cpu`, `cuda`, or a device index understood by the tool.
    pub device: String,
}

impl TrainRequest {
    pub fn new(
        task: TaskMode,
        dataset: impl Into<PathBuf>,
        pretrained_model: impl Into<String>,
    ) -> Self {
        Self {
            task,
            dataset: dataset.into(),
            pretrained_model: pretrained_model.into(),
            epochs: 100,
            batch: 16,
            imgsz: 640,
            learning_rate: 0.01,
            device: "cpu".to_string(),
        }
    }
}

/// Output of [`TrainingJobBuilder::build`].
#[derive(Clone, Debug)]
pub struct TrainingJob {
    pub project_dir: PathBuf,
    pub config_path: PathBuf,
    pub config: Mapping,
}

#[derive(Clone, Debug)]
pub struct TrainingJobBuilder {
    pretrained_model_dir: PathBuf,
    template_path: PathBuf,
    work_dir: PathBuf,
}

impl TrainingJobBuilder {
    pub fn new(
        pretrained_model_dir: impl Into<PathBuf>,
        template_path: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pretrained_model_dir: pretrained_model_dir.into(),
            template_path: template_path.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Merge the template with `request` and write it to a new project dir.
    ///
    /// Inputs are checked before anything is created. The chosen pretrained
    /// model is also copied into the work directory, where the tool looks
    /// for bare model names.
    pub fn build(&self, request: &TrainRequest) -> Result<TrainingJob, TrainerError> {
        if !self.template_path.is_file() {
            return Err(TrainerError::not_found("config template", &self.template_path));
        }
        if !request.dataset.exists() {
            return Err(TrainerError::not_found("dataset", &request.dataset));
        }
        let model_path = self.pretrained_model_dir.join(&request.pretrained_model);
        if !model_path.is_file() {
            return Err(TrainerError::not_found("pretrained model", model_path));
        }

        let mut config = load_template(&self.template_path)?;

        fs::create_dir_all(&self.work_dir)?;
        let work_dir = fs::canonicalize(&self.work_dir)?;
        let project_dir = create_fresh_dir(&work_dir.join(format!("Proj_{}", timestamp())))?;

        apply_overrides(&mut config, request, &model_path, &project_dir);
        stage_model(&model_path, &work_dir)?;

        let config_path = project_dir.join(CONFIG_FILE_NAME);
        write_config(&config_path, &config)?;
        info!("Training config written to {}", config_path.display());

        Ok(TrainingJob {
            project_dir,
            config_path,
            config,
        })
    }
}

fn load_template(path: &Path) -> Result<Mapping, TrainerError> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&text).map_err(|source| TrainerError::YamlParse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(TrainerError::InvalidArgument {
            message: format!(
                "config template {} must be a YAML mapping",
                path.display()
            ),
        }),
    }
}

fn apply_overrides(config: &mut Mapping, request: &TrainRequest, model: &Path, project: &Path) {
    let mut set = |key: &str, value: Value| {
        config.insert(Value::from(key), value);
    };
    set("task", Value::from(request.task.as_str()));
    set("mode", Value::from("train"));
    set("model", path_value(model));
    set("data", path_value(&request.dataset));
    set("epochs", Value::from(request.epochs));
    set("batch", Value::from(request.batch));
    set("imgsz", Value::from(request.imgsz));
    set("lr0", Value::from(request.learning_rate));
    set("device", Value::from(request.device.as_str()));
    set("project", path_value(project));
}

fn path_value(path: &Path) -> Value {
    Value::from(path.to_string_lossy().into_owned())
}

fn stage_model(model_path: &Path, work_dir: &Path) -> Result<(), TrainerError> {
    let Some(name) = model_path.file_name() else {
        return Ok(());
    };
    let staged = work_dir.join(name);
    if staged != model_path {
        fs::copy(model_path, &staged)?;
    }
    Ok(())
}

fn write_config(path: &Path, config: &Mapping) -> Result<(), TrainerError> {
    let text = serde_yaml::to_string(config).map_err(|source| TrainerError::YamlWrite {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text)?;
    Ok(())
}
