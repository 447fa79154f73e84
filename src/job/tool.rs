//! Command lines for the external training tool.

use std::env::consts::EXE_SUFFIX;
use std::fs;
use std::path::{Path, PathBuf};

use super::command::{ensure_tool, ToolCommand};
use crate::error::TrainerError;

/// Default port for the training-curve viewer.
pub const DEFAULT_BOARD_PORT: u16 = 8899;

/// Builds the tool's commands after checking their inputs exist.
///
/// Nothing here launches a process; hand the result to
/// [`JobSupervisor::launch`](super::JobSupervisor::launch).
#[derive(Clone, Debug)]
pub struct ModelTool {
    tool_path: PathBuf,
}

impl ModelTool {
    pub fn new(tool_path: impl Into<PathBuf>) -> Result<Self, TrainerError> {
        let tool_path = tool_path.into();
        ensure_tool("training tool", &tool_path)?;
        Ok(Self { tool_path })
    }

    pub fn tool_path(&self) -> &Path {
        &self.tool_path
    }

    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.tool_path)
    }

    /// `<tool> check`
    pub fn check_env(&self) -> ToolCommand {
        self.command().subcommand("check")
    }

    /// `<tool> cfg=<config>`; the config's `mode` selects training.
    pub fn train(&self, config: &Path) -> Result<ToolCommand, TrainerError> {
        require_file("training config", config)?;
        Ok(self.command().kv("cfg", config))
    }

    /// `<tool> val project=<dir> model=<pt> data=<yaml>`
    ///
    /// Results land next to the model unless `project` is given.
    pub fn evaluate(
        &self,
        dataset: &Path,
        model: &Path,
        project: Option<&Path>,
    ) -> Result<ToolCommand, TrainerError> {
        require_file("dataset descriptor", dataset)?;
        require_file("model", model)?;
        Ok(self
            .command()
            .subcommand("val")
            .kv("project", project_dir(model, project))
            .kv("model", model)
            .kv("data", dataset))
    }

    /// `<tool> predict project=<dir> model=<pt> source=<path>`
    pub fn predict(
        &self,
        model: &Path,
        source: &Path,
        project: Option<&Path>,
    ) -> Result<ToolCommand, TrainerError> {
        require_file("model", model)?;
        if !source.exists() {
            return Err(TrainerError::not_found("test image", source));
        }
        Ok(self
            .command()
            .subcommand("predict")
            .kv("project", project_dir(model, project))
            .kv("model", model)
            .kv("source", source))
    }

    /// `<tool> export model=<pt> format=onnx opset=13`
    pub fn export(&self, model: &Path) -> Result<ToolCommand, TrainerError> {
        require_file("model", model)?;
        Ok(self
            .command()
            .subcommand("export")
            .kv("model", model)
            .kv("format", "onnx")
            .kv("opset", "13"))
    }

    /// `tensorboard --logdir=<dir> --port=<port>`, using the executable
    /// installed alongside the tool.
    pub fn tensorboard(&self, logdir: &Path, port: u16) -> Result<ToolCommand, TrainerError> {
        let board = self.tensorboard_path();
        ensure_tool("tensorboard", &board)?;

        let mut logdir_arg = std::ffi::OsString::from("--logdir=");
        logdir_arg.push(logdir);
        Ok(ToolCommand::new(board)
            .arg(logdir_arg)
            .arg(format!("--port={port}")))
    }

    fn tensorboard_path(&self) -> PathBuf {
        let name = format!("tensorboard{EXE_SUFFIX}");
        match self.tool_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
            _ => PathBuf::from(name),
        }
    }
}

/// Where an export of `model` is written: same directory and stem, `.onnx`.
pub fn exported_model_path(model: &Path) -> PathBuf {
    model.with_extension("onnx")
}

/// The exported model, if the export produced one.
pub fn verify_export(model: &Path) -> Result<PathBuf, TrainerError> {
    let onnx = exported_model_path(model);
    if onnx.is_file() {
        Ok(onnx)
    } else {
        Err(TrainerError::not_found("exported model", onnx))
    }
}

/// `.pt` files in `dir`, smallest first.
pub fn list_pretrained_models(dir: &Path) -> Result<Vec<String>, TrainerError> {
    if !dir.is_dir() {
        return Err(TrainerError::not_found("pretrained model directory", dir));
    }

    let mut models = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("pt") {
            continue;
        }
        let size = entry.metadata()?.len();
        models.push((size, entry.file_name().to_string_lossy().into_owned()));
    }
    models.sort();
    Ok(models.into_iter().map(|(_, name)| name).collect())
}

fn require_file(what: &'static str, path: &Path) -> Result<(), TrainerError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(TrainerError::not_found(what, path))
    }
}

fn project_dir(model: &Path, project: Option<&Path>) -> PathBuf {
    match project {
        Some(dir) => dir.to_path_buf(),
        None => model
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    }
}
