//! External jobs: command construction, training config assembly and the
//! supervisor that runs them.

pub mod builder;
pub mod command;
pub mod supervisor;
pub mod tool;

pub use builder::{TrainRequest, TrainingJob, TrainingJobBuilder};
pub use command::{ensure_tool, ToolCommand};
pub use supervisor::{JobEvent, JobHandle, JobId, JobState, JobSupervisor};
pub use tool::{exported_model_path, list_pretrained_models, verify_export, ModelTool};
