//! DLTrainer: dataset preparation and supervised training-tool runs.
//!
//! DLTrainer turns labeled image folders into the train/val layouts expected
//! by YOLO-style training tools, then drives those tools as supervised child
//! processes whose output is streamed line by line.
//!
//! # Modules
//!
//! - [`catalog`]: class catalogs read from label manifests
//! - [`annotation`]: polygon annotation records and normalized box conversion
//! - [`dataset`]: detection and classification splitters behind [`dataset::DatasetVariant`]
//! - [`job`]: tool command lines, training configs and the [`job::JobSupervisor`]
//! - [`error`]: error types for dltrainer operations

pub mod annotation;
pub mod catalog;
pub mod dataset;
pub mod error;
pub mod job;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

pub use error::TrainerError;

use catalog::write_manifest;
use dataset::{
    timestamped_dataset_root, DatasetPaths, DatasetVariant, LabelingSession, SplitOptions,
    TaskMode,
};
use job::tool::DEFAULT_BOARD_PORT;
use job::{
    list_pretrained_models, verify_export, JobHandle, JobState, JobSupervisor, ModelTool,
    ToolCommand, TrainRequest, TrainingJobBuilder,
};

/// The dltrainer CLI application.
#[derive(Parser)]
#[command(name = "dltrainer")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a labeled source directory into a train/val dataset.
    Split(SplitArgs),
    /// Start labeling: open the annotation editor or create sorting folders.
    Label(LabelArgs),
    /// Write a merged training config into a fresh project directory.
    Config(ConfigArgs),
    /// Train from a config written by `config`.
    Train(TrainArgs),
    /// Check the training tool's environment.
    Check(ToolArgs),
    /// Evaluate a trained model on a dataset.
    Val(ValArgs),
    /// Run a trained model on an image or directory.
    Predict(PredictArgs),
    /// Export a trained model to ONNX.
    Export(ExportArgs),
    /// Serve training curves with tensorboard.
    Board(BoardArgs),
    /// List pretrained models, smallest first.
    Models(ModelsArgs),
}

/// Task type of a dataset or training run.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum TaskArg {
    Classify,
    Detect,
}

impl From<TaskArg> for TaskMode {
    fn from(task: TaskArg) -> Self {
        match task {
            TaskArg::Classify => TaskMode::Classify,
            TaskArg::Detect => TaskMode::Detect,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments shared by the dataset subcommands.
#[derive(clap::Args)]
struct DatasetArgs {
    /// Task type of the dataset.
    #[arg(long, value_enum)]
    task: TaskArg,

    /// Source image directory.
    #[arg(long)]
    source: PathBuf,

    /// Label manifest (default: <source>/labels.txt for detect,
    /// <source>_labels.txt beside the source for classify).
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Comma-separated class names; (re)writes the manifest first.
    #[arg(long, value_delimiter = ',')]
    classes: Vec<String>,
}

impl DatasetArgs {
    fn manifest(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| DatasetPaths::default_manifest(self.task.into(), &self.source))
    }

    fn open(
        &self,
        output_root: PathBuf,
        label_tool: Option<PathBuf>,
    ) -> Result<DatasetVariant, TrainerError> {
        let manifest = self.manifest();
        if !self.classes.is_empty() {
            write_manifest(&manifest, &self.classes)?;
            info!("Wrote {} label(s) to {}", self.classes.len(), manifest.display());
        }

        DatasetVariant::open(
            self.task.into(),
            DatasetPaths {
                source_dir: self.source.clone(),
                manifest,
                output_root,
            },
            label_tool,
        )
    }
}

#[derive(clap::Args)]
struct SplitArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Directory the timestamped dataset root is created in.
    #[arg(long, env = "DLTRAINER_WORK_DIR", default_value = "WorkDir")]
    save_dir: PathBuf,

    /// Fraction of samples that go to the training subset.
    #[arg(long, default_value_t = 0.8)]
    train_percent: f64,

    /// Seed for a reproducible shuffle.
    #[arg(long)]
    seed: Option<u64>,

    /// Report format.
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct LabelArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Annotation editor executable (detection only).
    #[arg(long, env = "DLTRAINER_LABEL_TOOL")]
    label_tool: Option<PathBuf>,

    /// Close the editor after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(clap::Args)]
struct ConfigArgs {
    #[arg(long, value_enum)]
    task: TaskArg,

    /// Dataset descriptor (detect) or dataset root (classify).
    #[arg(long)]
    dataset: PathBuf,

    /// YAML template holding the tool's default settings.
    #[arg(long)]
    template: PathBuf,

    /// Directory holding pretrained `.pt` models.
    #[arg(long)]
    pretrained_dir: PathBuf,

    /// Pretrained model file name inside `--pretrained-dir`.
    #[arg(long)]
    model: String,

    #[arg(long, default_value_t = 100)]
    epochs: u32,

    #[arg(long, default_value_t = 16)]
    batch: u32,

    #[arg(long, default_value_t = 640)]
    imgsz: u32,

    /// Initial learning rate.
    #[arg(long, default_value_t = 0.01)]
    lr0: f64,

    /// Compute device (`cpu`, `cuda`, or a device index).
    #[arg(long, default_value = "cpu")]
    device: String,

    #[arg(long, env = "DLTRAINER_WORK_DIR", default_value = "WorkDir")]
    work_dir: PathBuf,
}

/// Location of the training tool.
#[derive(clap::Args)]
struct ToolArgs {
    /// Training tool executable.
    #[arg(long, env = "DLTRAINER_TOOL", default_value = "yolo")]
    tool: PathBuf,

    /// Cancel the job after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(clap::Args)]
struct TrainArgs {
    /// Config written by `dltrainer config`.
    #[arg(long)]
    config: PathBuf,

    /// Directory the tool runs in.
    #[arg(long, env = "DLTRAINER_WORK_DIR", default_value = "WorkDir")]
    work_dir: PathBuf,

    #[command(flatten)]
    tool: ToolArgs,
}

#[derive(clap::Args)]
struct ValArgs {
    /// Trained model (`.pt`).
    #[arg(long)]
    model: PathBuf,

    /// Dataset descriptor.
    #[arg(long)]
    dataset: PathBuf,

    #[command(flatten)]
    tool: ToolArgs,
}

#[derive(clap::Args)]
struct PredictArgs {
    /// Trained model (`.pt`).
    #[arg(long)]
    model: PathBuf,

    /// Image or directory to run on.
    #[arg(long)]
    source: PathBuf,

    #[command(flatten)]
    tool: ToolArgs,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Trained model (`.pt`).
    #[arg(long)]
    model: PathBuf,

    #[command(flatten)]
    tool: ToolArgs,
}

#[derive(clap::Args)]
struct BoardArgs {
    #[arg(long, default_value_t = DEFAULT_BOARD_PORT)]
    port: u16,

    /// Directory holding the training projects.
    #[arg(long, env = "DLTRAINER_WORK_DIR", default_value = "WorkDir")]
    work_dir: PathBuf,

    #[command(flatten)]
    tool: ToolArgs,
}

#[derive(clap::Args)]
struct ModelsArgs {
    #[arg(long)]
    pretrained_dir: PathBuf,
}

/// Run the dltrainer CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), TrainerError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Split(args)) => run_split(args),
        Some(Commands::Label(args)) => run_label(args),
        Some(Commands::Config(args)) => run_config(args),
        Some(Commands::Train(args)) => run_train(args),
        Some(Commands::Check(args)) => {
            let tool = ModelTool::new(&args.tool)?;
            run_job(&tool.check_env(), None, args.timeout_secs)
        }
        Some(Commands::Val(args)) => {
            let tool = ModelTool::new(&args.tool.tool)?;
            let command = tool.evaluate(&args.dataset, &args.model, None)?;
            run_job(&command, None, args.tool.timeout_secs)
        }
        Some(Commands::Predict(args)) => {
            let tool = ModelTool::new(&args.tool.tool)?;
            let command = tool.predict(&args.model, &args.source, None)?;
            run_job(&command, None, args.tool.timeout_secs)
        }
        Some(Commands::Export(args)) => run_export(args),
        Some(Commands::Board(args)) => {
            let tool = ModelTool::new(&args.tool.tool)?;
            let command = tool.tensorboard(&args.work_dir, args.port)?;
            run_job(&command, None, args.tool.timeout_secs)
        }
        Some(Commands::Models(args)) => {
            for name in list_pretrained_models(&args.pretrained_dir)? {
                println!("{name}");
            }
            Ok(())
        }
        None => {
            println!("dltrainer {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Dataset preparation and training-tool runner.");
            println!();
            println!("Run 'dltrainer --help' for usage information.");
            Ok(())
        }
    }
}

fn run_split(args: SplitArgs) -> Result<(), TrainerError> {
    if !(args.train_percent > 0.0 && args.train_percent <= 1.0) {
        return Err(TrainerError::InvalidArgument {
            message: format!(
                "--train-percent must be in (0, 1], got {}",
                args.train_percent
            ),
        });
    }

    let output_root = timestamped_dataset_root(&args.save_dir);
    let variant = args.dataset.open(output_root, None)?;

    let mut opts = SplitOptions::new(args.train_percent);
    if let Some(seed) = args.seed {
        opts = opts.with_seed(seed);
    }

    let report = variant
        .spawn_convert_and_split(opts)
        .join()
        .map_err(|_| TrainerError::WorkerPanicked {
            task: "dataset conversion",
        })??;

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|source| TrainerError::ReportSerialize { source })?;
            println!("{json}");
        }
        OutputFormat::Text => print!("{report}"),
    }
    Ok(())
}

fn run_label(args: LabelArgs) -> Result<(), TrainerError> {
    // Labeling never writes a dataset; the root is unused.
    let variant = args.dataset.open(PathBuf::new(), args.label_tool)?;
    let supervisor = JobSupervisor::new();

    match variant.label_data(&supervisor)? {
        LabelingSession::SortingDirs(dirs) => {
            for dir in dirs {
                println!("{}", dir.display());
            }
            Ok(())
        }
        LabelingSession::Editor(handle) => stream_until_done(&handle, args.timeout_secs),
    }
}

fn run_config(args: ConfigArgs) -> Result<(), TrainerError> {
    let builder = TrainingJobBuilder::new(&args.pretrained_dir, &args.template, &args.work_dir);
    let request = TrainRequest {
        task: args.task.into(),
        dataset: args.dataset,
        pretrained_model: args.model,
        epochs: args.epochs,
        batch: args.batch,
        imgsz: args.imgsz,
        learning_rate: args.lr0,
        device: args.device,
    };

    let job = builder.build(&request)?;
    println!("{}", job.config_path.display());
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<(), TrainerError> {
    let tool = ModelTool::new(&args.tool.tool)?;
    let command = tool.train(&args.config)?;
    let working_dir = args.work_dir.is_dir().then_some(args.work_dir.as_path());
    run_job(&command, working_dir, args.tool.timeout_secs)
}

fn run_export(args: ExportArgs) -> Result<(), TrainerError> {
    let tool = ModelTool::new(&args.tool.tool)?;
    run_job(&tool.export(&args.model)?, None, args.tool.timeout_secs)?;

    let onnx = verify_export(&args.model)?;
    println!("Export Success, Model Save to [{}]", onnx.display());
    Ok(())
}

fn run_job(
    command: &ToolCommand,
    working_dir: Option<&Path>,
    timeout_secs: Option<u64>,
) -> Result<(), TrainerError> {
    let supervisor = JobSupervisor::new();
    let handle = supervisor.launch(command, working_dir)?;
    stream_until_done(&handle, timeout_secs)
}

/// Print the job's output to stdout until it finishes, cancelling it once
/// `timeout_secs` have elapsed.
fn stream_until_done(handle: &JobHandle, timeout_secs: Option<u64>) -> Result<(), TrainerError> {
    let printer = handle.on_line(|line| println!("{line}"));

    if let Some(secs) = timeout_secs {
        let watched = handle.clone();
        thread::spawn(move || {
            if watched.wait_timeout(Duration::from_secs(secs)).is_none() {
                info!("Timeout of {}s reached, cancelling {}", secs, watched.name());
                watched.cancel();
            }
        });
    }

    let state = handle.wait();
    let _ = printer.join();
    if state == JobState::Succeeded {
        println!("success");
    }
    handle.join()
}
