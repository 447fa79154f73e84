use std::path::PathBuf;
use thiserror::Error;

/// The main error type for dltrainer operations.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("Invalid dataset structure at {}: {message}", path.display())]
    Validation { path: PathBuf, message: String },

    #[error(
        "Not enough labeled data in {}: found {found} annotation file(s), need at least {required}",
        path.display()
    )]
    InsufficientData {
        path: PathBuf,
        found: usize,
        required: usize,
    },

    #[error("Failed to convert sample {}: {message}", path.display())]
    Conversion { path: PathBuf, message: String },

    #[error("{program} exited with {}", exit_code_text(*code))]
    ProcessExit { program: String, code: Option<i32> },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse polygon annotation JSON from {}: {source}", path.display())]
    PolygonJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse YAML from {}: {source}", path.display())]
    YamlParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write YAML to {}: {source}", path.display())]
    YamlWrite {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to read image dimensions from {}: {source}", path.display())]
    ImageDimensionRead {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Failed to serialize split report: {source}")]
    ReportSerialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("{task} worker thread panicked")]
    WorkerPanicked { task: &'static str },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl TrainerError {
    pub(crate) fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        TrainerError::NotFound {
            what,
            path: path.into(),
        }
    }
}

fn exit_code_text(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn report_serialize_keeps_its_json_source() {
        let source = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = TrainerError::ReportSerialize { source };
        assert!(err.to_string().starts_with("Failed to serialize split report"));
        assert!(err.source().is_some());
    }

    #[test]
    fn worker_panic_names_the_task() {
        let err = TrainerError::WorkerPanicked {
            task: "dataset conversion",
        };
        assert_eq!(err.to_string(), "dataset conversion worker thread panicked");
    }
}
