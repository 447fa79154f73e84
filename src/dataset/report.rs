//! Outcome of one convert-and-split run.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::TaskMode;
use crate::error::TrainerError;

/// What a split produced, including the samples that had to be skipped.
#[derive(Clone, Debug, Serialize)]
pub struct SplitReport {
    /// Serialized as `"detect"` or `"classify"`.
    pub task: TaskMode,
    /// Absolute dataset root.
    pub root: PathBuf,
    /// Descriptor file written at the end of the run.
    pub descriptor: PathBuf,
    /// Samples found in the source before splitting.
    pub total: usize,
    /// Samples assigned to the train subset.
    pub train: usize,
    /// Samples assigned to the validation subset.
    pub val: usize,
    /// Samples that could not be converted, in processing order.
    pub skipped: Vec<SkippedSample>,
}

impl SplitReport {
    /// Samples that made it into the layout.
    pub fn written(&self) -> usize {
        self.total - self.skipped.len()
    }

    /// Path the training tool should be pointed at.
    ///
    /// Detection training reads the descriptor; classification training
    /// reads the dataset directory itself.
    pub fn training_input(&self) -> &Path {
        match self.task {
            TaskMode::Classify => &self.root,
            TaskMode::Detect => &self.descriptor,
        }
    }
}

impl fmt::Display for SplitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total Data Num: {}, Train Data Num: {}, Val Data Num: {}",
            self.total, self.train, self.val
        )?;

        if !self.skipped.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped ({}):", self.skipped.len())?;
            for sample in &self.skipped {
                writeln!(f, "  - {}: {}", sample.path.display(), sample.reason)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "DataSet Split Complete. {}", self.descriptor.display())
    }
}

/// A sample dropped from the split, with the reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedSample {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedSample {
    pub(crate) fn from_error(path: &Path, err: &TrainerError) -> Self {
        let reason = match err {
            TrainerError::Conversion { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            path: path.to_path_buf(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_counts_and_skipped_samples() {
        let report = SplitReport {
            task: TaskMode::Detect,
            root: PathBuf::from("/data/ds"),
            descriptor: PathBuf::from("/data/ds/dataset.yaml"),
            total: 11,
            train: 8,
            val: 3,
            skipped: vec![SkippedSample {
                path: PathBuf::from("/src/a.json"),
                reason: "no companion image".to_string(),
            }],
        };

        let text = report.to_string();
        assert!(text.contains("Total Data Num: 11, Train Data Num: 8, Val Data Num: 3"));
        assert!(text.contains("Skipped (1):"));
        assert!(text.contains("no companion image"));
        assert_eq!(report.written(), 10);
        assert_eq!(report.training_input(), Path::new("/data/ds/dataset.yaml"));
    }

    #[test]
    fn classification_report_serializes_lowercase_task() {
        let report = SplitReport {
            task: TaskMode::Classify,
            root: PathBuf::from("/data/ds"),
            descriptor: PathBuf::from("/data/ds/dataset.yaml"),
            total: 4,
            train: 3,
            val: 1,
            skipped: Vec::new(),
        };

        let json = serde_json::to_value(&report).expect("serialize report");
        assert_eq!(json["task"], "classify");
        assert_eq!(report.training_input(), Path::new("/data/ds"));
    }
}
