//! Command lines for external tools.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, PipeWriter};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::TrainerError;

/// A program plus its arguments, launched without any shell interpretation.
///
/// Tool invocations follow `<tool> <subcommand> [key=value ...]`; plain
/// arguments are available for tools with a conventional flag syntax.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a subcommand word. Alias of [`arg`](Self::arg) for readability.
    pub fn subcommand(self, name: &str) -> Self {
        self.arg(name)
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append a `key=value` argument.
    pub fn kv(mut self, key: &str, value: impl AsRef<OsStr>) -> Self {
        let mut pair = OsString::from(key);
        pair.push("=");
        pair.push(value.as_ref());
        self.args.push(pair);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Short program name for log lines and error messages.
    pub fn name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// A `std::process::Command` with stdin closed and stdout and stderr
    /// both writing into `output`.
    pub(crate) fn to_command(
        &self,
        working_dir: Option<&Path>,
        output: PipeWriter,
    ) -> io::Result<Command> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(output.try_clone()?)
            .stderr(output);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Check that an explicitly located tool exists.
///
/// Bare program names (no directory part) are left to `PATH` lookup at
/// launch time.
pub fn ensure_tool(what: &'static str, path: &Path) -> Result<(), TrainerError> {
    let has_dir = path
        .parent()
        .is_some_and(|parent| !parent.as_os_str().is_empty());
    if has_dir && !path.is_file() {
        return Err(TrainerError::not_found(what, path));
    }
    Ok(())
}
