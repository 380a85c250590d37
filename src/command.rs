//! External command execution with per-repo logging.
//!
//! Every Git invocation and user script runs through here. Commands run
//! via `sh -c`, stderr is folded into the captured output stream, and each
//! invocation is recorded in the task's logfile with its exit code and
//! duration.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use log::info;
use tokio::process::Command;

use crate::error::{MergrError, Result};

/// Append-only logfile for one repository's merge-task.
///
/// Logfiles are named deterministically from the repo-local-name; no two
/// tasks ever share one.
#[derive(Debug, Clone)]
pub struct TaskLog {
    path: PathBuf,
}

impl TaskLog {
    pub fn new(logs_dir: &Path, repo_local_name: &str) -> Self {
        Self {
            path: logs_dir.join(format!("repo--{}.log", repo_local_name)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// One external command to run, with its logging and failure policy.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    command: String,
    display: Option<String>,
    env: Vec<(String, String)>,
    honor_exit: bool,
    quiet: bool,
    output_on_error: bool,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            display: None,
            env: Vec::new(),
            honor_exit: true,
            quiet: false,
            output_on_error: true,
        }
    }

    /// Set a short display form for the process log; the logfile always
    /// records the full command line.
    pub fn display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Add environment variables on top of the inherited host environment.
    pub fn envs(mut self, vars: &[(String, String)]) -> Self {
        self.env.extend_from_slice(vars);
        self
    }

    /// Whether a non-zero exit code raises CommandFailed (default true).
    /// Callers opt out for probe commands and for the merge step itself.
    pub fn honor_exit(mut self, honor: bool) -> Self {
        self.honor_exit = honor;
        self
    }

    /// Suppress the captured output in the logfile record.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Whether a CommandFailed error carries the captured output. Scripts
    /// disable this so their whole output does not end up in the report.
    pub fn output_on_error(mut self, output_on_error: bool) -> Self {
        self.output_on_error = output_on_error;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

/// Result of one executed command.
#[derive(Debug)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// Captured stdout with stderr folded in
    pub output: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Execute one command, blocking only the calling task.
///
/// Writes `$ <command>` to the task log before execution and a record with
/// exit code, duration and captured output after it.
pub async fn run(spec: &CommandSpec, repo_local_name: &str, log: &TaskLog) -> Result<CommandOutput> {
    let display = spec.display.as_deref().unwrap_or(&spec.command);
    info!("{}: $ {}", repo_local_name, display);
    log.append(&format!("$ {}\n", spec.command))?;

    let started = Instant::now();
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&spec.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &spec.env {
        command.env(key, value);
    }
    let raw = command.output().await?;
    let duration = started.elapsed();

    let exit_code = raw.status.code().unwrap_or(-1);
    let mut output = String::from_utf8_lossy(&raw.stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&raw.stderr));

    let mut record = format!(
        "Returncode: {}; Duration: {}",
        exit_code,
        format_duration(duration)
    );
    if !spec.quiet {
        record.push_str(&format!("; Output:\n{}", output));
    }
    log.append(&format!("{}\n", record))?;

    if spec.honor_exit && exit_code != 0 {
        return Err(MergrError::CommandFailed {
            command: spec.command.clone(),
            code: exit_code,
            output: if spec.output_on_error {
                output
            } else {
                String::new()
            },
        });
    }

    Ok(CommandOutput {
        exit_code,
        output,
        duration,
    })
}

/// Format a duration as MM:SS.s; minutes may exceed 60.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs_f64();
    let minutes = (total_seconds / 60.0).floor() as u64;
    let seconds = total_seconds % 60.0;
    format!("{:02}:{:04.1}", minutes, seconds)
}
