//! Merge-task execution.
//!
//! One task runs the sequential steps for one repository:
//! pre-script, checkout of the dest branch, optional merge-branch setup,
//! the merge itself, post-script, finalization. A failure in any step skips
//! the remaining steps, but finalization always runs and the error never
//! crosses the task boundary; it is recorded in the descriptor instead.

use std::path::Path;

use chrono::Local;
use log::{info, warn};

use crate::command::{self, CommandOutput, CommandSpec, TaskLog, format_duration};
use crate::config::RunConfig;
use crate::descriptor::{FinishStatus, TaskDescriptor};
use crate::error::{MergrError, Result};
use crate::template;

/// Prefix for the descriptor fields exposed to pre-/post-scripts.
pub const ENV_PREFIX: &str = "MGR_";

/// What one task reports back to the orchestrator.
#[derive(Debug)]
pub struct TaskOutcome {
    pub repo_local_name: String,
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Run the full merge-task for one descriptor.
///
/// The descriptor is owned by this task for the duration of the run; its
/// run-time fields are filled in here. Errors are converted into the
/// descriptor's failure fields and the returned outcome.
pub async fn execute_merge(descriptor: &mut TaskDescriptor, config: &RunConfig) -> TaskOutcome {
    let task_start = Local::now();
    descriptor.task_start = Some(task_start);
    descriptor.repo_dir = Some(config.repos_dir.join(&descriptor.repo_local_name));
    let log = TaskLog::new(&config.logs_dir, &descriptor.repo_local_name);

    let result = run_steps(descriptor, config, &log).await;

    let task_end = Local::now();
    descriptor.task_end = Some(task_end);
    let duration = (task_end - task_start).to_std().unwrap_or_default();
    descriptor.task_duration = Some(format_duration(duration));

    let error = match result {
        Ok(()) => {
            descriptor.finish_status = FinishStatus::Success;
            None
        }
        Err(e) => {
            descriptor.finish_status = FinishStatus::Failure;
            descriptor.finish_detail = e.to_string();
            Some(descriptor.finish_detail.clone())
        }
    };

    let finish_msg = format!(
        "Merge-task for '{}' finished {}.",
        descriptor.repo_local_name,
        if error.is_none() { "successfully" } else { "with FAILURE" }
    );
    if error.is_none() {
        info!("{}", finish_msg);
    } else {
        warn!("{}", finish_msg);
    }
    if let Err(e) = finalize_log(descriptor, &log, &finish_msg) {
        warn!(
            "{}: could not write final logfile entries: {}",
            descriptor.repo_local_name, e
        );
    }

    TaskOutcome {
        repo_local_name: descriptor.repo_local_name.clone(),
        error,
    }
}

fn write_snapshot(descriptor: &TaskDescriptor, log: &TaskLog, label: &str) -> Result<()> {
    log.append(&format!(
        "Task descriptor at {}:\n{}\n",
        label,
        serde_json::to_string_pretty(descriptor)?
    ))
}

fn finalize_log(descriptor: &TaskDescriptor, log: &TaskLog, finish_msg: &str) -> Result<()> {
    log.append(&format!("{}\n", finish_msg))?;
    write_snapshot(descriptor, log, "task-end")
}

async fn run_steps(
    descriptor: &mut TaskDescriptor,
    config: &RunConfig,
    log: &TaskLog,
) -> Result<()> {
    if let Some(merge_branch_template) = &config.merge_branch_template {
        let fields = descriptor.context_fields(config);
        let task_start = descriptor.task_start.unwrap_or_else(Local::now);
        descriptor.merge_branch = Some(template::render(
            merge_branch_template,
            &fields,
            task_start,
        )?);
    }

    let start_msg = format!("Started merge-task for {}.", descriptor.repo_local_name);
    info!("{}", start_msg);
    log.append(&format!("{}\n", start_msg))?;
    write_snapshot(descriptor, log, "task-begin")?;

    let script_env = if config.pre_script.is_some() || config.post_script.is_some() {
        script_environment(descriptor, config)
    } else {
        Vec::new()
    };

    let repo_local_name = descriptor.repo_local_name.clone();

    if let Some(pre_script) = &config.pre_script {
        log.append("\nPRE-SCRIPT BEGIN >>>>>\n\n")?;
        // output_on_error=false: the logfile has the full script output
        // already, the error needs only command and exit code.
        let spec = CommandSpec::new(pre_script)
            .envs(&script_env)
            .output_on_error(false);
        command::run(&spec, &repo_local_name, log).await?;
        log.append(">>>>> PRE-SCRIPT END\n\n")?;
    }

    // The repo is expected to be present; mergr does not clone.
    let repo_dir = config.repos_dir.join(&repo_local_name);
    if !repo_dir.join(".git").is_dir() {
        return Err(MergrError::RepositoryMissing {
            repo: repo_local_name,
            repo_dir,
        });
    }

    run_git(&repo_dir, "reset --hard", &repo_local_name, log).await?;
    run_git(&repo_dir, "clean -fd", &repo_local_name, log).await?;
    run_git(
        &repo_dir,
        &format!("checkout {}", descriptor.dest_branch),
        &repo_local_name,
        log,
    )
    .await?;
    if !config.local_only {
        run_git(&repo_dir, "pull --ff", &repo_local_name, log).await?;
    }

    if let Some(merge_branch) = &descriptor.merge_branch {
        // quiet: the probe prints nothing useful, keep the logfile tidy.
        let probe = git_command(
            &repo_dir,
            &format!("show-ref --verify --quiet refs/heads/{}", merge_branch),
        )
        .honor_exit(false)
        .quiet(true);
        let probe_result = command::run(&probe, &repo_local_name, log).await?;
        if probe_result.success() {
            log.append("  (Merge-branch is present, reuse it)\n\n")?;
            run_git(
                &repo_dir,
                &format!("checkout {}", merge_branch),
                &repo_local_name,
                log,
            )
            .await?;
        } else {
            log.append("  (Merge-branch not present)\n\n")?;
            run_git(
                &repo_dir,
                &format!("checkout -b {}", merge_branch),
                &repo_local_name,
                log,
            )
            .await?;
        }
    }

    // On conflicts git merge exits with 1. The exit code is not honored
    // here so the post-script still runs; the verdict comes afterwards.
    let mut merge_args = String::from("merge --no-edit");
    if !config.merge_options.is_empty() {
        merge_args.push(' ');
        merge_args.push_str(&config.merge_options);
    }
    merge_args.push(' ');
    merge_args.push_str(&descriptor.source_ref);
    let merge_result = command::run(
        &git_command(&repo_dir, &merge_args).honor_exit(false),
        &repo_local_name,
        log,
    )
    .await?;

    if let Some(post_script) = &config.post_script {
        log.append("POST-SCRIPT BEGIN >>>>>\n\n")?;
        let spec = CommandSpec::new(post_script)
            .envs(&script_env)
            .output_on_error(false);
        command::run(&spec, &repo_local_name, log).await?;
        log.append(">>>>> POST-SCRIPT END\n\n")?;
    }

    if !merge_result.success() {
        return Err(MergrError::MergeConflict {
            repo_dir,
            code: merge_result.exit_code,
            output: merge_result.output,
        });
    }

    Ok(())
}

/// Build a git invocation running inside the repo, with the `-C <dir>` part
/// dropped from the display form.
fn git_command(repo_dir: &Path, args: &str) -> CommandSpec {
    CommandSpec::new(format!("git -C {} {}", repo_dir.display(), args))
        .display(format!("git {}", args))
}

async fn run_git(
    repo_dir: &Path,
    args: &str,
    repo_local_name: &str,
    log: &TaskLog,
) -> Result<CommandOutput> {
    command::run(&git_command(repo_dir, args), repo_local_name, log).await
}

/// Host environment extension handed to pre-/post-scripts: one MGR_<FIELD>
/// variable per descriptor context field.
fn script_environment(descriptor: &TaskDescriptor, config: &RunConfig) -> Vec<(String, String)> {
    descriptor
        .context_fields(config)
        .into_iter()
        .map(|(key, value)| (format!("{}{}", ENV_PREFIX, key.to_uppercase()), value))
        .collect()
}
