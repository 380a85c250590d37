//! CLI argument definitions using clap.

use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use crate::config::RunConfig;

/// mergr - concurrent Git merges across many repos sharing source/dest
/// branch names.
///
/// mergr does not clone the repos: you might want to post-process cloned
/// repos before merging, e.g. register merge drivers. Cloning belongs in
/// the --pre-script.
#[derive(Parser, Debug)]
#[command(name = "mergr")]
#[command(author, version, about)]
pub struct Cli {
    /// Repos and branches to process, as colon-delimited positional parts:
    /// repo_local_name[:source_ref[:dest_branch[:remote_qualifier]]].
    /// Delimiters of empty trailing parts can be omitted, so 'repo-a' means
    /// 'repo-a:::'. An omitted source-ref or dest-branch falls back to
    /// --default-source-ref or --default-dest-branch.
    #[arg(short = 'r', long = "repos-data", required = true, num_args = 1.., value_name = "SPEC")]
    pub repos_data: Vec<String>,

    /// Directory the repos reside in
    #[arg(short = 'd', long, value_name = "DIR")]
    pub repos_dir: PathBuf,

    /// Directory for the per-repo logfiles and the report
    #[arg(short = 'o', long, value_name = "DIR")]
    pub logs_dir: PathBuf,

    /// Default source ref for repos without one in their spec
    #[arg(short = 'S', long, default_value = "", value_name = "REF")]
    pub default_source_ref: String,

    /// Default dest branch for repos without one in their spec
    #[arg(short = 'D', long, default_value = "", value_name = "BRANCH")]
    pub default_dest_branch: String,

    /// Options for the git merge command, as one string, e.g.
    /// '--no-ff -Xrenormalize'. --no-edit is always set internally.
    #[arg(short = 'm', long, default_value = "", value_name = "OPTS")]
    pub merge_options: String,

    /// Create a merge-branch based on the dest branch and do the merge
    /// there. An existing merge-branch is reused, which allows continuing
    /// an interrupted run. Placeholders: {{field}} for any descriptor
    /// field (repo_local_name, source_ref, dest_branch, remote_qualifier,
    /// raw_spec, task_start), {{field|strip:prefix}} to drop a literal
    /// prefix, {{task_start|date:pattern}} for a strftime-formatted
    /// timestamp.
    #[arg(short = 't', long, value_name = "TEMPLATE")]
    pub merge_branch_template: Option<String>,

    /// Script run at the beginning of each merge-task, e.g. for cloning
    /// missing repos. Runs with one MGR_<FIELD> environment variable per
    /// descriptor field; use MGR_REPO_DIR for commands inside the repo.
    #[arg(long, value_name = "CMD")]
    pub pre_script: Option<String>,

    /// Script run at the end of each merge-task regardless of the merge
    /// result, e.g. to push the result or create a pull request. Same
    /// environment as --pre-script.
    #[arg(long, value_name = "CMD")]
    pub post_script: Option<String>,

    /// Skip the remote-sync step (git pull). Allows merging a source ref
    /// that exists only locally.
    #[arg(long)]
    pub local: bool,

    /// Upper bound on concurrently running merge-tasks; defaults to the
    /// number of available cores
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Log verbosity: off, error, warn, info, debug or trace
    #[arg(short = 'l', long, default_value = "info", value_name = "LEVEL")]
    pub log_level: LevelFilter,
}

impl Cli {
    /// Build the run-wide, read-only configuration.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            repos_dir: self.repos_dir.clone(),
            logs_dir: self.logs_dir.clone(),
            default_source_ref: self.default_source_ref.trim().to_string(),
            default_dest_branch: self.default_dest_branch.trim().to_string(),
            merge_options: self.merge_options.trim().to_string(),
            merge_branch_template: self.merge_branch_template.clone(),
            pre_script: self.pre_script.clone(),
            post_script: self.post_script.clone(),
            local_only: self.local,
            jobs: self.jobs.unwrap_or_else(RunConfig::default_jobs),
        }
    }
}
