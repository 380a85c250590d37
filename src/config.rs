//! Process-wide run configuration.
//!
//! A RunConfig is built once from the CLI, validated, and then shared
//! read-only (behind an Arc) across all concurrent merge-tasks.

use std::path::PathBuf;
use std::thread;

use crate::template;

/// Read-only configuration for one mergr run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory the repos reside in
    pub repos_dir: PathBuf,
    /// Directory the per-repo logfiles and the report are written to
    pub logs_dir: PathBuf,
    /// Default source ref for repos without one in their spec
    pub default_source_ref: String,
    /// Default dest branch for repos without one in their spec
    pub default_dest_branch: String,
    /// Extra options for the git merge command, as one string
    pub merge_options: String,
    /// Template for the merge-branch name; no merge-branch when absent
    pub merge_branch_template: Option<String>,
    /// Script run at the beginning of each merge-task
    pub pre_script: Option<String>,
    /// Script run at the end of each merge-task, regardless of the merge result
    pub post_script: Option<String>,
    /// Skip the remote-sync step (git pull)
    pub local_only: bool,
    /// Upper bound on concurrently running merge-tasks
    pub jobs: usize,
}

impl RunConfig {
    /// Default concurrency bound: one task per available core.
    pub fn default_jobs() -> usize {
        thread::available_parallelism().map_or(4, |n| n.get())
    }

    /// Check the parts of the configuration that can be rejected before any
    /// task starts. Returns all violations, not just the first.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if let Some(tmpl) = &self.merge_branch_template
            && let Err(e) = template::check(tmpl)
        {
            violations.push(e.to_string());
        }
        violations
    }
}
