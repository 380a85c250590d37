//! Task descriptors - the normalized per-repository merge configuration.
//!
//! Raw --repos-data specs are colon-delimited strings with up to four
//! positional fields. The builder normalizes them into TaskDescriptors,
//! applies the run-wide defaults, and validates the whole set in one pass
//! so every violation is reported together.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::config::RunConfig;
use crate::error::{MergrError, Result};

/// Terminal state of one merge-task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishStatus {
    /// Task has not finished yet
    Pending,
    /// All steps ran and the merge applied
    Success,
    /// The task failed; finish_detail carries the error text
    Failure,
}

impl FinishStatus {
    pub fn is_failure(self) -> bool {
        self == FinishStatus::Failure
    }
}

impl fmt::Display for FinishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FinishStatus::Pending => "pending",
            FinishStatus::Success => "success",
            FinishStatus::Failure => "failure",
        };
        write!(f, "{}", s)
    }
}

/// Normalized configuration and recorded outcome of one repository's
/// merge-task.
///
/// Built by the descriptor builder before any task runs; the run-time fields
/// are filled in by the task executing it. Each descriptor is owned by
/// exactly one task, there is no cross-task sharing.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDescriptor {
    /// Name of the repo as it exists in the repos-dir
    pub repo_local_name: String,
    /// Branch/tag/commit merged into the dest branch
    pub source_ref: String,
    /// Branch updated from the source ref
    pub dest_branch: String,
    /// Remote project/namespace + repo name, exposed to scripts only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_qualifier: Option<String>,
    /// The original spec string, kept for diagnostics
    pub raw_spec: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_start: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_end: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_duration: Option<String>,
    pub finish_status: FinishStatus,
    pub finish_detail: String,
}

impl TaskDescriptor {
    /// Flat name -> value view of this descriptor plus the run directories.
    ///
    /// Both the merge-branch templater and the MGR_* script environment are
    /// built from this map, which keeps their field sets in lockstep.
    pub fn context_fields(&self, config: &RunConfig) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("repo_local_name".to_string(), self.repo_local_name.clone());
        fields.insert("source_ref".to_string(), self.source_ref.clone());
        fields.insert("dest_branch".to_string(), self.dest_branch.clone());
        fields.insert(
            "remote_qualifier".to_string(),
            self.remote_qualifier.clone().unwrap_or_default(),
        );
        fields.insert("raw_spec".to_string(), self.raw_spec.clone());
        fields.insert(
            "repos_dir".to_string(),
            config.repos_dir.display().to_string(),
        );
        fields.insert("logs_dir".to_string(), config.logs_dir.display().to_string());
        if let Some(repo_dir) = &self.repo_dir {
            fields.insert("repo_dir".to_string(), repo_dir.display().to_string());
        }
        if let Some(merge_branch) = &self.merge_branch {
            fields.insert("merge_branch".to_string(), merge_branch.clone());
        }
        if let Some(task_start) = self.task_start {
            fields.insert("task_start".to_string(), task_start.to_rfc3339());
        }
        fields
    }
}

/// Parse one --repos-data spec into a descriptor, applying the defaults.
///
/// Accepts 1 to 4 colon-delimited fields; trailing empty fields are
/// equivalent to omitted ones ('repo-a' == 'repo-a:' == 'repo-a:::').
/// An empty repo_local_name is kept and caught by the validation pass.
pub fn parse_spec(
    raw_spec: &str,
    default_source_ref: &str,
    default_dest_branch: &str,
) -> Result<TaskDescriptor> {
    let parts: Vec<&str> = raw_spec.split(':').collect();
    if parts.len() > 4 {
        return Err(MergrError::SpecFormat(raw_spec.to_string()));
    }

    let field = |i: usize| parts.get(i).map_or("", |s| s.trim());
    let or_default = |value: &str, default: &str| {
        if value.is_empty() {
            default.trim().to_string()
        } else {
            value.to_string()
        }
    };

    let remote_qualifier = field(3);
    Ok(TaskDescriptor {
        repo_local_name: field(0).to_string(),
        source_ref: or_default(field(1), default_source_ref),
        dest_branch: or_default(field(2), default_dest_branch),
        remote_qualifier: (!remote_qualifier.is_empty()).then(|| remote_qualifier.to_string()),
        raw_spec: raw_spec.to_string(),
        repo_dir: None,
        merge_branch: None,
        task_start: None,
        task_end: None,
        task_duration: None,
        finish_status: FinishStatus::Pending,
        finish_detail: String::new(),
    })
}

/// Check the whole descriptor set for completeness.
///
/// Every repo needs a local name, a resolved source ref and a resolved dest
/// branch, and local names must be unique. All violations are collected,
/// not just the first.
pub fn validate_descriptors(descriptors: &[TaskDescriptor]) -> Vec<String> {
    let mut violations = Vec::new();
    let mut names = Vec::new();

    for descriptor in descriptors {
        if descriptor.repo_local_name.is_empty() {
            violations.push(format!(
                "Missing repo-local-name in repo-data '{}'",
                descriptor.raw_spec
            ));
        } else {
            names.push(descriptor.repo_local_name.as_str());
        }
        if descriptor.source_ref.is_empty() {
            violations.push(format!(
                "Missing source-ref in or for repo-data '{}'",
                descriptor.raw_spec
            ));
        }
        if descriptor.dest_branch.is_empty() {
            violations.push(format!(
                "Missing dest-branch in or for repo-data '{}'",
                descriptor.raw_spec
            ));
        }
    }

    let mut unique = names.clone();
    unique.sort_unstable();
    unique.dedup();
    if unique.len() < names.len() {
        violations.push(format!(
            "Values of repo_local_name given in --repos-data are not unique. Values are: {:?}",
            names
        ));
    }

    violations
}

/// Build and validate all descriptors for a run.
///
/// Format errors and validation violations are collected across the whole
/// input and reported together as one Config error; no task starts when any
/// spec is bad.
pub fn build_descriptors(specs: &[String], config: &RunConfig) -> Result<Vec<TaskDescriptor>> {
    let mut descriptors = Vec::with_capacity(specs.len());
    let mut violations = Vec::new();

    for spec in specs {
        match parse_spec(spec, &config.default_source_ref, &config.default_dest_branch) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => violations.push(e.to_string()),
        }
    }
    violations.extend(validate_descriptors(&descriptors));

    if violations.is_empty() {
        Ok(descriptors)
    } else {
        Err(MergrError::Config(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config_with_defaults(source_ref: &str, dest_branch: &str) -> RunConfig {
        RunConfig {
            repos_dir: PathBuf::from("repos"),
            logs_dir: PathBuf::from("logs"),
            default_source_ref: source_ref.to_string(),
            default_dest_branch: dest_branch.to_string(),
            merge_options: String::new(),
            merge_branch_template: None,
            pre_script: None,
            post_script: None,
            local_only: true,
            jobs: 2,
        }
    }

    #[test]
    fn test_parse_spec_full_notation() {
        let d = parse_spec("repo-a:origin/master:my-feature:prj/repo-a-remote", "", "").unwrap();
        assert_eq!(d.repo_local_name, "repo-a");
        assert_eq!(d.source_ref, "origin/master");
        assert_eq!(d.dest_branch, "my-feature");
        assert_eq!(d.remote_qualifier.as_deref(), Some("prj/repo-a-remote"));
        assert_eq!(d.raw_spec, "repo-a:origin/master:my-feature:prj/repo-a-remote");
        assert_eq!(d.finish_status, FinishStatus::Pending);
    }

    #[test]
    fn test_parse_spec_omitted_and_empty_trailing_fields_are_equivalent() {
        for raw in ["repo-a", "repo-a:", "repo-a::", "repo-a:::"] {
            let d = parse_spec(raw, "default-source-ref", "default-dest-branch").unwrap();
            assert_eq!(d.repo_local_name, "repo-a", "spec {:?}", raw);
            assert_eq!(d.source_ref, "default-source-ref", "spec {:?}", raw);
            assert_eq!(d.dest_branch, "default-dest-branch", "spec {:?}", raw);
            assert_eq!(d.remote_qualifier, None, "spec {:?}", raw);
            assert_eq!(d.raw_spec, raw);
        }
    }

    #[test]
    fn test_parse_spec_partial_overrides() {
        let d = parse_spec("repo-c:my-source-ref:", "default-source-ref", "default-dest-branch").unwrap();
        assert_eq!(d.source_ref, "my-source-ref");
        assert_eq!(d.dest_branch, "default-dest-branch");

        let d = parse_spec("repo-d::my-dest-branch", "default-source-ref", "default-dest-branch").unwrap();
        assert_eq!(d.source_ref, "default-source-ref");
        assert_eq!(d.dest_branch, "my-dest-branch");
    }

    #[test]
    fn test_parse_spec_trims_whitespace() {
        let d = parse_spec(" repo-a : origin/main : dev ", "", "").unwrap();
        assert_eq!(d.repo_local_name, "repo-a");
        assert_eq!(d.source_ref, "origin/main");
        assert_eq!(d.dest_branch, "dev");
    }

    #[test]
    fn test_parse_spec_too_many_fields() {
        let err = parse_spec("a:b:c:d:e", "", "").unwrap_err();
        assert!(matches!(err, MergrError::SpecFormat(_)));
        assert!(err.to_string().contains("a:b:c:d:e"));
    }

    #[test]
    fn test_validate_complete_descriptor_has_no_violations() {
        let d = parse_spec("repo-a:source-ref:dest-branch", "", "").unwrap();
        assert!(validate_descriptors(&[d]).is_empty());
    }

    #[test]
    fn test_validate_collects_all_violations_per_descriptor() {
        // No source ref, no dest branch, no defaults: two messages, not one.
        let d = parse_spec("repo-a", "", "").unwrap();
        let violations = validate_descriptors(&[d]);
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("source-ref"));
        assert!(violations[1].contains("dest-branch"));
    }

    #[test]
    fn test_validate_missing_local_name() {
        let d = parse_spec(":source-ref:dest-branch", "", "").unwrap();
        let violations = validate_descriptors(&[d]);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("repo-local-name"));
    }

    #[test]
    fn test_validate_flags_duplicates_regardless_of_position() {
        let specs = ["repo-a", "repo-b", "repo-a"];
        let descriptors: Vec<_> = specs
            .iter()
            .map(|s| parse_spec(s, "source-ref", "dest-branch").unwrap())
            .collect();
        let violations = validate_descriptors(&descriptors);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("not unique"));
        assert!(violations[0].contains("repo-a"));
    }

    #[test]
    fn test_build_descriptors_applies_defaults() {
        // End-to-end scenario: 'repo-a::my-dest' with defaults main/develop.
        let config = config_with_defaults("main", "develop");
        let specs = vec!["repo-a::my-dest".to_string()];
        let descriptors = build_descriptors(&specs, &config).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].repo_local_name, "repo-a");
        assert_eq!(descriptors[0].source_ref, "main");
        assert_eq!(descriptors[0].dest_branch, "my-dest");
    }

    #[test]
    fn test_build_descriptors_collects_format_and_validation_errors() {
        let config = config_with_defaults("", "");
        let specs = vec!["a:b:c:d:e".to_string(), "repo-a".to_string()];
        let err = build_descriptors(&specs, &config).unwrap_err();
        match err {
            MergrError::Config(violations) => {
                // One format error plus missing source-ref and dest-branch.
                assert_eq!(violations.len(), 3);
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_build_descriptors_mixed_specs() {
        let config = config_with_defaults("default-source-ref", "default-dest-branch");
        let specs = vec![
            "repo-a".to_string(),
            "repo-b::".to_string(),
            "repo-c:my-source-ref:".to_string(),
            "repo-d::my-dest-branch".to_string(),
            "repo-e:my-source-ref:my-dest-branch".to_string(),
        ];
        let descriptors = build_descriptors(&specs, &config).unwrap();
        assert_eq!(descriptors.len(), 5);
        assert_eq!(descriptors[1].source_ref, "default-source-ref");
        assert_eq!(descriptors[2].source_ref, "my-source-ref");
        assert_eq!(descriptors[2].dest_branch, "default-dest-branch");
        assert_eq!(descriptors[3].dest_branch, "my-dest-branch");
        assert_eq!(descriptors[4].source_ref, "my-source-ref");
    }

    #[test]
    fn test_context_fields_covers_descriptor_and_run_dirs() {
        let config = config_with_defaults("main", "develop");
        let mut d = parse_spec("repo-a:::prj/repo-a", "main", "develop").unwrap();
        d.repo_dir = Some(Path::new("repos").join("repo-a"));
        d.merge_branch = Some("merge/main_into_develop".to_string());

        let fields = d.context_fields(&config);
        assert_eq!(fields["repo_local_name"], "repo-a");
        assert_eq!(fields["source_ref"], "main");
        assert_eq!(fields["dest_branch"], "develop");
        assert_eq!(fields["remote_qualifier"], "prj/repo-a");
        assert_eq!(fields["raw_spec"], "repo-a:::prj/repo-a");
        assert_eq!(fields["repos_dir"], "repos");
        assert_eq!(fields["logs_dir"], "logs");
        assert_eq!(fields["merge_branch"], "merge/main_into_develop");
        // task_start not set yet, so not exposed
        assert!(!fields.contains_key("task_start"));
    }

    #[test]
    fn test_descriptor_snapshot_serializes_without_unset_fields() {
        let d = parse_spec("repo-a:main:develop", "", "").unwrap();
        let json = serde_json::to_string_pretty(&d).unwrap();
        assert!(json.contains("\"repo_local_name\": \"repo-a\""));
        assert!(json.contains("\"finish_status\": \"pending\""));
        assert!(!json.contains("task_end"));
    }

    #[test]
    fn test_finish_status_display() {
        assert_eq!(FinishStatus::Pending.to_string(), "pending");
        assert_eq!(FinishStatus::Success.to_string(), "success");
        assert_eq!(FinishStatus::Failure.to_string(), "failure");
        assert!(FinishStatus::Failure.is_failure());
        assert!(!FinishStatus::Success.is_failure());
    }
}
