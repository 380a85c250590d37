//! Error types for mergr
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// All error types that can occur in mergr
#[derive(Debug, Error)]
pub enum MergrError {
    /// A repo spec given in --repos-data has the wrong shape
    #[error("Repo-data '{0}' has an unexpected format, expected 1 to 4 colon-delimited fields")]
    SpecFormat(String),

    /// Collected configuration violations, reported together before any task runs
    #[error("Invalid configuration:\n  {}", .0.join("\n  "))]
    Config(Vec<String>),

    /// The repo directory exists without Git metadata, or not at all.
    /// mergr does not clone; cloning belongs in a pre-script.
    #[error(
        "'{}' is not a Git repository. Repo '{repo}' is given in --repos-data but missing in the repos-dir",
        repo_dir.display()
    )]
    RepositoryMissing { repo: String, repo_dir: PathBuf },

    /// A Git or script invocation returned non-zero while its exit code was honored
    #[error("The following command exited with exit-code {code}:\n{command}\n{output}")]
    CommandFailed {
        command: String,
        code: i32,
        output: String,
    },

    /// The merge step itself failed, signalled after the post-script has run
    #[error("git merge in '{}' exited with exit-code {code}. Output: {output}", repo_dir.display())]
    MergeConflict {
        repo_dir: PathBuf,
        code: i32,
        output: String,
    },

    /// Structurally malformed merge-branch template
    #[error("Malformed merge-branch template: {0}")]
    Template(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for mergr operations
pub type Result<T> = std::result::Result<T, MergrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_format_error() {
        let err = MergrError::SpecFormat("a:b:c:d:e".to_string());
        assert_eq!(
            err.to_string(),
            "Repo-data 'a:b:c:d:e' has an unexpected format, expected 1 to 4 colon-delimited fields"
        );
    }

    #[test]
    fn test_config_error_joins_violations() {
        let err = MergrError::Config(vec!["first".to_string(), "second".to_string()]);
        let msg = err.to_string();
        assert!(msg.contains("first"));
        assert!(msg.contains("second"));
        assert!(msg.starts_with("Invalid configuration:"));
    }

    #[test]
    fn test_repository_missing_error() {
        let err = MergrError::RepositoryMissing {
            repo: "repo-a".to_string(),
            repo_dir: PathBuf::from("/repos/repo-a"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/repos/repo-a"));
        assert!(msg.contains("repo-a"));
        assert!(msg.contains("not a Git repository"));
    }

    #[test]
    fn test_command_failed_error() {
        let err = MergrError::CommandFailed {
            command: "git checkout develop".to_string(),
            code: 1,
            output: "error: pathspec 'develop' did not match".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exit-code 1"));
        assert!(msg.contains("git checkout develop"));
        assert!(msg.contains("pathspec"));
    }

    #[test]
    fn test_merge_conflict_error() {
        let err = MergrError::MergeConflict {
            repo_dir: PathBuf::from("/repos/repo-a"),
            code: 1,
            output: "CONFLICT (content): Merge conflict in a.txt".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("git merge"));
        assert!(msg.contains("CONFLICT"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MergrError = io_err.into();
        assert!(matches!(err, MergrError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: MergrError = json_err.into();
        assert!(matches!(err, MergrError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        assert!(returns_ok().is_ok());
    }
}
