//! Merge-branch name templating.
//!
//! A small interpreter over a closed placeholder grammar. Template text is
//! never evaluated as code; the only supported forms are
//!
//!   {{field}}                    descriptor field interpolation
//!   {{field|strip:<prefix>}}     remove a literal prefix if present
//!   {{task_start|date:<pattern>} strftime-format the task-start timestamp
//!
//! Transforms chain left to right ({{source_ref|strip:origin/|strip:rel/}}).
//! An unterminated '{{' is a structural error. An unrecognized field,
//! transform or date pattern leaves the placeholder verbatim in the output,
//! so a cosmetic naming mistake never aborts a merge.

use std::collections::BTreeMap;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};

use crate::error::{MergrError, Result};

/// Verify a template is structurally well-formed, without rendering it.
///
/// Used during configuration validation so a malformed template fails the
/// run before any task starts.
pub fn check(template: &str) -> Result<()> {
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => rest = &after[close + 2..],
            None => return Err(unterminated(template)),
        }
    }
    Ok(())
}

/// Render a template against a descriptor's context fields and its
/// task-start timestamp.
///
/// Pure and deterministic: identical inputs give identical output.
pub fn render(
    template: &str,
    fields: &BTreeMap<String, String>,
    task_start: DateTime<Local>,
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            return Err(unterminated(template));
        };
        let placeholder = &after[..close];
        match expand(placeholder, fields, task_start) {
            Some(value) => out.push_str(&value),
            None => {
                // Unrecognized field or transform: keep the placeholder.
                out.push_str("{{");
                out.push_str(placeholder);
                out.push_str("}}");
            }
        }
        rest = &after[close + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn unterminated(template: &str) -> MergrError {
    MergrError::Template(format!("unterminated '{{{{' in '{}'", template))
}

/// Expand one placeholder body, or None if any part of it is unrecognized.
fn expand(
    placeholder: &str,
    fields: &BTreeMap<String, String>,
    task_start: DateTime<Local>,
) -> Option<String> {
    let mut parts = placeholder.split('|');
    let name = parts.next()?.trim();
    let mut value = fields.get(name)?.clone();

    for transform in parts {
        let transform = transform.trim();
        if let Some(prefix) = transform.strip_prefix("strip:") {
            if let Some(stripped) = value.strip_prefix(prefix) {
                value = stripped.to_string();
            }
        } else if let Some(pattern) = transform.strip_prefix("date:") {
            // The date transform is defined on the task-start timestamp only.
            if name != "task_start" {
                return None;
            }
            value = format_timestamp(task_start, pattern)?;
        } else {
            return None;
        }
    }
    Some(value)
}

/// Strftime-format a timestamp, or None if the pattern is invalid.
fn format_timestamp(timestamp: DateTime<Local>, pattern: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    Some(timestamp.format_with_items(items.into_iter()).to_string())
}
