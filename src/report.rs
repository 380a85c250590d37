//! Run-level reporting.
//!
//! Pure functions from the final descriptor list to a console table, an
//! HTML report document and a one-line colored summary. Rows keep the
//! input order; optional fields that never got set render as '-'.

use colored::Colorize;

use crate::descriptor::TaskDescriptor;

const MISSING_FIELD: &str = "-";

const TEXT_HEADERS: [&str; 5] = [
    "repo_local_name",
    "source_ref SR, dest_branch DB",
    "task_duration",
    "finish_status",
    "finish_detail",
];

fn or_missing(value: &str) -> &str {
    if value.is_empty() { MISSING_FIELD } else { value }
}

fn text_row(descriptor: &TaskDescriptor) -> [String; 5] {
    [
        or_missing(&descriptor.repo_local_name).to_string(),
        format!(
            "SR: {}\nDB: {}",
            or_missing(&descriptor.source_ref),
            or_missing(&descriptor.dest_branch)
        ),
        descriptor
            .task_duration
            .clone()
            .unwrap_or_else(|| MISSING_FIELD.to_string()),
        descriptor.finish_status.to_string(),
        descriptor.finish_detail.clone(),
    ]
}

/// Render the console-facing grid table.
pub fn text_table(descriptors: &[TaskDescriptor]) -> String {
    let mut rows = vec![TEXT_HEADERS.map(String::from)];
    rows.extend(descriptors.iter().map(text_row));
    render_grid(&rows)
}

fn render_grid(rows: &[[String; 5]]) -> String {
    let mut widths = [0usize; 5];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            for line in cell.lines() {
                widths[i] = widths[i].max(line.chars().count());
            }
        }
    }

    let separator = format!(
        "+{}+\n",
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+")
    );

    let mut out = String::new();
    out.push_str(&separator);
    for row in rows {
        let height = row
            .iter()
            .map(|cell| cell.lines().count().max(1))
            .max()
            .unwrap_or(1);
        for line_index in 0..height {
            out.push('|');
            for (i, cell) in row.iter().enumerate() {
                let line = cell.lines().nth(line_index).unwrap_or("");
                out.push(' ');
                out.push_str(line);
                out.push_str(&" ".repeat(widths[i] - line.chars().count()));
                out.push_str(" |");
            }
            out.push('\n');
        }
        out.push_str(&separator);
    }
    out
}

/// Render the persisted report document.
pub fn html_table(descriptors: &[TaskDescriptor]) -> String {
    let mut out = String::from("<table>\n");
    out.push_str(
        "<tr><th>repo_local_name</th><th>finish_status</th><th>source_ref</th>\
         <th>dest_branch</th><th>task_duration</th><th>finish_detail</th></tr>\n",
    );
    for descriptor in descriptors {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(or_missing(&descriptor.repo_local_name)),
            descriptor.finish_status,
            escape(or_missing(&descriptor.source_ref)),
            escape(or_missing(&descriptor.dest_branch)),
            escape(descriptor.task_duration.as_deref().unwrap_or(MISSING_FIELD)),
            escape(&descriptor.finish_detail),
        ));
    }
    out.push_str("</table>\n");
    out
}

/// One colored line stating the run result.
pub fn summary_line(descriptors: &[TaskDescriptor]) -> String {
    let failures = descriptors
        .iter()
        .filter(|d| d.finish_status.is_failure())
        .count();
    if failures == 0 {
        format!("All {} merge-tasks finished successfully.", descriptors.len())
            .green()
            .to_string()
    } else {
        format!("{} of {} merge-tasks failed.", failures, descriptors.len())
            .red()
            .to_string()
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
