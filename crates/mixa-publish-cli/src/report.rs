use mixa_publish_core::DiffResult;
use mixa_publish_sync::PublishReport;

pub const NOTHING_TO_UPLOAD: &str = "Nothing to upload";
pub const PUBLISHED: &str = "Changes are published to your site successfully";

/// One line per key: uploads, then deletions, then ignored keys.
pub fn render_diff(diff: &DiffResult) -> String {
    if diff.is_noop() {
        return NOTHING_TO_UPLOAD.to_string();
    }
    let lines: Vec<String> = diff
        .uploads
        .iter()
        .cloned()
        .chain(diff.deletions.iter().map(|key| format!("{} - deleted", key)))
        .chain(diff.ignored.iter().map(|key| format!("{} - ignored", key)))
        .collect();
    lines.join("\n")
}

pub fn render_report(report: &PublishReport) -> String {
    let diff = render_diff(&report.diff);
    match &report.applied {
        Some(applied) => format!(
            "{}\n\n{} uploaded, {} deleted\n{}",
            diff, applied.uploaded, applied.deleted, PUBLISHED
        ),
        None => diff,
    }
}
