//! HTML status page.

use crate::status::StatusReport;

const STATUS_TEMPLATE: &str = include_str!("../templates/status.html");

/// Render the status page for `report`.
///
/// Fills `{{name}}` with the endpoint id and `{{count}}` with the value.
pub fn render_status_page(report: &StatusReport) -> String {
    render(
        STATUS_TEMPLATE,
        &report.endpoint_id,
        &report.value.to_string(),
    )
}

fn render(template: &str, name: &str, count: &str) -> String {
    template
        .replace("{{name}}", &escape_html(name))
        .replace("{{count}}", &escape_html(count))
}

/// Escape HTML special characters
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
