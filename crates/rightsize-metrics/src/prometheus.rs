//! Prometheus text exposition format.
//!
//! Renders the concurrency gauge for scraping by a Prometheus server or
//! compatible agent.

use crate::registry::GaugeRegistry;

/// Name of the exported concurrency gauge.
pub const CONCURRENCY_GAUGE: &str = "rightsize_function_concurrency";

/// Render the registry into Prometheus text format.
pub fn render_prometheus(registry: &GaugeRegistry) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "# HELP {CONCURRENCY_GAUGE} Reserved concurrency last applied to a function.\n"
    ));
    out.push_str(&format!("# TYPE {CONCURRENCY_GAUGE} gauge\n"));
    for (labels, value) in registry.snapshot() {
        out.push_str(&format!(
            "{CONCURRENCY_GAUGE}{{namespace=\"{}\",controller=\"{}\",function=\"{}\",queue=\"{}\"}} {}\n",
            escape_label(&labels.namespace),
            escape_label(&labels.controller),
            escape_label(&labels.function),
            escape_label(&labels.queue),
            value
        ));
    }

    out
}

/// Escape a label value per the exposition format (`\`, `"`, newline).
fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}
