/// Render a diagnostic with a `label:line:column` header, the offending
/// source line and a caret under the reported column.
pub fn format_diagnostic(
    label: &str,
    source: &str,
    line: usize,
    column: usize,
    message: &str,
) -> String {
    let mut out = format!("{}:{}:{}: {}", label, line, column, message);
    if let Some(text) = source.lines().nth(line.saturating_sub(1)) {
        out.push('\n');
        out.push_str(&underline(text, column));
    }
    out
}

/// `line` followed by a caret under `column` (1-based).
fn underline(line: &str, column: usize) -> String {
    let mut marker = String::new();
    for _ in 1..column {
        marker.push(' ');
    }
    marker.push('^');
    format!("{}\n{}", line, marker)
}
