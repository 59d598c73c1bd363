/// Sanitize extracted text before it is stored and parsed.
///
/// Strips control characters other than newline and tab, normalizes CRLF and
/// lone CR to LF, and trims trailing whitespace on every line. Line structure
/// is kept: biomarker line numbers refer to the sanitized text.
pub fn sanitize_extracted_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

    let cleaned: String = normalized
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();

    let lines: Vec<&str> = cleaned.lines().map(str::trim_end).collect();
    lines.join("\n").trim_end_matches('\n').to_string()
}
