/// Device names Windows refuses as plain filenames
const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "LPT1", "LPT2", "LPT3",
];

/// Reduces a client supplied filename to a safe, flat ASCII name.
///
/// Non-ASCII characters are dropped, path separators and whitespace runs become
/// a single `_`, anything outside `[A-Za-z0-9_.-]` is removed and leading or
/// trailing `.`/`_` are stripped. The result may be empty.
pub fn sanitize_filename(filename: &str) -> String {
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components in uploaded filename: {}", filename);
    }

    let ascii: String = filename
        .chars()
        .filter(|c| c.is_ascii())
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    let sanitized: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let sanitized = sanitized.trim_matches(|c| c == '.' || c == '_').to_string();

    let stem = sanitized.split('.').next().unwrap_or("").to_uppercase();
    if WINDOWS_DEVICE_NAMES.contains(&stem.as_str()) {
        return format!("_{}", sanitized);
    }

    sanitized
}

/// Splits `name` into base and extension the way most path libraries do: the
/// extension starts at the last dot, unless that dot leads the name.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && !name[..idx].chars().all(|c| c == '.') => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Case-insensitive membership test against an allow-list of dotted extensions.
pub fn is_allowed_extension(extension: &str, allowed: &[String]) -> bool {
    !extension.is_empty()
        && allowed
            .iter()
            .any(|a| a.eq_ignore_ascii_case(extension))
}

/// Download segments must name one of the stems the tool is known to write.
pub fn is_known_stem(stem_filename: &str, known: &[String]) -> bool {
    known.iter().any(|k| k == stem_filename)
}
