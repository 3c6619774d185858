//! Client file name sanitization.

use unicode_normalization::UnicodeNormalization;

/// Device names Windows refuses as file names regardless of extension.
const WINDOWS_DEVICE_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Reduce a client-supplied file name to a filesystem-safe form.
///
/// The name is NFKD-decomposed first so accented letters keep their base
/// letter (`café` becomes `cafe`). Path separators become word breaks,
/// whitespace runs become `_`, and only ASCII letters, digits, `_`, `.` and
/// `-` survive. Leading and trailing dots and underscores are trimmed, so
/// `../../etc/passwd` becomes `etc_passwd`. The result may be empty.
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = filtered.trim_matches(|c| c == '.' || c == '_');

    let stem = trimmed.split('.').next().unwrap_or("");
    if WINDOWS_DEVICE_NAMES
        .iter()
        .any(|device| stem.eq_ignore_ascii_case(device))
    {
        return format!("_{}", trimmed);
    }

    trimmed.to_string()
}
