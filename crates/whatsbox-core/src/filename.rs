//! Filename sanitizing for user-supplied names.

const MAX_FILENAME_LENGTH: usize = 255;
const FALLBACK_NAME: &str = "unnamed_file";

/// Sanitize a client-supplied filename: strip path components and null
/// bytes, drop leading dots, truncate to 255 chars. Anything left empty
/// becomes `unnamed_file`.
pub fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|&c| c != '\0').collect();

    // Keep only the final path component, whichever separator style the
    // client used.
    let name = cleaned
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches('.');

    if name.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    name.chars().take(MAX_FILENAME_LENGTH).collect()
}
