/// Truncate to at most `max` characters (not bytes); input is returned
/// unchanged when it already fits.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
