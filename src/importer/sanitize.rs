//! Free-text names from source files.

/// Trim and collapse internal whitespace; `fallback` if nothing is left.
pub fn sanitize_name(raw: &str, fallback: &str) -> String {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("  D2O  contrast ", "D2O contrast" ; "trims and collapses")]
    #[test_case("Ni\t\nfilm", "Ni film" ; "tabs and newlines")]
    #[test_case("", "fallback" ; "empty")]
    #[test_case("   \t ", "fallback" ; "whitespace only")]
    #[test_case("Si", "Si" ; "already clean")]
    fn test_sanitize_name(raw: &str, expected: &str) {
        assert_eq!(sanitize_name(raw, "fallback"), expected);
    }
}
