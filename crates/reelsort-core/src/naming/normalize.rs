use regex::Regex;
use std::sync::LazyLock;

static YEAR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\((\d{4})\)\s*$").unwrap());

const STRIPPED: &[char] = &[
    ' ', '.', '-', '_', '\'', ':', '&', '*', ',', '!', '?', '(', ')', '[', ']',
];

/// Canonical grouping key for a title.
///
/// Drops a trailing `(YYYY)`, lowercases, and removes spaces and punctuation so
/// that `"For All Mankind (2019)"` and `"For.All.Mankind"` collide.
///
/// ```
/// use reelsort_core::naming::normalize_title;
///
/// assert_eq!(normalize_title("For All Mankind (2019)"), "forallmankind");
/// assert_eq!(normalize_title("M*A*S*H"), "mash");
/// ```
pub fn normalize_title(title: &str) -> String {
    let without_year = YEAR_SUFFIX.replace(title, "");
    without_year
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_variants_collide() {
        assert_eq!(normalize_title("Spider-Man: No Way Home"), "spidermannowayhome");
        assert_eq!(normalize_title("spider man no way home"), "spidermannowayhome");
        assert_eq!(normalize_title("Robots"), "robots");
    }

    #[test]
    fn test_only_trailing_year_is_dropped() {
        assert_eq!(normalize_title("Star Trek (2009) Remastered"), "startrek2009remastered");
    }
}
