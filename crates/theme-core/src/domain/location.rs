//! The guest page's navigable location encodes the active theme in its
//! `theme` query parameter, so a reload comes back with the same theme.

use url::Url;

/// Name of the query parameter that carries the theme id.
pub const THEME_PARAM: &str = "theme";

/// Returns the theme id encoded in `location`, if any.
///
/// When the parameter is repeated, the last occurrence wins.
pub fn theme_from_location(location: &Url) -> Option<String> {
    location
        .query_pairs()
        .filter(|(name, _)| name == THEME_PARAM)
        .last()
        .map(|(_, value)| value.into_owned())
}

/// Returns `location` with every `theme` parameter removed and a single
/// `theme=<theme_id>` appended.
///
/// All other query parameters keep their relative order; path and fragment
/// are untouched.
///
/// # Example
///
/// ```rust
/// use theme_core::with_theme;
/// use url::Url;
///
/// let current = Url::parse("https://localhost:7170/grid?theme=light&page=2").unwrap();
/// let next = with_theme(&current, "dark");
/// assert_eq!(next.as_str(), "https://localhost:7170/grid?page=2&theme=dark");
/// ```
pub fn with_theme(location: &Url, theme_id: &str) -> Url {
    let retained: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(name, _)| name != THEME_PARAM)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    let mut next = location.clone();
    next.query_pairs_mut()
        .clear()
        .extend_pairs(retained.iter().map(|(n, v)| (n.as_str(), v.as_str())))
        .append_pair(THEME_PARAM, theme_id);
    next
}

// ── Tests ─────────────────────────────────────────────────────────────────────
