//! Pager continuation detection.

/// Finds pager markers (e.g. `--More--`) in decoded text.
///
/// Markers are matched literally. The last `longest_marker - 1` characters
/// of each chunk are kept, so a marker split across two chunks is seen when
/// the second half arrives, and a marker is never reported twice.
#[derive(Debug, Clone)]
pub struct PagerDetector {
    markers: Vec<String>,
    keep: usize,
    tail: String,
}

impl PagerDetector {
    /// Create a detector for the given markers. Empty markers are ignored.
    pub fn new<S: AsRef<str>>(markers: &[S]) -> Self {
        let markers: Vec<String> = markers
            .iter()
            .map(|m| m.as_ref().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        let keep = markers
            .iter()
            .map(|m| m.chars().count())
            .max()
            .unwrap_or(0)
            .saturating_sub(1);

        Self {
            markers,
            keep,
            tail: String::new(),
        }
    }

    /// Scan one chunk; true if a marker completes inside it.
    pub fn scan(&mut self, text: &str) -> bool {
        if self.markers.is_empty() {
            return false;
        }

        let carried = self.tail.len();
        let mut window = std::mem::take(&mut self.tail);
        window.push_str(text);

        // Only matches that end past the carried tail are new.
        let found = self.markers.iter().any(|marker| {
            window
                .match_indices(marker.as_str())
                .any(|(start, m)| start + m.len() > carried)
        });

        self.tail = last_chars(&window, self.keep).to_string();
        found
    }
}

/// The last `n` characters of `s`.
pub(crate) fn last_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
