//! Anchored glob matching for key patterns.
//!
//! Patterns support two metacharacters:
//!
//! - `*` matches any run of bytes, including the empty run
//! - `?` matches exactly one byte
//!
//! Every other byte matches itself. There are no character classes and no
//! escaping; a pattern always matches against the whole key, never a
//! substring. `"*"` therefore matches every key.

/// Returns true if `text` matches `pattern` in its entirety.
///
/// Matching is greedy on `*` with backtracking: when a literal run after a
/// `*` fails to match, the `*` re-expands by one byte and the run is retried.
///
/// # Example
///
/// ```
/// use jotdb_storage::glob_match;
///
/// assert!(glob_match("a*", "alpha"));
/// assert!(glob_match("_Event:*:abc", "_Event:c2V0:abc"));
/// assert!(!glob_match("a?c", "ac"));
/// ```
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();

    let mut pi = 0;
    let mut ti = 0;
    // Position to resume from when a literal run after the last `*` fails:
    // pattern index just past the `*`, and the text index it will consume to.
    let mut resume: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            resume = Some((pi + 1, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = resume {
            pi = star_pi;
            ti = star_ti + 1;
            resume = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    // Trailing `*`s match the empty run.
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_match() {
        assert!(glob_match("alpha", "alpha"));
        assert!(!glob_match("alpha", "alphab"));
        assert!(!glob_match("alphab", "alpha"));
    }

    #[test]
    fn star_matches_any_run() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("a*", "a"));
        assert!(glob_match("a*", "alpha"));
        assert!(glob_match("*a", "alpha"));
        assert!(glob_match("a*a", "alpha"));
        assert!(!glob_match("b*", "alpha"));
    }

    #[test]
    fn question_matches_exactly_one() {
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "ac"));
        assert!(!glob_match("a?c", "abbc"));
        assert!(!glob_match("?", ""));
    }

    #[test]
    fn star_backtracks() {
        assert!(glob_match("*:abc", "x:y:abc"));
        assert!(glob_match("a*b*c", "aXbYbZc"));
        assert!(!glob_match("a*b*c", "aXbY"));
    }

    #[test]
    fn anchored_not_substring() {
        assert!(!glob_match("pha", "alpha"));
        assert!(!glob_match("alp", "alpha"));
    }

    #[test]
    fn structured_key_patterns() {
        assert!(glob_match(
            "_MessageQueue:ZGVmYXVsdA:*",
            "_MessageQueue:ZGVmYXVsdA:0"
        ));
        assert!(!glob_match(
            "_MessageQueue:ZGVmYXVsdA:*",
            "_MessageQueue:ZGVmYXVsdA"
        ));
        assert!(glob_match("_Event:*:abc-123", "_Event:c2V0:abc-123"));
    }

    #[test]
    fn consecutive_stars() {
        assert!(glob_match("**", "x"));
        assert!(glob_match("a**b", "ab"));
        assert!(glob_match("a**b", "aXYb"));
    }

    #[test]
    fn no_escaping() {
        // A literal `*` in the text is matched by `*` or `?`, never by itself
        // being special in the text.
        assert!(glob_match("a?c", "a*c"));
        assert!(glob_match("a*c", "a*c"));
    }

    #[test]
    fn empty_pattern() {
        assert!(glob_match("", ""));
        assert!(!glob_match("", "a"));
    }
}
