//! Filesystem-safe identifier sanitizer.
//!
//! Used only by the editable-tree layer to name directories/files; the
//! result never round-trips into either binary format.

/// Maps `s` to a filesystem-safe token: each alphanumeric byte passes
/// through unchanged, everything else becomes `-`, and runs of consecutive
/// `-` collapse to one — whether the run came from substitution or was
/// already literally present in `s`.
pub fn to_id(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last = '-';
    for c in s.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '-' };
        if c == '-' && last == '-' {
            continue;
        }
        out.push(c);
        last = c;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs() {
        assert_eq!(to_id("a--b"), "a-b");
        assert_eq!(to_id("a  b"), "a-b");
        assert_eq!(to_id("a - -b"), "a-b");
    }

    #[test]
    fn leaves_alphanumerics() {
        assert_eq!(to_id("Hello123"), "Hello123");
    }

    #[test]
    fn idempotent() {
        for s in ["a--b", "foo/bar.txt", "日本語", "---", ""] {
            let once = to_id(s);
            let twice = to_id(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn only_alphanumeric_and_hyphen() {
        let id = to_id("Hello, World! v2.0");
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
        assert!(!id.contains("--"));
    }
}
