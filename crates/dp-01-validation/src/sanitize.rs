//! Text sanitization and injection scanning.
//!
//! `sanitize` cleans free text without HTML-escaping it; escaping happens at
//! render time via `sanitize_for_html`, so stored context keeps raw values.

/// Trims, strips null bytes, and collapses whitespace runs to single spaces.
///
/// Idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(s: &str) -> String {
    let no_nulls: String = s.chars().filter(|c| *c != '\0').collect();
    no_nulls.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// HTML-escapes characters that are dangerous when echoed into markup.
pub fn sanitize_for_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// SQL patterns scanned case-insensitively.
const SQL_PATTERNS: &[&str] = &[
    "union select",
    "or 1=1",
    ";drop",
    "; drop",
    "drop table",
    "insert into",
    "delete from",
    "--",
];

/// XSS vectors scanned case-insensitively.
const XSS_PATTERNS: &[&str] = &[
    "<script",
    "</script",
    "javascript:",
    "onerror=",
    "onload=",
    "onclick=",
    "onmouseover=",
    "<iframe",
];

/// Scans for SQL and XSS injection patterns.
///
/// Returns `(is_safe, matched_pattern)`; `matched_pattern` is `None` when
/// the input is clean.
pub fn check_for_injection(s: &str) -> (bool, Option<&'static str>) {
    let lowered = s.to_lowercase();
    for pattern in SQL_PATTERNS.iter().chain(XSS_PATTERNS.iter()) {
        if lowered.contains(pattern) {
            return (false, Some(pattern));
        }
    }
    (true, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize("  hello   world \t x "), "hello world x");
        assert_eq!(sanitize("a\u{0}b"), "ab");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = ["  רחוב  הרצל   5 ", "a\u{0} b", "already clean"];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once);
        }
    }

    #[test]
    fn test_sanitize_does_not_escape_html() {
        assert_eq!(sanitize("a < b"), "a < b");
    }

    #[test]
    fn test_html_escaping() {
        assert_eq!(
            sanitize_for_html(r#"<b onclick="x">יוסי & בניו</b>"#),
            "&lt;b onclick=&quot;x&quot;&gt;יוסי &amp; בניו&lt;/b&gt;"
        );
    }

    #[test]
    fn test_injection_sql_patterns() {
        let (safe, pat) = check_for_injection("1 UNION SELECT password FROM users");
        assert!(!safe);
        assert_eq!(pat, Some("union select"));

        let (safe, _) = check_for_injection("x' OR 1=1");
        assert!(!safe);

        let (safe, pat) = check_for_injection("value; DROP TABLE users");
        assert!(!safe);
        assert!(pat.is_some());

        let (safe, pat) = check_for_injection("comment -- hidden");
        assert!(!safe);
        assert_eq!(pat, Some("--"));
    }

    #[test]
    fn test_injection_xss_patterns() {
        assert!(!check_for_injection("<SCRIPT>alert(1)</script>").0);
        assert!(!check_for_injection("javascript:void(0)").0);
        assert!(!check_for_injection("<img onerror=alert(1)>").0);
        assert!(!check_for_injection("<iframe src=x>").0);
    }

    #[test]
    fn test_clean_input_passes() {
        let (safe, pat) = check_for_injection("רחוב הרצל 5, תל אביב");
        assert!(safe);
        assert!(pat.is_none());
        assert!(check_for_injection("ordinary text with dash - inside").0);
    }
}
