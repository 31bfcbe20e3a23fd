//! HTML → web-chat markup conversion.
//!
//! The business crates author texts in the bot platform's HTML subset
//! (`b, i, s, code, a`). The web-chat gateway speaks its own markdown
//! (`*bold*`, `_italic_`, `~strike~`, backtick code), so the adapter
//! converts at the boundary with a pure, table-driven transformer.
//! Already-converted input passes through unchanged (idempotent).

/// Paired tag → delimiter table.
const TAG_PAIRS: &[(&str, &str, &str)] = &[
    ("<b>", "</b>", "*"),
    ("<strong>", "</strong>", "*"),
    ("<i>", "</i>", "_"),
    ("<em>", "</em>", "_"),
    ("<s>", "</s>", "~"),
    ("<strike>", "</strike>", "~"),
    ("<del>", "</del>", "~"),
    ("<code>", "</code>", "`"),
    ("<pre>", "</pre>", "```"),
];

/// HTML entities restored after tag processing.
const ENTITIES: &[(&str, &str)] = &[
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#x27;", "'"),
    ("&amp;", "&"),
];

/// Converts the HTML subset to web-chat markup.
pub fn html_to_webchat(input: &str) -> String {
    let mut out = input.to_string();

    for (open, close, delimiter) in TAG_PAIRS {
        out = out.replace(open, delimiter).replace(close, delimiter);
    }

    // Links: keep the text, append the target in parentheses.
    out = convert_links(&out);

    // <br> variants become newlines.
    out = out.replace("<br>", "\n").replace("<br/>", "\n").replace("<br />", "\n");

    // Entities are unescaped last so "&amp;lt;" resolves in one pass.
    for (entity, plain) in ENTITIES {
        out = out.replace(entity, plain);
    }

    out
}

fn convert_links(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("<a href=\"") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 9..];
        let Some(href_end) = after.find('"') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let href = &after[..href_end];
        let after_href = &after[href_end + 1..];
        let Some(text_start) = after_href.find('>') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let after_open = &after_href[text_start + 1..];
        let Some(close) = after_open.find("</a>") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let text = &after_open[..close];
        out.push_str(&format!("{text} ({href})"));
        rest = &after_open[close + 4..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_italic_strike_code() {
        assert_eq!(html_to_webchat("<b>bold</b>"), "*bold*");
        assert_eq!(html_to_webchat("<i>it</i>"), "_it_");
        assert_eq!(html_to_webchat("<s>gone</s>"), "~gone~");
        assert_eq!(html_to_webchat("<code>x=1</code>"), "`x=1`");
    }

    #[test]
    fn test_mixed_text() {
        assert_eq!(
            html_to_webchat("<b>משלוח חדש!</b>\nמ: הרצל 5"),
            "*משלוח חדש!*\nמ: הרצל 5"
        );
    }

    #[test]
    fn test_links() {
        assert_eq!(
            html_to_webchat(r#"<a href="https://x.test/t/abc">לתפיסה</a>"#),
            "לתפיסה (https://x.test/t/abc)"
        );
    }

    #[test]
    fn test_entities_unescaped() {
        assert_eq!(html_to_webchat("a &amp; b &lt;c&gt;"), "a & b <c>");
    }

    #[test]
    fn test_idempotent_on_converted_input() {
        let samples = [
            "<b>שלום</b> &amp; <i>עולם</i>",
            "plain text",
            "*already* _converted_ ~input~",
            r#"<a href="https://x">t</a>"#,
        ];
        for sample in samples {
            let once = html_to_webchat(sample);
            assert_eq!(html_to_webchat(&once), once, "not idempotent for {sample}");
        }
    }

    #[test]
    fn test_br_to_newline() {
        assert_eq!(html_to_webchat("a<br>b<br/>c"), "a\nb\nc");
    }
}
