// Text Sanitizer
// Escapes markup-significant characters before any highlight markup exists

/// Line-break markup emitted for every `\n`, `\r\n` or lone `\r` in the source text.
pub const LINE_BREAK: &str = "<br />";

/// Escape `&`, `<`, `>`, `"` and `'` so the text can be embedded as HTML content
/// or inside an attribute value.
///
/// Works in a single pass over the input, so an ampersand produced by an
/// earlier replacement is never escaped a second time.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match escape_char(ch) {
            Some(entity) => out.push_str(entity),
            None => out.push(ch),
        }
    }
    out
}

pub(crate) fn escape_char(ch: char) -> Option<&'static str> {
    match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Sanitized text with line breaks converted to [`LINE_BREAK`].
///
/// Every source character becomes one token in `html` (a plain character, an
/// entity, or the line-break markup). `boundaries` records the byte offset
/// where each token starts plus the final length, so callers can reject a
/// match that would cut an entity or the line-break markup in half.
#[derive(Debug, Clone)]
pub struct DisplayText {
    html: String,
    boundaries: Vec<usize>,
}

impl DisplayText {
    pub fn new(text: &str) -> Self {
        let mut html = String::with_capacity(text.len() + text.len() / 8);
        let mut boundaries = Vec::with_capacity(text.len() + 1);
        let mut chars = text.chars().peekable();

        while let Some(ch) = chars.next() {
            boundaries.push(html.len());
            match ch {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    html.push_str(LINE_BREAK);
                }
                '\n' => html.push_str(LINE_BREAK),
                _ => match escape_char(ch) {
                    Some(entity) => html.push_str(entity),
                    None => html.push(ch),
                },
            }
        }
        boundaries.push(html.len());

        Self { html, boundaries }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    /// True when `offset` falls between two tokens (or at either end).
    pub fn is_boundary(&self, offset: usize) -> bool {
        self.boundaries.binary_search(&offset).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_escapes_markup() {
        assert_eq!(
            sanitize(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_sanitize_does_not_double_escape() {
        assert_eq!(sanitize("&lt;"), "&amp;lt;");
        assert_eq!(sanitize("a && b"), "a &amp;&amp; b");
    }

    #[test]
    fn test_sanitize_is_total() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("日本語のテキスト"), "日本語のテキスト");
        assert_eq!(sanitize("tab\tbell\u{7}nul\0"), "tab\tbell\u{7}nul\0");
    }

    #[test]
    fn test_sanitize_clean_text_unchanged() {
        let clean = "Plain sentence, with punctuation; nothing special.";
        assert_eq!(sanitize(clean), clean);
        assert_eq!(sanitize(&sanitize(clean)), clean);
        assert_eq!(sanitize(&sanitize("")), "");
    }

    #[test]
    fn test_display_text_converts_line_breaks() {
        let text = DisplayText::new("one\ntwo\r\nthree\rfour");
        assert_eq!(
            text.as_str(),
            "one<br />two<br />three<br />four"
        );
    }

    #[test]
    fn test_display_text_matches_sanitize_plus_breaks() {
        let raw = "a < b\n\"quoted\" & more\nend";
        let expected = sanitize(raw).replace('\n', LINE_BREAK);
        assert_eq!(DisplayText::new(raw).as_str(), expected);
    }

    #[test]
    fn test_display_text_boundaries() {
        let text = DisplayText::new("a&b\nc");
        // "a" "&amp;" "b" "<br />" "c"
        assert!(text.is_boundary(0));
        assert!(text.is_boundary(1));
        assert!(!text.is_boundary(2));
        assert!(text.is_boundary(6));
        assert!(text.is_boundary(7));
        assert!(!text.is_boundary(9));
        assert!(text.is_boundary(13));
        assert!(text.is_boundary(text.len()));
        assert!(!text.is_boundary(text.len() + 1));
    }

    #[test]
    fn test_display_text_multibyte_boundaries() {
        let text = DisplayText::new("é<");
        assert!(text.is_boundary(0));
        assert!(!text.is_boundary(1));
        assert!(text.is_boundary(2));
        assert!(text.is_boundary(6));
    }
}
