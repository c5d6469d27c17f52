//! Selector parsing.
//!
//! Site profiles may use a `:has-text("...")` suffix on top of plain CSS,
//! e.g. `button:has-text("확인")`. Browsers do not understand it, so the
//! driver splits it into a CSS part and a text filter applied to the
//! candidates' rendered text.

/// A selector split into the part the browser evaluates and a text filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelector {
    pub css: String,
    pub text: Option<String>,
}

impl ParsedSelector {
    /// Whether `rendered` satisfies the text filter, if any.
    pub fn matches_text(&self, rendered: &str) -> bool {
        match &self.text {
            Some(needle) => rendered.contains(needle.as_str()),
            None => true,
        }
    }
}

const HAS_TEXT: &str = ":has-text(";

/// Parse a selector. Returns `None` when a `:has-text(` suffix is malformed.
pub fn parse(selector: &str) -> Option<ParsedSelector> {
    let selector = selector.trim();
    let Some(start) = selector.find(HAS_TEXT) else {
        return Some(ParsedSelector {
            css: selector.to_string(),
            text: None,
        });
    };

    let css = selector[..start].trim();
    let rest = selector[start + HAS_TEXT.len()..].trim();
    let inner = rest.strip_suffix(')')?.trim();
    let text = inner
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))?;

    Some(ParsedSelector {
        css: if css.is_empty() { "*".to_string() } else { css.to_string() },
        text: Some(text.to_string()),
    })
}

/// Escape a string for embedding in a single-quoted JS literal.
pub fn js_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_css() {
        let p = parse("input[name=\"loginId\"]").unwrap();
        assert_eq!(p.css, "input[name=\"loginId\"]");
        assert!(p.text.is_none());
        assert!(p.matches_text("anything"));
    }

    #[test]
    fn test_parse_has_text() {
        let p = parse("button:has-text(\"카카오로 1초 만에 시작하기\")").unwrap();
        assert_eq!(p.css, "button");
        assert_eq!(p.text.as_deref(), Some("카카오로 1초 만에 시작하기"));
        assert!(p.matches_text("  카카오로 1초 만에 시작하기 "));
        assert!(!p.matches_text("네이버"));
    }

    #[test]
    fn test_parse_has_text_without_tag() {
        let p = parse(":has-text('Continue')").unwrap();
        assert_eq!(p.css, "*");
        assert_eq!(p.text.as_deref(), Some("Continue"));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse("button:has-text(\"open").is_none());
        assert!(parse("button:has-text(open)").is_none());
    }

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("it's"), "it\\'s");
        assert_eq!(js_string("a\\b"), "a\\\\b");
    }
}
