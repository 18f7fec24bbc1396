//! Rich text (HTML fragment) to display text.
//!
//! Operation descriptions arrive as small HTML fragments. The terminal can only
//! show their text content: tags are dropped, entities decoded and runs of
//! whitespace collapsed to single spaces.

use scraper::Html;

/// Reduces an HTML fragment to a single line of display text.
pub fn to_plain(html: &str) -> String {
    if !html.contains(['<', '&']) {
        return collapse_whitespace(html);
    }

    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(to_plain("Building  project\n"), "Building project");
    }

    #[test]
    fn test_tags_are_stripped() {
        assert_eq!(
            to_plain(r#"Deploying <a href="/apps/3">web-app</a> to <b>prod</b>"#),
            "Deploying web-app to prod"
        );
    }

    #[test]
    fn test_entities_are_decoded() {
        assert_eq!(to_plain("a &amp; b &lt;c&gt;"), "a & b <c>");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(to_plain(""), "");
        assert_eq!(to_plain("<span></span>"), "");
    }
}
