//! Caption text cleanup

use regex::Regex;
use std::sync::OnceLock;

fn tag_pattern() -> Option<&'static Regex> {
    static TAGS: OnceLock<Option<Regex>> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").ok()).as_ref()
}

/// Strip markup, decode the common HTML entities and collapse whitespace
pub fn clean_text(text: &str) -> String {
    let stripped = match tag_pattern() {
        Some(re) => re.replace_all(text, " ").into_owned(),
        None => text.to_string(),
    };

    // &amp; last so "&amp;lt;" decodes to "&lt;" and not "<"
    stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_cleaning() {
        let dirty_text = "  This\thas\n\rmultiple   spaces  ";
        assert_eq!(clean_text(dirty_text), "This has multiple spaces");
    }

    #[test]
    fn test_entities_and_tags() {
        assert_eq!(clean_text("<font color=\"#fff\">Tom &amp; Jerry</font>"), "Tom & Jerry");
        assert_eq!(clean_text("it&#39;s&nbsp;&quot;fine&quot;"), "it's \"fine\"");
        assert_eq!(clean_text("a &lt; b"), "a < b");
    }

    #[test]
    fn test_markup_only_becomes_empty() {
        assert_eq!(clean_text("<br/> &nbsp; "), "");
    }
}
