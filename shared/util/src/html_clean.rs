use once_cell::sync::Lazy;
use regex::Regex;

const SEPARATORS: &[&str] = &[
    "___",
    "Confidentiality Notice:",
    "From:",
    "-----Original Message-----",
    "Warm regards,",
];

static BR_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Strips signatures, quoted history, and markup from an inbound
/// message body, leaving only the reply text proper.
///
/// Cuts the body at the first occurrence of any known
/// signature/footer marker, then at the `PREVIOUS CONVERSATION
/// HISTORY` banner, converts `<br>` to newlines, strips remaining
/// tags, unescapes entities, and trims blank lines from both ends.
pub fn clean_email_body(body: &str) -> String {
    if body.is_empty() {
        return String::new();
    }

    let mut text = body.to_string();
    for sep in SEPARATORS {
        if let Some(idx) = text.find(sep) {
            text.truncate(idx);
        }
    }

    if let Some(idx) = text.find("PREVIOUS CONVERSATION HISTORY") {
        text.truncate(idx);
    }

    let text = BR_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = unescape_entities(&text);

    let mut lines: Vec<&str> = text.trim().split('\n').map(|l| l.trim()).collect();
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}

/// Unescapes the small set of HTML entities that actually show up in
/// mail bodies. Not a general HTML-entity decoder.
fn unescape_entities(input: &str) -> String {
    input
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_signature_marker() {
        let body = "Thanks for the update.\nWarm regards,\nJohn Doe\nCEO";
        assert_eq!(clean_email_body(body), "Thanks for the update.");
    }

    #[test]
    fn strips_history_banner() {
        let body = "Sure, works for me.\nPREVIOUS CONVERSATION HISTORY\nOn Mon ... wrote:";
        assert_eq!(clean_email_body(body), "Sure, works for me.");
    }

    #[test]
    fn converts_br_and_strips_tags() {
        let body = "<p>Hello<br>World</p>";
        assert_eq!(clean_email_body(body), "Hello\nWorld");
    }

    #[test]
    fn unescapes_entities() {
        let body = "Tom &amp; Jerry &lt;ok&gt;";
        assert_eq!(clean_email_body(body), "Tom & Jerry <ok>");
    }

    #[test]
    fn empty_body_is_empty() {
        assert_eq!(clean_email_body(""), "");
    }
}
