use once_cell::sync::Lazy;
use regex::Regex;

/// Matches a common salutation prefix at the start of a name, e.g.
/// `Mr.`, `Dr`, `Prof.`. Case-insensitive.
static PREFIX_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(Mr\.|Mr|Ms\.|Ms|Mrs\.|Mrs|Dr\.|Dr|Prof\.|Prof|Sir|Madam|Eng\.|Eng)\b\.?")
        .expect("static prefix pattern is valid")
});

/// Splits a contact's full name into `(prefix, last_name)` for the
/// `Dear {{prefix}} {{name}}` salutation.
///
/// `prefix` is `Some` only when a real honorific (`Mr.`, `Dr.`, ...) was
/// recognised at the start of the name, in which case the surname is
/// taken as the last whitespace/comma-separated token after it. When no
/// honorific is present, `prefix` is `None` — the caller decides how to
/// greet a contact with no stored or detected title (spec: the full
/// capitalized name, not a stand-in first-word "prefix").
pub fn extract_name_parts_with_prefix(full_name: &str) -> (Option<String>, String) {
    let full_name = full_name.trim();
    if full_name.is_empty() {
        return (None, String::new());
    }

    if let Some(m) = PREFIX_PATTERN.find(full_name) {
        let mut found_prefix = m.as_str().trim().to_string();
        let remainder = full_name[m.end()..].trim();

        let parts: Vec<&str> = if remainder.contains(',') {
            remainder.split(',').map(|s| s.trim()).collect()
        } else {
            remainder.split_whitespace().collect()
        };

        let last_name = parts.last().map(|s| s.to_string()).unwrap_or_else(|| remainder.to_string());

        if !found_prefix.ends_with('.') && found_prefix.len() <= 3 {
            found_prefix.push('.');
        }

        return (Some(found_prefix), last_name);
    }

    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [] => (None, String::new()),
        [only] => (None, only.to_string()),
        _ => (None, parts[parts.len() - 1].to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_dotted_prefix() {
        let (prefix, last) = extract_name_parts_with_prefix("Dr. Hatem Ayman");
        assert_eq!(prefix, Some("Dr.".to_string()));
        assert_eq!(last, "Ayman");
    }

    #[test]
    fn adds_missing_dot_to_short_prefix() {
        let (prefix, _) = extract_name_parts_with_prefix("Mr John Smith");
        assert_eq!(prefix, Some("Mr.".to_string()));
    }

    #[test]
    fn falls_back_to_last_word_without_prefix() {
        let (prefix, last) = extract_name_parts_with_prefix("Hatem Ayman");
        assert_eq!(prefix, None);
        assert_eq!(last, "Ayman");
    }

    #[test]
    fn handles_comma_separated_remainder() {
        let (prefix, last) = extract_name_parts_with_prefix("Prof. Ayman, Hatem");
        assert_eq!(prefix, Some("Prof.".to_string()));
        assert_eq!(last, "Hatem");
    }

    #[test]
    fn empty_input_returns_empty_parts() {
        assert_eq!(extract_name_parts_with_prefix("   "), (None, String::new()));
    }
}
