/// Normalizes an email address for comparison: lowercases, strips
/// surrounding whitespace and angle brackets, and extracts the
/// address portion out of a `"Name <addr@example.com>"` display form.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    if email.is_empty() {
        return String::new();
    }

    if let (Some(start), Some(end)) = (email.find('<'), email.find('>')) {
        if start < end {
            return email[start + 1..end].trim().to_lowercase();
        }
    }

    email.trim_matches(|c| c == '<' || c == '>').trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_address_from_display_name_form() {
        assert_eq!(normalize_email("Jane Doe <Jane.Doe@Example.com>"), "jane.doe@example.com");
    }

    #[test]
    fn lowercases_plain_address() {
        assert_eq!(normalize_email("John@EXAMPLE.com"), "john@example.com");
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(normalize_email(""), "");
    }
}
