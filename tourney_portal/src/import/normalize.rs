//! Text normalisation used when matching imported rows to participants.

/// Header key: lowercase ASCII alphanumerics only
///
/// `"First Name"`, `"first_name"` and `"FIRSTNAME"` all become `"firstname"`.
pub fn header_key(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Name key: lowercase, accents folded, everything but letters and digits removed
pub fn name_key(first_name: &str, last_name: &str) -> String {
    let mut key = String::with_capacity(first_name.len() + last_name.len());
    for c in first_name.chars().chain(last_name.chars()) {
        for lower in c.to_lowercase() {
            match fold_accent(lower) {
                Some(folded) => key.push_str(folded),
                None if lower.is_alphanumeric() => key.push(lower),
                None => {}
            }
        }
    }
    key
}

/// Email key: trimmed and lowercased, `None` when blank
pub fn email_key(email: &str) -> Option<String> {
    let email = email.trim();
    (!email.is_empty()).then(|| email.to_lowercase())
}

fn fold_accent(c: char) -> Option<&'static str> {
    Some(match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' => "i",
        'ł' | 'ľ' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'œ' => "oe",
        'ř' => "r",
        'ś' | 'š' | 'ş' => "s",
        'ß' => "ss",
        'ť' | 'ţ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_variants_collapse() {
        for header in ["First Name", "first_name", "FIRSTNAME", " first-name ", "\u{feff}First Name"] {
            assert_eq!(header_key(header), "firstname");
        }
    }

    #[test]
    fn test_name_key_folds_accents_and_punctuation() {
        assert_eq!(name_key("José", "Núñez"), "josenunez");
        assert_eq!(name_key("Mary-Ann", "O'Brien"), "maryannobrien");
        assert_eq!(name_key("  ANN ", "LEE"), name_key("ann", "lee"));
        assert_eq!(name_key("Jürgen", "Groß"), "jurgengross");
    }

    #[test]
    fn test_email_key() {
        assert_eq!(email_key("  Ann@Example.COM "), Some("ann@example.com".to_string()));
        assert_eq!(email_key("   "), None);
    }
}
