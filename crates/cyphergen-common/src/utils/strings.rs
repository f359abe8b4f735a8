//! String casing helpers used to derive GraphQL root field names.

/// Uppercases the first character.
#[must_use]
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercases the first character.
#[must_use]
pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Default plural of a type name: `Movie` -> `movies`.
#[must_use]
pub fn default_plural(type_name: &str) -> String {
    let lower = lower_first(type_name);
    if lower.ends_with('s') {
        lower
    } else {
        format!("{lower}s")
    }
}

/// Returns `true` if `s` can be written in Cypher without backticks.
#[must_use]
pub fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_casing() {
        assert_eq!(upper_first("movies"), "Movies");
        assert_eq!(lower_first("Movie"), "movie");
        assert_eq!(upper_first(""), "");
    }

    #[test]
    fn test_default_plural() {
        assert_eq!(default_plural("Movie"), "movies");
        assert_eq!(default_plural("Series"), "series");
    }

    #[test]
    fn test_plain_identifier() {
        assert!(is_plain_identifier("this0"));
        assert!(is_plain_identifier("_id"));
        assert!(!is_plain_identifier("0this"));
        assert!(!is_plain_identifier("first-name"));
        assert!(!is_plain_identifier(""));
    }

    proptest::proptest! {
        #[test]
        fn plural_root_fields_round_trip_casing(name in "[A-Z][a-z]{0,12}") {
            let plural = default_plural(&name);
            proptest::prop_assert!(plural.ends_with('s'));
            proptest::prop_assert_eq!(upper_first(&lower_first(&name)), name);
            proptest::prop_assert!(is_plain_identifier(&plural));
        }
    }
}
