//! Section identifiers derived from titles

/// Turn a heading into a stable section id.
///
/// Lowercases, drops everything that is not a word character, whitespace or
/// hyphen, turns whitespace runs into single hyphens, collapses repeated
/// hyphens and trims hyphens from both ends. Titles that differ only in case
/// or punctuation map to the same id.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
        } else if c.is_ascii_alphanumeric() || c == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_titles() {
        assert_eq!(slugify("Executive Summary"), "executive-summary");
        assert_eq!(slugify("1. Purpose & Scope"), "1-purpose-scope");
        assert_eq!(slugify("  Chain-of-Command  "), "chain-of-command");
        assert_eq!(slugify("Emergency  --  Contacts"), "emergency-contacts");
    }

    #[test]
    fn test_edge_hyphens_trimmed() {
        assert_eq!(slugify("--Evacuation--"), "evacuation");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_deterministic_and_collisions_expected() {
        assert_eq!(slugify("Fire Response"), slugify("Fire Response"));
        // Case and punctuation differences collide
        assert_eq!(slugify("Fire Response!"), slugify("fire response"));
    }

    #[test]
    fn test_non_ascii_letters_are_dropped() {
        assert_eq!(slugify("Évacuation Plan"), "vacuation-plan");
        assert_eq!(slugify("snake_case title"), "snake_case-title");
    }
}
