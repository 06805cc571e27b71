//! Shared naming and text helpers

// ============================================================================
// Typo suggestions for unresolved names
// ============================================================================

/// Levenshtein edit distance with a two-row table.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let n = b_chars.len();
    if a_chars.is_empty() {
        return n;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];
    for (i, ca) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

/// Closest candidate within `threshold` edits, if any.
pub fn find_similar_name<'a>(name: &str, candidates: &[&'a str], threshold: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (levenshtein_distance(name, c), c))
        .filter(|(d, _)| *d <= threshold)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c)
}

/// "did you mean" suffix for an unresolved-name message.
pub fn format_suggestion_hint(suggestion: Option<&str>) -> String {
    match suggestion {
        Some(name) => format!("; did you mean `{name}`?"),
        None => String::new(),
    }
}

// ============================================================================
// Generated-name helpers
// ============================================================================

/// `bank_account` → `BankAccount`
pub fn to_pascal_case(name: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = true;
    for c in name.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// `BankAccount` → `bank_account`
pub fn to_snake_case(name: &str) -> String {
    let mut result = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Map arbitrary text onto identifier characters: runs of anything that is
/// not `[A-Za-z0-9]` become a single `_`, with no leading or trailing `_`.
pub fn sanitize_ident(text: &str) -> String {
    let mut out = String::new();
    let mut pending_sep = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        out.push_str("expr");
    }
    out
}

/// A Rust string literal usable as an `assert!` format string.
pub fn format_str_literal(text: &str) -> String {
    let escaped = text
        .escape_debug()
        .to_string()
        .replace('{', "{{")
        .replace('}', "}}");
    format!("\"{escaped}\"")
}

/// A plain Rust string literal.
pub fn str_literal(text: &str) -> String {
    format!("\"{}\"", text.escape_debug())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_find_similar_name() {
        assert_eq!(find_similar_name("ad", &["add", "sub"], 2), Some("add"));
        assert_eq!(find_similar_name("zzzz", &["add", "sub"], 2), None);
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_pascal_case("geometry"), "Geometry");
        assert_eq!(to_pascal_case("bank_account"), "BankAccount");
        assert_eq!(to_snake_case("BankAccount"), "bank_account");
    }

    #[test]
    fn test_sanitize_ident() {
        assert_eq!(sanitize_ident("self.balance"), "self_balance");
        assert_eq!(sanitize_ident("len(self.items)"), "len_self_items");
        assert_eq!(sanitize_ident("xs[i]"), "xs_i");
        assert_eq!(sanitize_ident("..."), "expr");
    }

    #[test]
    fn test_format_str_literal_escapes_braces_and_quotes() {
        assert_eq!(format_str_literal("b != 0"), "\"b != 0\"");
        assert_eq!(format_str_literal("s == \"x\""), "\"s == \\\"x\\\"\"");
        assert_eq!(format_str_literal("{a}"), "\"{{a}}\"");
    }
}
