use regex::RegexBuilder;

/// Translate a glob pattern into an anchored regular expression.
///
/// `*` matches any run of characters (including none), `?` matches exactly
/// one. Every other character is escaped literally, so regex metacharacters
/// in registry or image names cannot change the match semantics.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(&ch.to_string())),
        }
    }
    out.push('$');
    out
}

/// Case-insensitive anchored glob match. Partial matches never succeed.
pub fn matches(pattern: &str, value: &str) -> bool {
    // The translated pattern only contains escaped literals plus `.`/`.*`,
    // so compilation cannot fail for any input glob.
    RegexBuilder::new(&glob_to_regex(pattern))
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

/// True if any pattern in the list matches. An empty list matches nothing;
/// call sites decide what that means (a deny list fails open, an allow list
/// is treated as not in effect).
pub fn matches_any(patterns: &[String], value: &str) -> bool {
    patterns.iter().any(|p| matches(p, value))
}
