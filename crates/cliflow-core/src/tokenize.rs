//! Shell-like splitting of the command line.
//!
//! Quotes group words and are stripped. Backslash escapes are kept verbatim
//! (the shell needs them when the token is inserted back) and make the next
//! character literal. A trailing empty token is always produced, so a line
//! ending in whitespace yields `""` as the in-progress token.

/// Split `input` into tokens; the last element is the token under the cursor.
///
/// # Examples
///
/// ```rust
/// use cliflow_core::tokenize::tokenize;
///
/// assert_eq!(tokenize("git commit -m \"wip fix\""), vec!["git", "commit", "-m", "wip fix"]);
/// assert_eq!(tokenize("ls "), vec!["ls", ""]);
/// assert_eq!(tokenize(""), vec![""]);
/// ```
#[must_use]
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }

        if c == '\\' && quote != Some('\'') {
            escaped = true;
            current.push(c);
            continue;
        }

        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == ' ' || c == '\t' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            },
            None => current.push(c),
        }
    }

    tokens.push(current);
    tokens
}

/// Remove backslash escapes (`my\ file` becomes `my file`).
#[must_use]
pub fn unescape(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
