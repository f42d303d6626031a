/// Characters that make a plain scalar ambiguous as a mapping key.
const SIGNIFICANT: &[char] = &[
    ':', '#', '[', ']', '{', '}', ',', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

/// Indicators that start a block entry or complex key when followed by a
/// blank.
const LEADING_INDICATORS: &[char] = &['-', '?'];

/// Whether a merge key value must be quoted to be used as a map key.
///
/// YAML keywords such as `true` or `null` are left plain.
#[must_use]
pub fn needs_quotes(value: &str) -> bool {
    if value.is_empty() || value.contains(SIGNIFICANT) || value.contains(char::is_control) {
        return true;
    }
    if value.trim() != value {
        return true;
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(first), None) => LEADING_INDICATORS.contains(&first),
        (Some(first), Some(second)) => LEADING_INDICATORS.contains(&first) && second.is_whitespace(),
        _ => false,
    }
}

/// Render a scalar as a map key, double-quoting it when needed.
#[must_use]
pub fn map_key(value: &str) -> String {
    if !needs_quotes(value) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Byte offset of a trailing `# comment` in a YAML line fragment, ignoring
/// `#` inside quotes or not preceded by whitespace.
#[must_use]
pub fn comment_start(text: &str) -> Option<usize> {
    let mut single = false;
    let mut double = false;
    let mut prev_ws = true;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if double {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                double = false;
            }
        } else if single {
            single = c != '\'';
        } else {
            match c {
                '"' if prev_ws => double = true,
                '\'' if prev_ws => single = true,
                '#' if prev_ws => return Some(i),
                _ => {}
            }
        }
        prev_ws = c.is_whitespace();
    }
    None
}
