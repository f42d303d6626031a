//! Scanner for Go-template actions in Helm files.
//!
//! Recognizes `{{ ... }}`, `{{- ... -}}` and keeps byte ranges. Inside an
//! action it respects `"..."` and `` `...` `` strings so `}}` in literals
//! don't terminate the action.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    /// Byte offset of `{{`.
    pub start: usize,
    /// Byte offset after `}}`.
    pub end: usize,
    /// First byte of the inner expression, after `{{-` and leading blanks.
    pub inner_start: usize,
    /// Byte offset of the closing `}}`.
    pub inner_end: usize,
}

impl Action {
    /// Inner expression without trim markers and surrounding whitespace.
    #[must_use]
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        let inner = src[self.inner_start..self.inner_end].trim_end();
        let inner = inner.strip_suffix('-').unwrap_or(inner);
        inner.trim()
    }

    /// `{{/* ... */}}` comment action.
    #[must_use]
    pub fn is_comment(&self, src: &str) -> bool {
        self.text(src).starts_with("/*")
    }

    /// Whether the action opens with `{{-`.
    #[must_use]
    pub fn trims_left(&self, src: &str) -> bool {
        src[self.start..].starts_with("{{-")
    }
}

#[must_use]
pub fn scan_actions(src: &str) -> Vec<Action> {
    let b = src.as_bytes();
    let mut i = 0;
    let mut out = Vec::new();
    while i + 1 < b.len() {
        if b[i] != b'{' || b[i + 1] != b'{' {
            i += 1;
            continue;
        }
        let start = i;
        i += 2;
        if i < b.len() && b[i] == b'-' {
            i += 1;
        }
        while i < b.len() && (b[i] == b' ' || b[i] == b'\t') {
            i += 1;
        }
        let inner_start = i;

        let mut dq = false;
        let mut bt = false;
        let mut esc = false;
        let mut closed = false;
        while i + 1 < b.len() {
            let c = b[i];
            if bt {
                bt = c != b'`';
            } else if dq {
                if esc {
                    esc = false;
                } else if c == b'\\' {
                    esc = true;
                } else if c == b'"' {
                    dq = false;
                }
            } else if c == b'`' {
                bt = true;
            } else if c == b'"' {
                dq = true;
            } else if c == b'}' && b[i + 1] == b'}' {
                out.push(Action {
                    start,
                    end: i + 2,
                    inner_start,
                    inner_end: i,
                });
                i += 2;
                closed = true;
                break;
            }
            i += 1;
        }
        if !closed {
            break;
        }
    }
    out
}
