use unicode_width::UnicodeWidthChar;

pub fn char_display_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_display_width).sum()
}

/// Hard-wraps `text` at `width` display columns. Explicit newlines always
/// break; an empty input yields one empty line.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = vec![String::new()];
    let mut used = 0usize;
    for ch in text.chars() {
        match ch {
            '\r' => continue,
            '\n' => {
                lines.push(String::new());
                used = 0;
                continue;
            }
            _ => {}
        }
        let ch_width = char_display_width(ch);
        if used + ch_width > width && used > 0 {
            lines.push(String::new());
            used = 0;
        }
        if let Some(line) = lines.last_mut() {
            line.push(ch);
        }
        used += ch_width;
    }
    lines
}

/// Returns the longest prefix of `text` that fits in `max_width` columns and
/// whether anything was cut.
pub fn truncate_to_display_width(text: &str, max_width: usize) -> (String, bool) {
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = char_display_width(ch);
        if used + ch_width > max_width {
            return (out, true);
        }
        out.push(ch);
        used += ch_width;
    }
    (out, false)
}
