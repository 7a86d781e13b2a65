use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: char = '…';

/// Terminal columns occupied by `s`.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Collapse `content` onto one line and cut it to `max_width` columns.
///
/// Control characters are dropped and runs of whitespace (including
/// newlines) become a single space, so user-written text cannot break the
/// layout of a listing. A trailing `…` marks truncation.
pub fn one_line_preview(content: &str, max_width: usize) -> Cow<'_, str> {
    let clean = content
        .chars()
        .all(|c| c == ' ' || !(c.is_control() || c.is_whitespace()))
        && !content.contains("  ");
    if clean && display_width(content) <= max_width {
        return Cow::Borrowed(content);
    }

    let flattened = content.split_whitespace().collect::<Vec<_>>().join(" ");
    let flattened: String = flattened.chars().filter(|c| !c.is_control()).collect();
    if display_width(&flattened) <= max_width {
        return Cow::Owned(flattened);
    }
    if max_width == 0 {
        return Cow::Borrowed("");
    }

    let budget = max_width - 1;
    let mut width = 0;
    let mut out = String::with_capacity(flattened.len());
    for c in flattened.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + w > budget {
            break;
        }
        width += w;
        out.push(c);
    }
    out.push(ELLIPSIS);
    Cow::Owned(out)
}
