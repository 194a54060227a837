/*!
 * Text layout primitives for subtitle lines.
 *
 * Widths are "equivalent widths": a weighted character count approximating
 * how much horizontal room a glyph takes with a proportional font, without
 * needing real font metrics.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::language_utils::is_cjk_char;

/// Weight of a CJK character
pub const CJK_WEIGHT: f64 = 1.0;
/// Weight of an ASCII character
pub const ASCII_WEIGHT: f64 = 0.6;
/// Weight of anything else (accented Latin, Cyrillic, ...)
pub const OTHER_WEIGHT: f64 = 0.8;

// Letters or digits split by a line break inside a word, e.g. "V\nS\nCode"
static SPLIT_WORD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9])\n+([A-Za-z0-9])").expect("split word regex is valid"));

pub fn char_width(c: char) -> f64 {
    if is_cjk_char(c) {
        CJK_WEIGHT
    } else if c.is_ascii() {
        ASCII_WEIGHT
    } else {
        OTHER_WEIGHT
    }
}

/// Equivalent width of a line of text
pub fn equivalent_width(text: &str) -> f64 {
    text.chars().map(char_width).sum()
}

/// Collapse a cue's text to one logical line.
///
/// Single-character fragments split by a line break are re-joined
/// ("M\nC\nP" becomes "MCP"); every other break becomes one space.
pub fn normalize_line(text: &str) -> String {
    let text = text.trim();
    if !text.contains('\n') {
        return collapse_spaces(text);
    }

    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let fragmented = lines.len() > 1 && lines.iter().all(|l| l.chars().count() <= 2);
    let joined = if fragmented {
        SPLIT_WORD_REGEX.replace_all(&lines.join("\n"), "$1$2").replace('\n', " ")
    } else {
        lines.join(" ")
    };
    collapse_spaces(&joined)
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Wrap a line so no physical line exceeds `max_width`.
///
/// Text with spaces breaks at word boundaries; text without spaces (CJK)
/// breaks between characters. A single word wider than `max_width` is
/// broken between characters as a last resort. Blank input yields no lines.
pub fn wrap(text: &str, max_width: f64) -> Vec<String> {
    let text = collapse_spaces(text);
    if text.is_empty() {
        return Vec::new();
    }
    if equivalent_width(&text) <= max_width {
        return vec![text];
    }

    if text.contains(' ') {
        wrap_words(&text, max_width)
    } else {
        wrap_chars(&text, max_width)
    }
}

fn wrap_words(text: &str, max_width: f64) -> Vec<String> {
    let space = char_width(' ');
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0;

    for word in text.split(' ') {
        let word_width = equivalent_width(word);

        if word_width > max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let mut pieces = wrap_chars(word, max_width);
            // The tail of an over-long word can share a line with what follows
            match pieces.pop() {
                Some(tail) => {
                    current_width = equivalent_width(&tail);
                    current = tail;
                }
                None => current_width = 0.0,
            }
            lines.extend(pieces);
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            current_width = word_width;
        } else if current_width + space + word_width <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += space + word_width;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
            current_width = word_width;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn wrap_chars(text: &str, max_width: f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0;

    for c in text.chars() {
        let w = char_width(c);
        // Always place at least one char per line, even if max_width is tiny
        if !current.is_empty() && current_width + w > max_width {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }
        current.push(c);
        current_width += w;
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
