//! Markup to plain text conversion.
//!
//! [`to_plain_text`] is a single forward scan over the markup that emits text spans
//! and decodes character references on the way. No tree is built, and malformed
//! input is never an error: whatever cannot be understood as a tag is either kept as
//! text or skipped.
//!
//! ```
//! use otp_forwarder::html::to_plain_text;
//!
//! assert_eq!(to_plain_text("<p>Your code: <b>654321</b></p>"), "Your code: 654321");
//! assert_eq!(to_plain_text("Fish &amp; Chips"), "Fish & Chips");
//! ```

use std::borrow::Cow;

/// Elements whose content is raw text that never reaches the reader.
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

/// Converts markup into the concatenation of its text nodes, in document order.
///
/// Tags, comments, declarations and processing instructions are removed.
/// `<script>` and `<style>` content is dropped. Character references (`&amp;`,
/// `&eacute;`, `&#54;`, `&#x36;`) are decoded against the full HTML5 entity set, and
/// unknown named references are kept as written.
/// Whitespace is left exactly as the source has it.
#[must_use]
pub fn to_plain_text(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut pos = 0;

    while pos < markup.len() {
        let rest = &markup[pos..];

        if rest.starts_with('<') {
            match scan_markup(markup, pos) {
                Markup::Skip(next) => pos = next,
                Markup::Literal => {
                    text.push('<');
                    pos += 1;
                }
                Markup::Unterminated => break,
            }
        } else if rest.starts_with('&') {
            match decode_reference(rest) {
                Some((decoded, consumed)) => {
                    text.push_str(&decoded);
                    pos += consumed;
                }
                None => {
                    text.push('&');
                    pos += 1;
                }
            }
        } else {
            let end = rest.find(['<', '&']).unwrap_or(rest.len());
            text.push_str(&rest[..end]);
            pos += end;
        }
    }

    text
}

/// What the scanner found at a `<`.
enum Markup {
    /// Non-text construct; continue scanning at the given byte offset.
    Skip(usize),
    /// Not a tag at all, the `<` is text.
    Literal,
    /// A construct that never closes before the end of input.
    Unterminated,
}

fn scan_markup(markup: &str, start: usize) -> Markup {
    let rest = &markup[start..];

    if rest.starts_with("<!--") {
        return match rest[4..].find("-->") {
            Some(end) => Markup::Skip(start + 4 + end + 3),
            None => Markup::Unterminated,
        };
    }

    let mut chars = rest[1..].chars();
    let first = chars.next();
    let second = chars.next();
    match first {
        Some('!' | '?') => match rest.find('>') {
            Some(end) => Markup::Skip(start + end + 1),
            None => Markup::Unterminated,
        },
        Some('/') if second.is_some_and(|c| c.is_ascii_alphabetic()) => {
            match find_tag_end(rest) {
                Some(end) => Markup::Skip(start + end),
                None => Markup::Unterminated,
            }
        }
        // `</>` and `</ p>` are bogus end tags, dropped up to the next `>`
        Some('/') if second.is_some() => match rest.find('>') {
            Some(end) => Markup::Skip(start + end + 1),
            None => Markup::Unterminated,
        },
        Some(c) if c.is_ascii_alphabetic() => {
            let Some(end) = find_tag_end(rest) else {
                return Markup::Unterminated;
            };
            let tag = &rest[..end];
            let name = tag_name(&tag[1..]);
            let self_closing = tag.trim_end_matches('>').trim_end().ends_with('/');

            match RAW_TEXT_ELEMENTS
                .iter()
                .find(|raw| raw.eq_ignore_ascii_case(name))
            {
                Some(raw) if !self_closing => skip_raw_text(markup, start + end, raw),
                _ => Markup::Skip(start + end),
            }
        }
        _ => Markup::Literal,
    }
}

/// Returns the offset just past the `>` that closes the tag starting `tag`.
///
/// Quoted attribute values may contain `>`. If the quotes never balance, the first
/// `>` wins instead.
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in tag.char_indices().skip(1) {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if q == c => quote = None,
            (None, '>') => return Some(i + 1),
            _ => {}
        }
    }
    tag.find('>').map(|i| i + 1)
}

fn tag_name(tag: &str) -> &str {
    let end = tag
        .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
        .unwrap_or(tag.len());
    &tag[..end]
}

/// Skips raw text up to and including the closing tag of `element`.
fn skip_raw_text(markup: &str, content_start: usize, element: &str) -> Markup {
    let closing = format!("</{element}");
    let Some(close) = find_ignore_ascii_case(&markup[content_start..], &closing) else {
        return Markup::Unterminated;
    };
    let close_start = content_start + close;
    match markup[close_start..].find('>') {
        Some(end) => Markup::Skip(close_start + end + 1),
        None => Markup::Unterminated,
    }
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Decodes the character reference at the start of `input` (which begins with `&`).
///
/// Returns the decoded text and the number of bytes consumed, or `None` when the
/// `&` does not start a reference. Named references that are not in the HTML5 set
/// come back unchanged.
fn decode_reference(input: &str) -> Option<(Cow<'_, str>, usize)> {
    let body = &input[1..];

    if let Some(numeric) = body.strip_prefix('#') {
        let (digits, radix, prefix_len) = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16, 3),
            None => (numeric, 10, 2),
        };
        let len = digits
            .find(|c: char| !c.is_digit(radix))
            .unwrap_or(digits.len());
        if len == 0 {
            return None;
        }
        let decoded = u32::from_str_radix(&digits[..len], radix)
            .ok()
            .filter(|&code| code != 0)
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        let terminated = digits[len..].starts_with(';');
        return Some((
            Cow::Owned(decoded.to_string()),
            prefix_len + len + usize::from(terminated),
        ));
    }

    let len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    if len == 0 {
        return None;
    }
    let end = 1 + len + usize::from(body[len..].starts_with(';'));
    Some((htmlize::unescape(&input[..end]), end))
}
