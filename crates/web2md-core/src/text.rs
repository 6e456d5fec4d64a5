//! Text utilities: whitespace normalization, Markdown escaping, wrapping and
//! the fence/backtick arithmetic shared by the element handlers.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_width::UnicodeWidthStr;

use crate::config::CodeBlockStyle;

/// Inline link or image constructs, `[text](target)` / `![alt](target)`.
static LINK_CONSTRUCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!?\[(?:\\.|[^\]\\])*\]\((?:<[^>]*>|(?:\\.|[^)\\])*)\)")
        .expect("link construct pattern is valid")
});

/// Collapse every run of whitespace into a single space.
pub fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_whitespace = false;

    for c in s.chars() {
        if c.is_whitespace() {
            if !prev_was_whitespace {
                result.push(' ');
                prev_was_whitespace = true;
            }
        } else {
            result.push(c);
            prev_was_whitespace = false;
        }
    }

    result
}

/// Normalize a text node: verbatim when `preserve_whitespace`, collapsed otherwise.
pub fn clean_text(text: &str, preserve_whitespace: bool) -> String {
    if preserve_whitespace {
        text.to_string()
    } else {
        collapse_whitespace(text)
    }
}

/// Escape markdown special characters.
///
/// Characters that are significant anywhere are always escaped. Block markers
/// (`-`, `+`, `1.`) are only escaped when they open the text, since that is the
/// only place they change meaning.
pub fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '#' | '|' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }

    escape_leading_marker(result)
}

fn escape_leading_marker(mut text: String) -> String {
    let offset = text.len() - text.trim_start().len();
    let rest = &text[offset..];

    let marker_at = match rest.as_bytes() {
        [b'-' | b'+'] | [b'-' | b'+', b' ', ..] => Some(offset),
        [b'0'..=b'9', ..] => {
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            match &rest.as_bytes()[digits..] {
                [b'.' | b')'] | [b'.' | b')', b' ', ..] => Some(offset + digits),
                _ => None,
            }
        }
        _ => None,
    };

    if let Some(at) = marker_at {
        text.insert(at, '\\');
    }
    text
}

/// Make rendered inline content safe for a single pipe-table cell.
pub fn escape_table_cell(cell: &str) -> String {
    let mut result = String::with_capacity(cell.len());
    let mut escaped = false;

    for c in cell.chars() {
        match c {
            '\n' | '\r' => {
                if !result.ends_with(' ') {
                    result.push(' ');
                }
            }
            '|' if !escaped => result.push_str("\\|"),
            _ => result.push(c),
        }
        escaped = c == '\\' && !escaped;
    }

    result.trim().to_string()
}

/// Terminal display width of a string.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Length of the longest run of `ch` in `text`.
pub fn longest_run(text: &str, ch: char) -> usize {
    text.chars()
        .fold((0, 0), |(max, current), c| {
            if c == ch {
                (max.max(current + 1), current + 1)
            } else {
                (max, 0)
            }
        })
        .0
}

/// Wrap code in an inline code span whose delimiter outlasts any backtick run inside it.
pub fn inline_code(code: &str) -> String {
    let code = code.replace(['\r', '\n'], " ");
    if code.is_empty() {
        return String::new();
    }

    let backticks = "`".repeat(longest_run(&code, '`') + 1);
    let needs_space = code.starts_with('`')
        || code.ends_with('`')
        || (code.starts_with(' ') && code.ends_with(' ') && !code.trim().is_empty());

    if needs_space {
        format!("{} {} {}", backticks, code, backticks)
    } else {
        format!("{}{}{}", backticks, code, backticks)
    }
}

/// Choose a fence that cannot be closed early by the code it wraps.
///
/// The fence is three characters of the configured style, lengthened to one
/// more than the longest run of that character inside `code`.
pub fn code_fence(code: &str, style: CodeBlockStyle) -> String {
    let ch = style.fence_char();
    let len = (longest_run(code, ch) + 1).max(3);
    std::iter::repeat(ch).take(len).collect()
}

/// Prefix every non-empty line of `text`; empty lines get `blank` instead.
pub fn prefix_lines(text: &str, prefix: &str, blank: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                blank.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap text to `width` columns at word boundaries. `0` disables wrapping.
///
/// Existing newlines are kept, hard breaks (two trailing spaces) survive, and
/// inline code spans and link/image constructs are never split.
pub fn wrap_text(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    text.split('\n')
        .map(|line| wrap_line(line, width))
        .collect::<Vec<_>>()
        .join("\n")
}

fn wrap_line(line: &str, width: usize) -> String {
    let hard_break = line.ends_with("  ");
    let body = if hard_break { line.trim_end() } else { line };
    if display_width(body) <= width {
        return line.to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for atom in split_atoms(body) {
        if current.is_empty() {
            current.push_str(atom);
        } else if display_width(&current) + 1 + display_width(atom) > width
            && !starts_block(atom)
        {
            lines.push(std::mem::take(&mut current));
            current.push_str(atom);
        } else {
            current.push(' ');
            current.push_str(atom);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if hard_break {
        if let Some(last) = lines.last_mut() {
            last.push_str("  ");
        }
    }

    lines.join("\n")
}

/// An atom that would turn into a block marker if it started a line.
fn starts_block(atom: &str) -> bool {
    if matches!(atom, "-" | "+" | "*" | "=" | "==" | "---") {
        return true;
    }
    let digits = atom.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && matches!(&atom[digits..], "." | ")")
}

/// Split a line into wrap atoms: whitespace separated, except inside protected constructs.
fn split_atoms(line: &str) -> Vec<&str> {
    let protected = protected_ranges(line);
    let is_protected = |pos: usize| protected.iter().any(|r| r.contains(&pos));

    let mut atoms = Vec::new();
    let mut start: Option<usize> = None;

    for (pos, c) in line.char_indices() {
        if c.is_whitespace() && !is_protected(pos) {
            if let Some(s) = start.take() {
                atoms.push(&line[s..pos]);
            }
        } else if start.is_none() {
            start = Some(pos);
        }
    }
    if let Some(s) = start {
        atoms.push(&line[s..]);
    }

    atoms
}

fn protected_ranges(line: &str) -> Vec<Range<usize>> {
    let mut ranges = code_span_ranges(line);
    ranges.extend(LINK_CONSTRUCT.find_iter(line).map(|m| m.range()));
    ranges
}

fn code_span_ranges(line: &str) -> Vec<Range<usize>> {
    let bytes = line.as_bytes();
    let mut ranges = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => {
                let start = i;
                while i < bytes.len() && bytes[i] == b'`' {
                    i += 1;
                }
                let run = i - start;

                let mut j = i;
                while j < bytes.len() {
                    if bytes[j] != b'`' {
                        j += 1;
                        continue;
                    }
                    let close = j;
                    while j < bytes.len() && bytes[j] == b'`' {
                        j += 1;
                    }
                    if j - close == run {
                        ranges.push(start..j);
                        i = j;
                        break;
                    }
                }
            }
            _ => i += 1,
        }
    }

    ranges
}

/// Apply the document-level blank line policy.
///
/// Unless `preserve_empty_lines` is set, leading blank lines are dropped, runs
/// of blank lines collapse to one and the document ends with a single newline.
/// Lines inside fenced code blocks are copied untouched.
pub fn normalize_blank_lines(markdown: &str, preserve_empty_lines: bool) -> String {
    if preserve_empty_lines {
        return markdown.to_string();
    }

    let mut out = String::with_capacity(markdown.len());
    let mut open_fence: Option<(char, usize)> = None;
    let mut pending_blank = false;

    for line in markdown.lines() {
        if let Some((ch, len)) = open_fence {
            out.push_str(line);
            out.push('\n');
            if closes_fence(line, ch, len) {
                open_fence = None;
            }
            continue;
        }

        if line.trim().is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }

        if pending_blank {
            out.push('\n');
            pending_blank = false;
        }
        out.push_str(line);
        out.push('\n');
        open_fence = opens_fence(line);
    }

    out
}

fn fence_body(line: &str) -> &str {
    line.trim_start_matches([' ', '>'])
}

fn opens_fence(line: &str) -> Option<(char, usize)> {
    let body = fence_body(line);
    let ch = body.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = body.chars().take_while(|c| *c == ch).count();
    // A backtick info string cannot contain backticks; such a line is an
    // inline code span.
    let info = &body[len * ch.len_utf8()..];
    if ch == '`' && info.contains('`') {
        return None;
    }
    (len >= 3).then_some((ch, len))
}

fn closes_fence(line: &str, ch: char, len: usize) -> bool {
    let body = fence_body(line);
    let run = body.chars().take_while(|c| *c == ch).count();
    run >= len && body[run * ch.len_utf8()..].trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a  \n\t b"), "a b");
        assert_eq!(collapse_whitespace("  lead"), " lead");
        assert_eq!(clean_text("a   b", true), "a   b");
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("*test*"), "\\*test\\*");
        assert_eq!(escape_markdown("_test_"), "\\_test\\_");
        assert_eq!(escape_markdown("[link]"), "\\[link\\]");
        assert_eq!(escape_markdown("normal"), "normal");
    }

    #[test]
    fn test_escape_plain_text_unchanged() {
        let plain = "Hello, world. It's 3 o'clock (roughly) and well-known!";
        assert_eq!(escape_markdown(plain), plain);
    }

    #[test]
    fn test_escape_leading_markers() {
        assert_eq!(escape_markdown("- item"), "\\- item");
        assert_eq!(escape_markdown("+"), "\\+");
        assert_eq!(escape_markdown("1984. A year"), "1984\\. A year");
        assert_eq!(escape_markdown("-x"), "-x");
        assert_eq!(escape_markdown("a - b"), "a - b");
        assert_eq!(escape_markdown("12.5 units"), "12.5 units");
    }

    #[test]
    fn test_escape_table_cell() {
        assert_eq!(escape_table_cell("a|b"), "a\\|b");
        assert_eq!(escape_table_cell("a\\|b"), "a\\|b");
        assert_eq!(escape_table_cell("one\ntwo"), "one two");
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(inline_code("code"), "`code`");
        assert_eq!(inline_code("a ` b"), "``a ` b``");
        assert_eq!(inline_code("`tick"), "`` `tick ``");
        assert_eq!(inline_code(""), "");
    }

    #[test]
    fn test_code_fence_escalates() {
        assert_eq!(code_fence("let x = 1;", CodeBlockStyle::Backtick), "```");
        assert_eq!(code_fence("```\nnested\n```", CodeBlockStyle::Backtick), "````");
        assert_eq!(code_fence("`````", CodeBlockStyle::Backtick), "``````");
        assert_eq!(code_fence("```", CodeBlockStyle::Tilde), "~~~");
    }

    #[test]
    fn test_display_width() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("日本"), 4);
    }

    #[test]
    fn test_wrap_text_disabled() {
        let text = "a very long line that would otherwise wrap";
        assert_eq!(wrap_text(text, 0), text);
    }

    #[test]
    fn test_wrap_text_word_boundaries() {
        let wrapped = wrap_text("one two three four five six", 10);
        assert_eq!(wrapped, "one two\nthree four\nfive six");
        assert!(wrapped.lines().all(|l| display_width(l) <= 10));
    }

    #[test]
    fn test_wrap_keeps_code_span_and_link_whole() {
        let wrapped = wrap_text("see `a b c d` and [the docs page](http://x.y/z w) now", 8);
        assert!(wrapped.lines().any(|l| l == "`a b c d`"));
        assert!(wrapped.lines().any(|l| l.contains("[the docs page](http://x.y/z w)")));
    }

    #[test]
    fn test_wrap_avoids_line_start_markers() {
        let wrapped = wrap_text("aaaa bbbb - cccc", 9);
        assert!(!wrapped.lines().any(|l| l.starts_with("- ")));
    }

    #[test]
    fn test_wrap_keeps_hard_breaks() {
        let wrapped = wrap_text("first line is long  \nsecond", 10);
        assert_eq!(wrapped, "first line\nis long  \nsecond");
    }

    #[test]
    fn test_prefix_lines() {
        assert_eq!(prefix_lines("a\n\nb", "> ", ">"), "> a\n>\n> b");
    }

    #[test]
    fn test_normalize_blank_lines() {
        let doc = "\n\n# Title\n\n\n\nText\n\n\n";
        assert_eq!(normalize_blank_lines(doc, false), "# Title\n\nText\n");
        assert_eq!(normalize_blank_lines(doc, true), doc);
    }

    #[test]
    fn test_normalize_keeps_fenced_blank_lines() {
        let doc = "```\na\n\n\n\nb\n```\n\n\n\nafter\n";
        assert_eq!(normalize_blank_lines(doc, false), "```\na\n\n\n\nb\n```\n\nafter\n");
    }

    #[test]
    fn test_normalize_code_span_is_not_a_fence() {
        let doc = "```a``b```\n\n```\nx\n\n\n\ny\n```\n\n\nz\n\n";
        assert_eq!(
            normalize_blank_lines(doc, false),
            "```a``b```\n\n```\nx\n\n\n\ny\n```\n\nz\n"
        );
        assert_eq!(opens_fence("```rust"), Some(('`', 3)));
        assert_eq!(opens_fence("~~~ a`b"), Some(('~', 3)));
        assert_eq!(opens_fence("```a``b```"), None);
    }
}
