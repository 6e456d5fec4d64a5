//! Inline rendering path: text, emphasis, code spans, links and images.
//!
//! Headings, paragraphs, table cells and list items all flatten their content
//! through here.

use web2md_core::{clean_text, escape_markdown, inline_code, wrap_text, ConverterConfig};

use super::handler::BoxFuture;
use crate::context::ConversionContext;
use crate::node::{Node, NodeType};
use crate::utilities::{clean_attribute, is_block};

/// Render the children of `node` as one inline string.
pub fn render_inline<'a>(
    node: &'a Node,
    ctx: &'a mut ConversionContext<'_>,
) -> BoxFuture<'a, String> {
    Box::pin(async move {
        let mut out = String::new();
        for child in node.children() {
            let rendered = render_inline_node(child, ctx).await;
            if rendered.is_empty() {
                continue;
            }
            // Adjacent blocks flattened into one line need a separator.
            if child.is_element()
                && is_block(child.tag_name())
                && !out.is_empty()
                && !out.ends_with(char::is_whitespace)
            {
                out.push(' ');
            }
            out.push_str(&rendered);
        }
        out
    })
}

/// Render a single node in inline context.
pub fn render_inline_node<'a>(
    node: &'a Node,
    ctx: &'a mut ConversionContext<'_>,
) -> BoxFuture<'a, String> {
    Box::pin(async move {
        match node.node_type {
            NodeType::Text => render_text(node.value.as_deref().unwrap_or(""), ctx.config()),
            NodeType::Document => render_inline(node, ctx).await,
            NodeType::Element => render_element(node, ctx).await,
        }
    })
}

fn render_text(text: &str, config: &ConverterConfig) -> String {
    escape_markdown(&clean_text(text, config.preserve_whitespace))
}

async fn render_element(node: &Node, ctx: &mut ConversionContext<'_>) -> String {
    if node.is_hidden() {
        return String::new();
    }

    match node.tag_name() {
        "strong" | "b" => delimit(&render_inline(node, ctx).await, "**"),
        "em" | "i" => delimit(&render_inline(node, ctx).await, "*"),
        "del" | "s" | "strike" => delimit(&render_inline(node, ctx).await, "~~"),
        "code" | "kbd" | "samp" | "tt" => inline_code(&node.text_content()),
        "br" => "  \n".to_string(),
        "a" => render_link(node, ctx).await,
        "img" => render_image(node, ctx).await,
        _ => render_inline(node, ctx).await,
    }
}

/// Wrap content in a delimiter pair, keeping surrounding whitespace outside.
fn delimit(content: &str, delimiter: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return content.to_string();
    }
    let leading = &content[..content.len() - content.trim_start().len()];
    let trailing = &content[content.trim_end().len()..];
    format!("{}{}{}{}{}", leading, delimiter, trimmed, delimiter, trailing)
}

async fn render_link(node: &Node, ctx: &mut ConversionContext<'_>) -> String {
    let content = render_inline(node, ctx).await;
    let href = clean_attribute(node.attr("href"));
    if !ctx.config().include_links || href.is_empty() {
        return content;
    }

    let href = ctx.resolve_link(&href);
    let text = content.trim();
    let text = if text.is_empty() {
        escape_markdown(&href)
    } else {
        text.to_string()
    };

    let leading = &content[..content.len() - content.trim_start().len()];
    let trailing = if content.trim().is_empty() {
        ""
    } else {
        &content[content.trim_end().len()..]
    };
    let title = title_part(node);
    format!(
        "{}[{}]({}{}){}",
        leading,
        text,
        destination(&href),
        title,
        trailing
    )
}

async fn render_image(node: &Node, ctx: &mut ConversionContext<'_>) -> String {
    let src = clean_attribute(node.attr("src"));
    if src.is_empty() {
        return String::new();
    }
    let alt = escape_label(&clean_text(node.attr("alt").unwrap_or(""), false));
    let target = ctx.image_target(&src).await;
    format!("![{}]({}{})", alt.trim(), destination(&target), title_part(node))
}

/// `"title"` suffix for a link or image, or nothing.
fn title_part(node: &Node) -> String {
    let title = clean_text(&clean_attribute(node.attr("title")), false);
    if title.is_empty() {
        String::new()
    } else {
        format!(" \"{}\"", title.replace('"', "\\\""))
    }
}

/// Link destination, in angle brackets when it would not parse bare.
fn destination(target: &str) -> String {
    if target.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        format!("<{}>", target)
    } else {
        target.to_string()
    }
}

fn escape_label(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Turn assembled inline content into a paragraph block.
///
/// Returns an empty string when there is no visible content; otherwise the
/// text, wrapped to `line_width`, followed by one blank line.
pub fn finish_paragraph(inline: &str, config: &ConverterConfig) -> String {
    let text = inline.trim_matches(|c: char| c.is_whitespace() && c != '\u{a0}');
    if text.is_empty() {
        return String::new();
    }

    let text = if config.preserve_whitespace {
        text.to_string()
    } else {
        text.lines()
            .map(str::trim_start)
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!("{}\n\n", wrap_text(&text, config.line_width))
}
