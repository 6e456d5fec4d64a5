//! Headings, paragraphs, rules, blockquotes and transparent containers.

use async_trait::async_trait;
use web2md_core::{display_width, prefix_lines, HeadingStyle};

use super::handler::{BoxFuture, ElementHandler};
use super::inline::{finish_paragraph, render_inline, render_inline_node};
use crate::context::ConversionContext;
use crate::node::Node;
use crate::utilities::is_block;

/// Renders elements hidden by markup as nothing.
pub struct HiddenHandler;

#[async_trait]
impl ElementHandler for HiddenHandler {
    fn can_handle(&self, node: &Node) -> bool {
        node.is_hidden()
    }

    async fn handle(&self, _node: &Node, _ctx: &mut ConversionContext<'_>) -> String {
        String::new()
    }
}

/// `h1`-`h6` in atx or setext style.
pub struct HeadingHandler;

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

#[async_trait]
impl ElementHandler for HeadingHandler {
    fn can_handle(&self, node: &Node) -> bool {
        node.is_tag(HEADINGS)
    }

    async fn handle(&self, node: &Node, ctx: &mut ConversionContext<'_>) -> String {
        let level: usize = node.tag_name()[1..].parse().unwrap_or(1);
        let inline = render_inline(node, ctx).await;

        // Headings are single-line: hard breaks and newlines become spaces.
        let text = inline
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return String::new();
        }

        match ctx.config().heading_style {
            HeadingStyle::Setext if level <= 2 => {
                let underline = if level == 1 { '=' } else { '-' };
                let width = display_width(&text).max(1);
                format!("{}\n{}\n\n", text, underline.to_string().repeat(width))
            }
            _ => format!("{} {}\n\n", "#".repeat(level), text),
        }
    }
}

/// `p` elements.
pub struct ParagraphHandler;

#[async_trait]
impl ElementHandler for ParagraphHandler {
    fn can_handle(&self, node: &Node) -> bool {
        node.is_tag(&["p"])
    }

    async fn handle(&self, node: &Node, ctx: &mut ConversionContext<'_>) -> String {
        let inline = render_inline(node, ctx).await;
        finish_paragraph(&inline, ctx.config())
    }
}

/// `hr` as a thematic break.
pub struct HorizontalRuleHandler;

#[async_trait]
impl ElementHandler for HorizontalRuleHandler {
    fn can_handle(&self, node: &Node) -> bool {
        node.is_tag(&["hr"])
    }

    async fn handle(&self, _node: &Node, _ctx: &mut ConversionContext<'_>) -> String {
        "---\n\n".to_string()
    }
}

/// `blockquote`, prefixing every line of the rendered content.
pub struct BlockquoteHandler;

#[async_trait]
impl ElementHandler for BlockquoteHandler {
    fn can_handle(&self, node: &Node) -> bool {
        node.is_tag(&["blockquote"])
    }

    async fn handle(&self, node: &Node, ctx: &mut ConversionContext<'_>) -> String {
        let content = render_container(node, ctx).await;
        let content = content.trim_matches('\n');
        if content.trim().is_empty() {
            return String::new();
        }
        format!("{}\n\n", prefix_lines(content, "> ", "> "))
    }
}

/// Render a block container's children.
///
/// Runs of consecutive inline children become one paragraph; element
/// children that a handler claims, or that are block-level, are dispatched.
pub fn render_container<'a>(
    node: &'a Node,
    ctx: &'a mut ConversionContext<'_>,
) -> BoxFuture<'a, String> {
    Box::pin(async move {
        let mut out = String::new();
        let mut run = String::new();

        for child in node.children() {
            if child.is_hidden() {
                continue;
            }
            let dispatched =
                child.is_element() && (is_block(child.tag_name()) || ctx.registry().claims(child));

            if dispatched {
                out.push_str(&finish_paragraph(&run, ctx.config()));
                run.clear();
                out.push_str(&ctx.dispatch(child).await);
            } else {
                run.push_str(&render_inline_node(child, ctx).await);
            }
        }
        out.push_str(&finish_paragraph(&run, ctx.config()));

        out
    })
}
