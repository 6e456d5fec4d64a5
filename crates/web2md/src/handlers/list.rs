//! Ordered and unordered lists.

use async_trait::async_trait;
use web2md_core::wrap_text;

use super::handler::ElementHandler;
use super::inline::render_inline_node;
use crate::context::ConversionContext;
use crate::node::Node;
use crate::utilities::is_block;

const INDENT: &str = "  ";

/// `ul` and `ol`.
///
/// Markers start at column zero; the item holding a nested list indents it,
/// so each level sits two spaces further in. Items are separated by single
/// newlines and only the outermost list ends with a blank line.
pub struct ListHandler;

#[async_trait]
impl ElementHandler for ListHandler {
    fn can_handle(&self, node: &Node) -> bool {
        node.is_tag(&["ul", "ol"])
    }

    async fn handle(&self, node: &Node, ctx: &mut ConversionContext<'_>) -> String {
        let ordered = node.is_tag(&["ol"]);
        let depth = ctx.list_depth();

        let mut out = String::new();
        let mut scope = ctx.enter_list();

        let items = node.children_named("li").filter(|item| !item.is_hidden());
        for (index, item) in items.enumerate() {
            let marker = if ordered {
                format!("{}. ", index + 1)
            } else {
                "- ".to_string()
            };
            // Columns taken by enclosing items and the marker itself
            let offset = INDENT.len() * depth + marker.len();

            let rendered = render_item(item, &mut scope, offset).await;
            if rendered.lead.is_empty() {
                out.push_str(marker.trim_end());
            } else {
                out.push_str(&marker);
                out.push_str(&rendered.lead);
            }
            out.push('\n');
            for block in rendered.blocks {
                out.push_str(&block);
                out.push('\n');
            }
        }
        drop(scope);

        if out.is_empty() {
            return String::new();
        }
        if depth == 0 {
            out.push('\n');
        }
        out
    }
}

struct RenderedItem {
    /// Text on the marker line
    lead: String,
    /// Following blocks, one entry per block, indented under the marker
    blocks: Vec<String>,
}

async fn render_item(item: &Node, ctx: &mut ConversionContext<'_>, offset: usize) -> RenderedItem {
    let mut lead: Option<String> = None;
    let mut blocks: Vec<String> = Vec::new();
    let mut run = String::new();

    for child in item.children() {
        if child.is_hidden() {
            continue;
        }
        let nested_list = child.is_tag(&["ul", "ol"]);
        let dispatched = child.is_element()
            && (nested_list || is_block(child.tag_name()) || ctx.registry().claims(child));
        if !dispatched {
            run.push_str(&render_inline_node(child, ctx).await);
            continue;
        }

        flush_run(&mut run, &mut lead, &mut blocks, ctx, offset);
        let rendered = ctx.dispatch(child).await;
        let rendered = rendered.trim_matches('\n');
        if rendered.trim().is_empty() {
            continue;
        }

        if nested_list {
            lead.get_or_insert_with(String::new);
            blocks.push(indent_block(rendered, INDENT));
        } else if lead.is_none() {
            let (first, rest) = rendered.split_once('\n').unwrap_or((rendered, ""));
            lead = Some(first.to_string());
            if !rest.is_empty() {
                blocks.push(indent_block(rest, INDENT));
            }
        } else {
            blocks.push(indent_block(rendered, INDENT));
        }
    }
    flush_run(&mut run, &mut lead, &mut blocks, ctx, offset);

    RenderedItem {
        lead: lead.unwrap_or_default(),
        blocks,
    }
}

/// Turn pending inline content into the lead text or a following block.
fn flush_run(
    run: &mut String,
    lead: &mut Option<String>,
    blocks: &mut Vec<String>,
    ctx: &ConversionContext<'_>,
    offset: usize,
) {
    let text = std::mem::take(run);
    let text = text.trim();
    if text.is_empty() {
        return;
    }

    let config = ctx.config();
    let text = if config.preserve_whitespace {
        text.to_string()
    } else {
        text.lines().map(str::trim_start).collect::<Vec<_>>().join("\n")
    };
    let width = match config.line_width {
        0 => 0,
        w => w.saturating_sub(offset).max(1),
    };
    let text = wrap_text(&text, width);

    match lead {
        None => {
            let (first, rest) = text.split_once('\n').unwrap_or((text.as_str(), ""));
            *lead = Some(first.to_string());
            if !rest.is_empty() {
                blocks.push(indent_block(rest, INDENT));
            }
        }
        Some(_) => blocks.push(indent_block(&text, INDENT)),
    }
}

/// Indent every non-empty line of a block.
fn indent_block(text: &str, indent: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
