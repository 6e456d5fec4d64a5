//! Pipe tables.

use async_trait::async_trait;
use web2md_core::{display_width, escape_table_cell};

use super::handler::ElementHandler;
use super::inline::render_inline;
use crate::context::ConversionContext;
use crate::node::Node;

/// Narrowest column; also the separator's minimum dash count.
const MIN_COLUMN_WIDTH: usize = 3;

/// Upper bound on `colspan` so a hostile value cannot blow up the grid.
const MAX_COLSPAN: usize = 1000;

/// `table` as a pipe table whose first row is the header.
///
/// Rows come from `thead`, `tbody`, `tfoot` and bare `tr` children in
/// document order. Short rows are padded with empty cells.
pub struct TableHandler;

#[async_trait]
impl ElementHandler for TableHandler {
    fn can_handle(&self, node: &Node) -> bool {
        node.is_tag(&["table"])
    }

    async fn handle(&self, node: &Node, ctx: &mut ConversionContext<'_>) -> String {
        let mut grid: Vec<Vec<String>> = Vec::new();
        for row in rows(node) {
            let mut cells = Vec::new();
            for cell in row.element_children().filter(|c| c.is_tag(&["td", "th"])) {
                let text = render_inline(cell, ctx).await;
                cells.push(escape_table_cell(&text));
                for _ in 1..colspan(cell) {
                    cells.push(String::new());
                }
            }
            grid.push(cells);
        }

        let columns = grid.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return String::new();
        }
        for row in &mut grid {
            row.resize(columns, String::new());
        }

        let mut widths = vec![MIN_COLUMN_WIDTH; columns];
        for row in &grid {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(display_width(cell));
            }
        }

        let mut out = String::new();
        for (index, row) in grid.iter().enumerate() {
            out.push_str(&format_row(row, &widths));
            if index == 0 {
                let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
                out.push_str(&format_row(&dashes, &widths));
            }
        }
        out.push('\n');
        out
    }
}

/// Table rows in document order, looking through row groups.
fn rows(table: &Node) -> Vec<&Node> {
    let mut rows = Vec::new();
    for child in table.element_children() {
        match child.tag_name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(child.children_named("tr")),
            _ => {}
        }
    }
    rows
}

fn colspan(cell: &Node) -> usize {
    cell.attr("colspan")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_COLSPAN)
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(display_width(cell));
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect();
    format!("| {} |\n", padded.join(" | "))
}
