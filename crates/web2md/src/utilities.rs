//! Tag classification tables used while building and walking the tree.

/// Block-level HTML elements
pub const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "audio", "blockquote", "body", "canvas",
    "center", "dd", "details", "dialog", "dir", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "frameset", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hgroup", "hr", "html", "li", "main", "menu",
    "nav", "noframes", "ol", "output", "p", "pre", "section", "summary",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul", "video",
];

/// Elements whose whole subtree never reaches the Markdown output
pub const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "meta", "link",
];

/// Check if a tag is a block-level element
pub fn is_block(tag: &str) -> bool {
    BLOCK_ELEMENTS.contains(&tag.to_lowercase().as_str())
}

/// Check if a tag is dropped during tree building
pub fn is_skipped(tag: &str) -> bool {
    SKIPPED_ELEMENTS.contains(&tag.to_lowercase().as_str())
}

/// Whether an inline `style` attribute hides the element
pub fn is_inline_hidden(style: &str) -> bool {
    style.split(';').any(|decl| {
        let mut parts = decl.splitn(2, ':');
        let property = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        property.eq_ignore_ascii_case("display")
            && value
                .split_whitespace()
                .next()
                .is_some_and(|v| v.eq_ignore_ascii_case("none"))
    })
}

/// Clean an attribute value (trim and handle empty)
pub fn clean_attribute(value: Option<&str>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_default()
}
