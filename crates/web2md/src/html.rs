//! HTML decoding and parsing support.
//!
//! Bytes are decoded to text (honoring a declared charset), parsed with
//! `scraper`, and converted to the [`Node`] structure the handlers consume.

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use scraper::{ElementRef, Html, Node as ScraperNode, Selector};

use crate::error::{Error, Result};
use crate::node::Node;
use crate::utilities::is_skipped;

/// Containers that usually hold the main content, in order of preference.
const CONTENT_SELECTORS: &[&str] = &["main", "article", "[role=\"main\"]", "#content", ".content"];

static CONTENT: Lazy<Vec<Selector>> = Lazy::new(|| {
    CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

static BODY: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("body").ok());

/// `<meta charset=...>` or `<meta http-equiv content="...; charset=...">`.
static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#)
        .expect("meta charset pattern is valid")
});

/// How many leading bytes are searched for a `<meta>` charset declaration.
const META_PRESCAN_LEN: usize = 1024;

/// Decode a document to UTF-8 text.
///
/// Precedence: byte-order mark, `charset` from the `Content-Type` header,
/// `<meta>` declaration, then UTF-8. Binary content is rejected.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>, origin: &str) -> Result<String> {
    if let Some(mime) = content_type.and_then(|ct| ct.split(';').next()) {
        let mime = mime.trim().to_ascii_lowercase();
        let textual = mime.is_empty()
            || mime.starts_with("text/")
            || mime.contains("html")
            || mime.contains("xml");
        if !textual {
            return Err(Error::Parse {
                origin: origin.to_string(),
                reason: format!("content type `{}` is not HTML", mime),
            });
        }
    }
    if bytes.contains(&0) {
        return Err(Error::Parse {
            origin: origin.to_string(),
            reason: "input looks binary".to_string(),
        });
    }

    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .or_else(|| content_type.and_then(header_charset))
        .or_else(|| meta_charset(bytes))
        .unwrap_or(UTF_8);

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!(%origin, encoding = encoding.name(), "replaced malformed byte sequences");
    }
    Ok(text.into_owned())
}

fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| Encoding::for_label(value.trim().trim_matches('"').as_bytes()))
}

fn meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(META_PRESCAN_LEN)];
    let label = META_CHARSET.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

/// Parse a whole HTML string into a Node tree rooted at a document node.
///
/// Scripts, styles and other non-content subtrees are dropped.
///
/// # Example
///
/// ```rust
/// use web2md::parse_html;
///
/// let root = parse_html("<h1>Hello <em>World</em></h1>");
/// assert_eq!(root.text_content(), "Hello World");
/// ```
pub fn parse_html(html: &str) -> Node {
    let document = Html::parse_document(html);
    let mut root = Node::document();
    root.add_child(scraper_to_node(document.root_element()));
    root
}

/// Parse HTML and keep only the main content container.
///
/// The first match of `main`, `article`, `[role="main"]`, `#content` or
/// `.content` wins; otherwise `body`; otherwise the whole document.
pub fn extract_main_content(html: &str) -> Node {
    let document = Html::parse_document(html);

    let content = CONTENT
        .iter()
        .find_map(|selector| document.select(selector).next())
        .or_else(|| {
            BODY.as_ref()
                .and_then(|selector| document.select(selector).next())
        })
        .unwrap_or_else(|| document.root_element());

    tracing::debug!(root = content.value().name(), "selected content root");
    let mut root = Node::document();
    root.add_child(scraper_to_node(content));
    root
}

/// Convert a scraper ElementRef to our Node structure
fn scraper_to_node(element: ElementRef) -> Node {
    let tag = element.value().name();
    let attrs: Vec<(&str, &str)> = element.value().attrs().collect();
    let mut node = Node::element_with_attrs(tag, attrs);

    for child in element.children() {
        match child.value() {
            ScraperNode::Text(text) => {
                node.add_child(Node::text(&text.text));
            }
            ScraperNode::Element(el) if !is_skipped(el.name()) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    node.add_child(scraper_to_node(child_element));
                }
            }
            _ => {}
        }
    }

    node
}
