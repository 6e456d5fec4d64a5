//! Element handlers and the ordered registry that dispatches to them.

mod block;
mod code;
mod handler;
mod inline;
mod list;
mod table;

pub use block::{
    render_container, BlockquoteHandler, HeadingHandler, HiddenHandler, HorizontalRuleHandler,
    ParagraphHandler,
};
pub use code::CodeBlockHandler;
pub use handler::{BoxFuture, ElementHandler};
pub use inline::{finish_paragraph, render_inline, render_inline_node};
pub use list::ListHandler;
pub use table::TableHandler;

use indexmap::IndexMap;
use tracing::trace;

use crate::context::ConversionContext;
use crate::node::{Node, NodeType};
use crate::utilities::is_block;

/// Ordered collection of named handlers.
///
/// Handlers are tried in registration order and the first whose
/// `can_handle` accepts a node renders it. Nodes nobody claims go to a
/// fallback that is not part of the list and always runs last: text and
/// inline elements render through the inline path, block containers render
/// their children with [`render_container`].
///
/// Specific handlers must precede general ones. [`HandlerRegistry::register`]
/// appends, so a handler that needs to win over a built-in is added with
/// [`HandlerRegistry::register_before`].
pub struct HandlerRegistry {
    handlers: IndexMap<String, Box<dyn ElementHandler>>,
}

impl HandlerRegistry {
    /// Create a registry holding the built-in handlers
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("hidden", HiddenHandler);
        registry.register("code_block", CodeBlockHandler);
        registry.register("table", TableHandler);
        registry.register("heading", HeadingHandler);
        registry.register("list", ListHandler);
        registry.register("blockquote", BlockquoteHandler);
        registry.register("horizontal_rule", HorizontalRuleHandler);
        registry.register("paragraph", ParagraphHandler);
        registry
    }

    /// Create a registry with no handlers; everything goes to the fallback
    pub fn empty() -> Self {
        Self {
            handlers: IndexMap::new(),
        }
    }

    /// Append a handler. A handler already registered under `name` is
    /// replaced and keeps its position.
    pub fn register<H>(&mut self, name: &str, handler: H) -> &mut Self
    where
        H: ElementHandler + 'static,
    {
        self.handlers.insert(name.to_string(), Box::new(handler));
        self
    }

    /// Insert a handler directly ahead of `anchor`.
    ///
    /// Returns `false` and leaves the registry unchanged when `anchor` is
    /// not registered.
    pub fn register_before<H>(&mut self, anchor: &str, name: &str, handler: H) -> bool
    where
        H: ElementHandler + 'static,
    {
        if name != anchor {
            self.handlers.shift_remove(name);
        }
        let Some(index) = self.handlers.get_index_of(anchor) else {
            return false;
        };
        if name == anchor {
            self.handlers.insert(name.to_string(), Box::new(handler));
        } else {
            self.handlers
                .shift_insert(index, name.to_string(), Box::new(handler));
        }
        true
    }

    /// Remove a handler by name
    pub fn remove(&mut self, name: &str) -> bool {
        self.handlers.shift_remove(name).is_some()
    }

    /// Handler names in precedence order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// First handler claiming `node`
    pub fn find(&self, node: &Node) -> Option<(&str, &dyn ElementHandler)> {
        self.handlers
            .iter()
            .find(|(_, handler)| handler.can_handle(node))
            .map(|(name, handler)| (name.as_str(), handler.as_ref()))
    }

    /// Whether any registered handler claims `node`
    pub fn claims(&self, node: &Node) -> bool {
        self.handlers.values().any(|handler| handler.can_handle(node))
    }

    /// Render `node` with the first claiming handler, or the fallback.
    pub fn dispatch<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a mut ConversionContext<'_>,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            match self.find(node) {
                Some((name, handler)) => {
                    trace!(tag = node.tag_name(), handler = name, "dispatch");
                    handler.handle(node, ctx).await
                }
                None => fallback(node, ctx).await,
            }
        })
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Treat an unclaimed node as a transparent wrapper.
async fn fallback(node: &Node, ctx: &mut ConversionContext<'_>) -> String {
    match node.node_type {
        NodeType::Element if !is_block(node.tag_name()) => {
            let inline = render_inline_node(node, ctx).await;
            finish_paragraph(&inline, ctx.config())
        }
        NodeType::Text => finish_paragraph(&render_inline_node(node, ctx).await, ctx.config()),
        _ => render_container(node, ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::build_client;
    use crate::image::ImageHandler;
    use async_trait::async_trait;
    use web2md_core::ConverterConfig;

    struct Shout;

    #[async_trait]
    impl ElementHandler for Shout {
        fn can_handle(&self, node: &Node) -> bool {
            node.is_tag(&["p", "marquee"])
        }

        async fn handle(&self, node: &Node, _ctx: &mut ConversionContext<'_>) -> String {
            format!("{}!\n\n", node.text_content().to_uppercase())
        }
    }

    async fn dispatch(registry: &HandlerRegistry, node: &Node) -> String {
        let config = ConverterConfig::default();
        let mut images = ImageHandler::new(&config, build_client(&config).unwrap());
        let mut ctx = ConversionContext::new(&config, registry, &mut images, None);
        ctx.dispatch(node).await
    }

    #[test]
    fn test_builtin_order() {
        let registry = HandlerRegistry::new();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(
            names,
            vec![
                "hidden",
                "code_block",
                "table",
                "heading",
                "list",
                "blockquote",
                "horizontal_rule",
                "paragraph"
            ]
        );
    }

    #[test]
    fn test_register_appends_and_replaces_in_place() {
        let mut registry = HandlerRegistry::new();
        registry.register("shout", Shout);
        assert_eq!(registry.names().last(), Some("shout"));

        registry.register("table", Shout);
        assert_eq!(registry.names().nth(2), Some("table"));
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn test_register_before_and_remove() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.register_before("paragraph", "shout", Shout));
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(&names[names.len() - 2..], &["shout", "paragraph"]);

        assert!(!registry.register_before("missing", "other", Shout));
        assert!(registry.remove("shout"));
        assert!(!registry.remove("shout"));
        assert_eq!(registry.len(), 8);
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let node = Node::element("p").with_text("hi");

        let mut registry = HandlerRegistry::new();
        registry.register("shout", Shout);
        assert_eq!(dispatch(&registry, &node).await, "hi\n\n");

        registry.register_before("paragraph", "shout", Shout);
        assert_eq!(dispatch(&registry, &node).await, "HI!\n\n");
    }

    #[tokio::test]
    async fn test_custom_handler_claims_unknown_tag_in_container() {
        let mut registry = HandlerRegistry::new();
        registry.register("shout", Shout);
        let root = Node::element("div")
            .with_text("before")
            .with_child(Node::element("marquee").with_text("loud"));
        assert_eq!(dispatch(&registry, &root).await, "before\n\nLOUD!\n\n");
    }

    #[tokio::test]
    async fn test_unknown_tags_fall_back() {
        let registry = HandlerRegistry::new();
        let node = Node::element("section").with_child(
            Node::element("custom-widget")
                .with_text("inside ")
                .with_child(Node::element("em").with_text("it")),
        );
        assert_eq!(dispatch(&registry, &node).await, "inside *it*\n\n");

        let text = Node::text("  plain  ");
        assert_eq!(dispatch(&registry, &text).await, "plain\n\n");
    }

    #[tokio::test]
    async fn test_empty_registry_uses_fallback() {
        let registry = HandlerRegistry::empty();
        assert!(registry.is_empty());
        let node = Node::element("div")
            .with_child(Node::element("h1").with_text("Title"))
            .with_child(Node::element("p").with_text("Body"));
        assert_eq!(dispatch(&registry, &node).await, "Title\n\nBody\n\n");
    }
}
