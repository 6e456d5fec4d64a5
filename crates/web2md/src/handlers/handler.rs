//! The handler trait every element strategy implements.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::context::ConversionContext;
use crate::node::Node;

/// Boxed future used where rendering recurses into itself.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A strategy that claims and renders one category of element.
///
/// `handle` is only called for nodes `can_handle` accepted. Block handlers
/// return their Markdown terminated by one blank line (`"\n\n"`), or an empty
/// string when there is nothing to emit.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use web2md::{ConversionContext, ElementHandler, Node};
///
/// struct Aside;
///
/// #[async_trait]
/// impl ElementHandler for Aside {
///     fn can_handle(&self, node: &Node) -> bool {
///         node.is_tag(&["aside"])
///     }
///
///     async fn handle(&self, node: &Node, _ctx: &mut ConversionContext<'_>) -> String {
///         format!("> **Note:** {}\n\n", node.text_content().trim())
///     }
/// }
/// ```
#[async_trait]
pub trait ElementHandler: Send + Sync {
    /// Whether this handler renders `node`
    fn can_handle(&self, node: &Node) -> bool;

    /// Render `node`, recursing into children through the context
    async fn handle(&self, node: &Node, ctx: &mut ConversionContext<'_>) -> String;
}
