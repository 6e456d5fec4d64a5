//! Fenced code blocks.

use async_trait::async_trait;
use web2md_core::code_fence;

use super::handler::ElementHandler;
use crate::context::ConversionContext;
use crate::node::Node;

/// `pre`, optionally wrapping a `code` element.
///
/// Content is emitted verbatim. The fence is lengthened past any run of the
/// fence character inside the code so the block cannot close early.
pub struct CodeBlockHandler;

#[async_trait]
impl ElementHandler for CodeBlockHandler {
    fn can_handle(&self, node: &Node) -> bool {
        node.is_tag(&["pre"])
    }

    async fn handle(&self, node: &Node, ctx: &mut ConversionContext<'_>) -> String {
        let code = node.children_named("code").next();
        let language = code
            .and_then(language_of)
            .or_else(|| language_of(node))
            .unwrap_or("");

        let content = code.unwrap_or(node).text_content();
        let content = content.strip_suffix('\n').unwrap_or(&content);
        let fence = code_fence(content, ctx.config().code_block_style);

        if content.is_empty() {
            format!("{}{}\n{}\n\n", fence, language, fence)
        } else {
            format!("{}{}\n{}\n{}\n\n", fence, language, content, fence)
        }
    }
}

/// Language named by a `language-*` or `lang-*` class token.
fn language_of(node: &Node) -> Option<&str> {
    node.classes().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
    })
}
