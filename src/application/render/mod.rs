mod highlight;

use ammonia::Builder as AmmoniaBuilder;
use comrak::{
    Arena, format_html,
    nodes::{AstNode, NodeHtmlBlock, NodeValue},
    options::Options,
    parse_document,
};
use thiserror::Error;

use highlight::CodeHighlighter;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markdown serialization failed: {message}")]
    Markdown { message: String },
    #[error("highlighting `{language}` failed: {message}")]
    Highlighting { language: String, message: String },
}

/// Comrak-based markdown renderer with Syntect highlighting of fenced code
/// blocks and Ammonia sanitisation of the produced fragment.
///
/// Total over any valid UTF-8 input: arbitrary text renders to some HTML
/// fragment; `RenderError` covers only internal serialization failures.
pub struct MarkdownRenderer {
    options: Options<'static>,
    highlighter: CodeHighlighter,
    sanitizer: AmmoniaBuilder<'static>,
}

impl MarkdownRenderer {
    /// Construct a renderer with syntax highlighting configured to emit
    /// `syntax-` prefixed CSS classes.
    pub fn new() -> Self {
        Self {
            options: render_options(),
            highlighter: CodeHighlighter::new(),
            sanitizer: build_sanitizer(),
        }
    }

    /// Render markdown to a sanitized HTML fragment.
    pub fn to_html(&self, markdown: &str) -> Result<String, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        self.highlight_code_blocks(root)?;

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;

        Ok(self.sanitizer.clean(&html).to_string())
    }

    /// Replace fenced code blocks in the AST with pre-highlighted HTML so the
    /// serializer emits them verbatim.
    fn highlight_code_blocks<'a>(&self, node: &'a AstNode<'a>) -> Result<(), RenderError> {
        if let Some((info, literal)) = extract_code_block(node) {
            let html = self.highlighter.highlight(&info, &literal)?;

            let mut data = node.data.borrow_mut();
            data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal: html,
            });
        }

        let mut child = node.first_child();
        while let Some(next) = child {
            self.highlight_code_blocks(next)?;
            child = next.next_sibling();
        }

        Ok(())
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    if let NodeValue::CodeBlock(block) = &data.value {
        let info = block.info.trim().to_string();
        let literal = block.literal.clone();
        Some((info, literal))
    } else {
        None
    }
}

fn render_options() -> Options<'static> {
    let mut options = Options::default();

    // The injected highlight markup is raw HTML to the serializer; without
    // this it would come out as an omission comment. The sanitizer still
    // cleans the full fragment afterwards.
    options.render.r#unsafe = true;

    options
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    // Syntect output is span soup with class attributes; the default policy
    // strips classes, so allow them explicitly.
    builder.add_generic_attributes(&["class"]);

    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_heading() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.to_html("# Title\n").expect("render");
        assert!(html.contains("<h1>Title</h1>"), "unexpected html: {html}");
    }

    #[test]
    fn renders_plain_text_as_paragraph() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.to_html("error: invalid syntax").expect("render");
        assert!(
            html.contains("<p>error: invalid syntax</p>"),
            "unexpected html: {html}"
        );
    }

    #[test]
    fn empty_input_renders_empty_fragment() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.to_html("").expect("render");
        assert!(html.trim().is_empty(), "unexpected html: {html:?}");
    }

    #[test]
    fn highlights_fenced_code_blocks() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .to_html("```rust\nfn main() {}\n```\n")
            .expect("render");

        assert!(
            html.contains("syntax-lang-rust"),
            "missing language class: {html}"
        );
        assert!(
            html.contains("class=\"language-rust syntax-code\""),
            "missing code class: {html}"
        );
        assert!(html.contains("<span"), "missing highlight spans: {html}");
    }

    #[test]
    fn highlighted_blocks_survive_serialization_and_sanitisation() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .to_html("```rust\nfn main() {}\n```\n")
            .expect("render");

        assert!(
            !html.contains("raw HTML omitted"),
            "highlight markup was suppressed: {html}"
        );
        assert!(html.contains("main"), "code body dropped: {html}");
        assert!(html.contains("<pre"), "missing pre wrapper: {html}");
    }

    #[test]
    fn unknown_fence_language_falls_back_to_plain_text() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .to_html("```nosuchlang\n3 rounds\n```\n")
            .expect("render");

        assert!(
            html.contains("syntax-lang-nosuchlang"),
            "unexpected html: {html}"
        );
        assert!(html.contains("3 rounds"), "code body dropped: {html}");
    }

    #[test]
    fn script_tags_are_sanitized_away() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .to_html("hello <script>alert(1)</script>")
            .expect("render");
        assert!(!html.contains("<script"), "unexpected html: {html}");
    }

    #[test]
    fn rendering_is_deterministic() {
        let renderer = MarkdownRenderer::new();
        let first = renderer.to_html("# Title\n\nbody text\n").expect("render");
        let second = renderer.to_html("# Title\n\nbody text\n").expect("render");
        assert_eq!(first, second);
    }
}
