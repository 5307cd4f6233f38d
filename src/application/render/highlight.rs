use std::borrow::Cow;

use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::SyntaxSet,
    util::LinesWithEndings,
};

use super::RenderError;

/// Turns one fenced code block into classed `<pre><code>` markup. Every CSS
/// class carries a `syntax-` prefix so the stylesheet can scope its colors to
/// highlighted output.
pub(crate) struct CodeHighlighter {
    syntax_set: SyntaxSet,
    class_style: ClassStyle,
}

impl CodeHighlighter {
    pub(crate) fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            class_style: ClassStyle::SpacedPrefixed { prefix: "syntax-" },
        }
    }

    /// The first word of the fence info string names the language. A missing
    /// or unrecognized token highlights as plain text while still tagging the
    /// wrapper with the claimed language, so stylesheets see a stable class.
    pub(crate) fn highlight(&self, fence_info: &str, code: &str) -> Result<String, RenderError> {
        let lang = fence_info
            .split_whitespace()
            .next()
            .unwrap_or("text")
            .to_ascii_lowercase();
        let syntax = self
            .syntax_set
            .find_syntax_by_token(&lang)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        // Syntect's line-wise API wants every line newline-terminated.
        let mut source = Cow::Borrowed(code);
        if !source.ends_with('\n') {
            source.to_mut().push('\n');
        }

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, self.class_style);
        for line in LinesWithEndings::from(&source) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|err| RenderError::Highlighting {
                    language: lang.clone(),
                    message: err.to_string(),
                })?;
        }

        let body = generator.finalize();
        Ok(format!(
            "<pre class=\"syntax-highlight syntax-lang-{lang}\">\
<code class=\"language-{lang} syntax-code\">{body}</code></pre>"
        ))
    }
}
