use thiserror::Error;
use tracing::debug;

use super::{
    checker::{CheckerError, WodChecker},
    render::{MarkdownRenderer, RenderError},
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Checker(#[from] CheckerError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// One request's worth of output: the submission echoed back for form
/// redisplay and the HTML fragment produced from the checker's payload.
#[derive(Debug)]
pub struct RenderedSubmission {
    pub markdown_text: String,
    pub rendered_html: String,
}

/// Orchestrates one submission: run the checker, pick the payload stream,
/// render it to HTML. Holds no mutable state; every invocation is isolated
/// to its own process and buffers.
pub struct RenderPipeline {
    checker: WodChecker,
    renderer: MarkdownRenderer,
}

impl RenderPipeline {
    pub fn new(checker: WodChecker, renderer: MarkdownRenderer) -> Self {
        Self { checker, renderer }
    }

    /// Convert one raw submission into HTML for display.
    ///
    /// Checker launch and decode failures propagate untouched; a checker
    /// diagnostic on stderr is not a failure, it becomes the rendered payload.
    pub async fn render(&self, submission: String) -> Result<RenderedSubmission, PipelineError> {
        let streams = self.checker.check(&submission).await?;
        let payload = streams.into_payload()?;

        debug!(
            target = "application::pipeline",
            op = "pipeline::render",
            submission_bytes = submission.len(),
            payload_bytes = payload.len(),
            "Rendering checker payload"
        );

        let rendered_html = self.renderer.to_html(&payload)?;

        Ok(RenderedSubmission {
            markdown_text: submission,
            rendered_html,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{fs, os::unix::fs::PermissionsExt, path::PathBuf};
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, body: &str) -> PathBuf {
        let script_path = dir.path().join("fake-wod");
        fs::write(&script_path, body).expect("write script");
        let mut perms = fs::metadata(&script_path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).expect("set perms");
        script_path
    }

    fn pipeline_for(script: PathBuf) -> RenderPipeline {
        RenderPipeline::new(WodChecker::new(script), MarkdownRenderer::new())
    }

    #[tokio::test]
    async fn renders_stdout_payload_and_echoes_submission() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            &dir,
            r#"#!/bin/sh
printf '# Title\n'
"#,
        );

        let pipeline = pipeline_for(script);
        let result = pipeline
            .render("# Title".to_string())
            .await
            .expect("pipeline run");

        assert_eq!(result.markdown_text, "# Title");
        assert!(
            result.rendered_html.contains("<h1>Title</h1>"),
            "unexpected html: {}",
            result.rendered_html
        );
    }

    #[tokio::test]
    async fn falls_back_to_stderr_when_stdout_is_empty() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            &dir,
            r#"#!/bin/sh
echo "error: invalid syntax" >&2
exit 1
"#,
        );

        let pipeline = pipeline_for(script);
        let result = pipeline
            .render("bad input".to_string())
            .await
            .expect("pipeline run");

        assert_eq!(result.markdown_text, "bad input");
        assert!(
            result.rendered_html.contains("<p>error: invalid syntax</p>"),
            "unexpected html: {}",
            result.rendered_html
        );
    }

    #[tokio::test]
    async fn stderr_noise_does_not_break_a_stdout_render() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            &dir,
            r#"#!/bin/sh
printf '# Title\n'
printf '\377\376' >&2
"#,
        );

        let pipeline = pipeline_for(script);
        let result = pipeline
            .render("# Title".to_string())
            .await
            .expect("pipeline run");

        assert!(
            result.rendered_html.contains("<h1>Title</h1>"),
            "unexpected html: {}",
            result.rendered_html
        );
    }

    #[tokio::test]
    async fn silent_checker_yields_empty_fragment() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            &dir,
            r#"#!/bin/sh
exit 0
"#,
        );

        let pipeline = pipeline_for(script);
        let result = pipeline.render(String::new()).await.expect("pipeline run");

        assert_eq!(result.markdown_text, "");
        assert!(
            result.rendered_html.trim().is_empty(),
            "unexpected html: {:?}",
            result.rendered_html
        );
    }

    #[tokio::test]
    async fn identical_submissions_render_identically() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            &dir,
            r#"#!/bin/sh
printf '## Deadlift 5x5\n'
"#,
        );

        let pipeline = pipeline_for(script);
        let first = pipeline
            .render("deadlift".to_string())
            .await
            .expect("first run");
        let second = pipeline
            .render("deadlift".to_string())
            .await
            .expect("second run");

        assert_eq!(first.rendered_html, second.rendered_html);
    }

    #[tokio::test]
    async fn launch_failure_propagates() {
        let dir = TempDir::new().expect("temp dir");
        let pipeline = pipeline_for(dir.path().join("does-not-exist"));

        let err = pipeline
            .render("anything".to_string())
            .await
            .expect_err("launch failure");
        assert!(matches!(
            err,
            PipelineError::Checker(CheckerError::Launch(_))
        ));
    }
}
