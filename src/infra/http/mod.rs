mod middleware;

use std::sync::Arc;

use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    application::{error::AppError, pipeline::RenderPipeline},
    infra::assets,
    presentation::views::{IndexTemplate, WorkoutFormView, render_template_response},
};

use middleware::{log_responses, set_request_context};

/// Explicit request-handling state, constructed once at startup. There is no
/// process-wide application object.
#[derive(Clone)]
pub struct HttpState {
    pub pipeline: Arc<RenderPipeline>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/render", post(render))
        .route("/static/{*path}", get(assets::serve))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn index() -> Response {
    render_template_response(
        IndexTemplate {
            form: WorkoutFormView::default(),
        },
        StatusCode::OK,
    )
}

#[derive(Debug, Deserialize)]
struct RenderForm {
    markdown_text: String,
}

async fn render(State(state): State<HttpState>, Form(form): Form<RenderForm>) -> Response {
    match state.pipeline.render(form.markdown_text).await {
        Ok(rendered) => render_template_response(
            IndexTemplate {
                form: WorkoutFormView {
                    markdown_text: rendered.markdown_text,
                    rendered_html: rendered.rendered_html,
                },
            },
            StatusCode::OK,
        ),
        Err(err) => AppError::from(err).into_response(),
    }
}
