use std::sync::Arc;

use auth::TokenIssuer;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use db::{Page, Repositories};
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

pub mod comments;
pub mod contributors;
pub mod issues;
pub mod projects;
pub mod session;
pub mod users;

#[derive(Clone)]
pub struct ApiState {
    pub repositories: Arc<dyn Repositories>,
    pub tokens: TokenIssuer,
    pub metrics_path: String,
    pub prefix: String,
}

pub fn build_router(state: Arc<ApiState>) -> Router {
    let resources = Router::new()
        .route("/login/", post(session::login))
        .route("/token/refresh/", post(session::refresh))
        .route("/register/", post(session::register))
        .route("/users/", get(users::list_users))
        .route(
            "/users/:user_id/",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/projects/",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/:project_id/",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        )
        .route(
            "/projects/:project_id/contributors/",
            get(contributors::list_contributors).post(contributors::add_contributor),
        )
        .route(
            "/projects/:project_id/contributors/:contributor_id/",
            delete(contributors::remove_contributor),
        )
        .route(
            "/projects/:project_id/issues/",
            get(issues::list_issues).post(issues::create_issue),
        )
        .route(
            "/projects/:project_id/issues/:issue_id/",
            get(issues::get_issue)
                .patch(issues::update_issue)
                .delete(issues::delete_issue),
        )
        .route(
            "/projects/:project_id/issues/:issue_id/comments/",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/projects/:project_id/issues/:issue_id/comments/:comment_id/",
            get(comments::get_comment)
                .patch(comments::update_comment)
                .delete(comments::delete_comment),
        );

    let prefix = state.prefix.trim_end_matches('/');
    let router = if prefix.is_empty() {
        resources
    } else {
        Router::new().nest(prefix, resources)
    };

    router
        .route("/healthz", get(healthz))
        .route(&state.metrics_path, get(metrics_handler))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

impl ListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[instrument(skip(state))]
async fn metrics_handler(State(state): State<Arc<ApiState>>) -> ApiResult<impl IntoResponse> {
    // Best-effort: a failed refresh still serves the last known values
    if let Err(err) = metrics::refresh_entity_counts(state.repositories.as_ref()).await {
        warn!(error = %err, "failed to refresh entity counts");
    }
    let (content_type, buffer) =
        metrics::render().map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], buffer))
}
