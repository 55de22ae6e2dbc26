use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use common::{validation, FieldErrors};
use db::{CommentUpdate, NewComment};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::access::{comment_for_member, ensure_author, issue_for_member};
use crate::dto::{CommentDto, CommentSummaryDto};
use crate::error::{ApiError, ApiResult};
use crate::extract::{AuthUser, JsonBody};
use crate::routes::{ApiState, ListQuery};

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn list_comments(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path((project_id, issue_id)): Path<(i64, i64)>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<CommentSummaryDto>>> {
    let repos = state.repositories.as_ref();
    issue_for_member(repos, project_id, issue_id, &caller).await?;
    let rows = repos
        .comments()
        .list_by_issue(issue_id, query.page())
        .await?;
    Ok(Json(rows.into_iter().map(CommentSummaryDto::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    description: String,
}

#[instrument(skip(state, caller, request), fields(caller_id = caller.id))]
pub async fn create_comment(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path((project_id, issue_id)): Path<(i64, i64)>,
    JsonBody(request): JsonBody<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentDto>)> {
    let repos = state.repositories.as_ref();
    issue_for_member(repos, project_id, issue_id, &caller).await?;

    let mut errors = FieldErrors::new();
    errors.check("description", validation::required_text(&request.description));
    errors.finish()?;

    let comment = repos
        .comments()
        .create(NewComment {
            issue_id,
            author_id: caller.id,
            description: request.description,
        })
        .await?;
    info!(issue_id, comment_id = comment.id, "created comment");
    Ok((StatusCode::CREATED, Json(CommentDto::from(comment))))
}

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn get_comment(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path((project_id, issue_id, comment_id)): Path<(i64, i64, i64)>,
) -> ApiResult<Json<CommentDto>> {
    let comment = comment_for_member(
        state.repositories.as_ref(),
        project_id,
        issue_id,
        comment_id,
        &caller,
    )
    .await?;
    Ok(Json(CommentDto::from(comment)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentPatch {
    description: Option<String>,
}

#[instrument(skip(state, caller, patch), fields(caller_id = caller.id))]
pub async fn update_comment(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path((project_id, issue_id, comment_id)): Path<(i64, i64, i64)>,
    JsonBody(patch): JsonBody<CommentPatch>,
) -> ApiResult<Json<CommentDto>> {
    let repos = state.repositories.as_ref();
    let comment = comment_for_member(repos, project_id, issue_id, comment_id, &caller).await?;
    ensure_author(comment.author_id, &caller, "comment")?;

    if let Some(description) = patch.description.as_deref() {
        let mut errors = FieldErrors::new();
        errors.check("description", validation::required_text(description));
        errors.finish()?;
    }

    let updated = repos
        .comments()
        .update(
            issue_id,
            comment_id,
            CommentUpdate {
                description: patch.description,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found(format!("comment {comment_id} not found")))?;
    Ok(Json(CommentDto::from(updated)))
}

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn delete_comment(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path((project_id, issue_id, comment_id)): Path<(i64, i64, i64)>,
) -> ApiResult<StatusCode> {
    let repos = state.repositories.as_ref();
    let comment = comment_for_member(repos, project_id, issue_id, comment_id, &caller).await?;
    ensure_author(comment.author_id, &caller, "comment")?;

    repos.comments().delete(issue_id, comment_id).await?;
    info!(issue_id, comment_id, "deleted comment");
    Ok(StatusCode::NO_CONTENT)
}
