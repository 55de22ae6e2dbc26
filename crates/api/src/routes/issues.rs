use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use common::{validation, FieldErrors};
use db::{IssuePriority, IssueStatus, IssueTag, IssueUpdate, NewIssue};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::access::{ensure_assignable, ensure_author, issue_for_member, project_for_member};
use crate::dto::{IssueDto, IssueSummaryDto};
use crate::error::{ApiError, ApiResult};
use crate::extract::{AuthUser, JsonBody};
use crate::routes::{ApiState, ListQuery};

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn list_issues(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path(project_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<IssueSummaryDto>>> {
    let repos = state.repositories.as_ref();
    project_for_member(repos, project_id, &caller).await?;
    let rows = repos
        .issues()
        .list_by_project(project_id, query.page())
        .await?;
    Ok(Json(rows.into_iter().map(IssueSummaryDto::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    title: String,
    #[serde(default)]
    description: String,
    tag: IssueTag,
    priority: IssuePriority,
    #[serde(default)]
    status: IssueStatus,
    #[serde(default)]
    assignee_id: Option<i64>,
}

#[instrument(skip(state, caller, request), fields(caller_id = caller.id))]
pub async fn create_issue(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path(project_id): Path<i64>,
    JsonBody(request): JsonBody<CreateIssueRequest>,
) -> ApiResult<(StatusCode, Json<IssueDto>)> {
    let repos = state.repositories.as_ref();
    project_for_member(repos, project_id, &caller).await?;

    let mut errors = FieldErrors::new();
    errors.check("title", validation::title(&request.title));
    errors.check("description", validation::text(&request.description));
    errors.finish()?;
    if let Some(assignee_id) = request.assignee_id {
        ensure_assignable(repos, project_id, assignee_id).await?;
    }

    let issue = repos
        .issues()
        .create(NewIssue {
            project_id,
            author_id: caller.id,
            assignee_id: request.assignee_id,
            title: request.title,
            description: request.description,
            tag: request.tag,
            priority: request.priority,
            status: request.status,
        })
        .await?;
    info!(project_id, issue_id = issue.id, "created issue");
    Ok((StatusCode::CREATED, Json(IssueDto::from(issue))))
}

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn get_issue(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path((project_id, issue_id)): Path<(i64, i64)>,
) -> ApiResult<Json<IssueDto>> {
    let issue = issue_for_member(state.repositories.as_ref(), project_id, issue_id, &caller).await?;
    Ok(Json(IssueDto::from(issue)))
}

#[derive(Debug, Default, Deserialize)]
pub struct IssuePatch {
    title: Option<String>,
    description: Option<String>,
    tag: Option<IssueTag>,
    priority: Option<IssuePriority>,
    status: Option<IssueStatus>,
    /// `null` unassigns, absent leaves the assignee alone.
    #[serde(default, with = "::serde_with::rust::double_option")]
    assignee_id: Option<Option<i64>>,
}

#[instrument(skip(state, caller, patch), fields(caller_id = caller.id))]
pub async fn update_issue(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path((project_id, issue_id)): Path<(i64, i64)>,
    JsonBody(patch): JsonBody<IssuePatch>,
) -> ApiResult<Json<IssueDto>> {
    let repos = state.repositories.as_ref();
    let issue = issue_for_member(repos, project_id, issue_id, &caller).await?;
    ensure_author(issue.author_id, &caller, "issue")?;

    let mut errors = FieldErrors::new();
    if let Some(title) = patch.title.as_deref() {
        errors.check("title", validation::title(title));
    }
    if let Some(description) = patch.description.as_deref() {
        errors.check("description", validation::text(description));
    }
    errors.finish()?;
    if let Some(Some(assignee_id)) = patch.assignee_id {
        ensure_assignable(repos, project_id, assignee_id).await?;
    }

    let updated = repos
        .issues()
        .update(
            project_id,
            issue_id,
            IssueUpdate {
                assignee_id: patch.assignee_id,
                title: patch.title,
                description: patch.description,
                tag: patch.tag,
                priority: patch.priority,
                status: patch.status,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found(format!("issue {issue_id} not found")))?;
    Ok(Json(IssueDto::from(updated)))
}

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn delete_issue(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path((project_id, issue_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let repos = state.repositories.as_ref();
    let issue = issue_for_member(repos, project_id, issue_id, &caller).await?;
    ensure_author(issue.author_id, &caller, "issue")?;

    repos.issues().delete(project_id, issue_id).await?;
    info!(project_id, issue_id, "deleted issue");
    Ok(StatusCode::NO_CONTENT)
}
