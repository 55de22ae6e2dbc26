use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use common::{validation, FieldErrors};
use db::{NewProject, ProjectRow, ProjectType, ProjectUpdate, Repositories};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::access::{ensure_author, load_project, project_for_member};
use crate::dto::{ProjectDto, ProjectSummaryDto};
use crate::error::{ApiError, ApiResult};
use crate::extract::{AuthUser, JsonBody};
use crate::routes::{ApiState, ListQuery};

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn list_projects(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ProjectSummaryDto>>> {
    let rows = state
        .repositories
        .projects()
        .list_for_user(caller.id, query.page())
        .await?;
    Ok(Json(rows.into_iter().map(ProjectSummaryDto::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "type")]
    project_type: ProjectType,
}

#[instrument(skip(state, caller, request), fields(caller_id = caller.id))]
pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    JsonBody(request): JsonBody<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectDto>)> {
    let mut errors = FieldErrors::new();
    errors.check("title", validation::title(&request.title));
    errors.check("description", validation::text(&request.description));
    errors.finish()?;

    let project = state
        .repositories
        .projects()
        .create(NewProject {
            title: request.title,
            description: request.description,
            project_type: request.project_type,
            author_id: caller.id,
        })
        .await?;
    info!(project_id = project.id, "created project");

    let dto = with_contributors(state.repositories.as_ref(), project).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn get_project(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<ProjectDto>> {
    let repos = state.repositories.as_ref();
    let project = project_for_member(repos, project_id, &caller).await?;
    Ok(Json(with_contributors(repos, project).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectPatch {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    project_type: Option<ProjectType>,
}

#[instrument(skip(state, caller, patch), fields(caller_id = caller.id))]
pub async fn update_project(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path(project_id): Path<i64>,
    JsonBody(patch): JsonBody<ProjectPatch>,
) -> ApiResult<Json<ProjectDto>> {
    let repos = state.repositories.as_ref();
    let project = load_project(repos, project_id).await?;
    ensure_author(project.author_id, &caller, "project")?;

    let mut errors = FieldErrors::new();
    if let Some(title) = patch.title.as_deref() {
        errors.check("title", validation::title(title));
    }
    if let Some(description) = patch.description.as_deref() {
        errors.check("description", validation::text(description));
    }
    errors.finish()?;

    let updated = repos
        .projects()
        .update(
            project_id,
            ProjectUpdate {
                title: patch.title,
                description: patch.description,
                project_type: patch.project_type,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {project_id} not found")))?;
    Ok(Json(with_contributors(repos, updated).await?))
}

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn delete_project(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let repos = state.repositories.as_ref();
    let project = load_project(repos, project_id).await?;
    ensure_author(project.author_id, &caller, "project")?;

    if !repos.projects().delete(project_id).await? {
        return Err(ApiError::not_found(format!(
            "project {project_id} not found"
        )));
    }
    info!(project_id, "deleted project");
    Ok(StatusCode::NO_CONTENT)
}

async fn with_contributors(repos: &dyn Repositories, project: ProjectRow) -> ApiResult<ProjectDto> {
    let contributors = repos.contributors().list_all_by_project(project.id).await?;
    Ok(ProjectDto::from_row(project, contributors))
}
