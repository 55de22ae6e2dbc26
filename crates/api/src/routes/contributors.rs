use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::access::{ensure_author, load_project, project_for_member};
use crate::dto::ContributorDto;
use crate::error::{ApiError, ApiResult};
use crate::extract::{AuthUser, JsonBody};
use crate::routes::{ApiState, ListQuery};

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn list_contributors(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path(project_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ContributorDto>>> {
    let repos = state.repositories.as_ref();
    project_for_member(repos, project_id, &caller).await?;
    let rows = repos
        .contributors()
        .list_by_project(project_id, query.page())
        .await?;
    Ok(Json(rows.into_iter().map(ContributorDto::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct AddContributorRequest {
    user: i64,
}

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn add_contributor(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path(project_id): Path<i64>,
    JsonBody(request): JsonBody<AddContributorRequest>,
) -> ApiResult<(StatusCode, Json<ContributorDto>)> {
    let repos = state.repositories.as_ref();
    let project = load_project(repos, project_id).await?;
    ensure_author(project.author_id, &caller, "project")?;

    if repos.users().get_by_id(request.user).await?.is_none() {
        return Err(ApiError::field(
            "user",
            format!("invalid pk \"{}\": object does not exist", request.user),
        ));
    }

    let contributor = repos
        .contributors()
        .add(project_id, request.user)
        .await
        .map_err(|err| {
            if err.is_conflict() {
                ApiError::field("user", "this user is already a contributor of the project")
            } else {
                ApiError::from(err)
            }
        })?;
    info!(project_id, user_id = request.user, "added contributor");
    Ok((StatusCode::CREATED, Json(ContributorDto::from(contributor))))
}

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn remove_contributor(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path((project_id, contributor_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let repos = state.repositories.as_ref();
    let project = load_project(repos, project_id).await?;
    ensure_author(project.author_id, &caller, "project")?;

    let contributor = repos
        .contributors()
        .get(project_id, contributor_id)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "contributor {contributor_id} not found in project {project_id}"
            ))
        })?;
    if contributor.user_id == project.author_id {
        return Err(ApiError::bad_request(
            "the project author cannot be removed from its contributors",
        ));
    }

    repos.contributors().remove(project_id, contributor_id).await?;
    info!(project_id, contributor_id, "removed contributor");
    Ok(StatusCode::NO_CONTENT)
}
