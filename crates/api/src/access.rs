//! Ownership and membership rules shared by the project-scoped handlers.
//!
//! Reads inside a project require membership, writes on a resource require
//! being its author. Lookups always go through the parent id so that an id
//! from another project resolves to 404.

use db::{CommentRow, IssueRow, ProjectRow, Repositories};

use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;

pub async fn load_project(repos: &dyn Repositories, project_id: i64) -> ApiResult<ProjectRow> {
    repos
        .projects()
        .get(project_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {project_id} not found")))
}

pub async fn project_for_member(
    repos: &dyn Repositories,
    project_id: i64,
    user: &AuthUser,
) -> ApiResult<ProjectRow> {
    let project = load_project(repos, project_id).await?;
    if project.author_id != user.id
        && !repos.contributors().is_contributor(project_id, user.id).await?
    {
        return Err(ApiError::forbidden(
            "you are not a contributor of this project",
        ));
    }
    Ok(project)
}

pub async fn issue_for_member(
    repos: &dyn Repositories,
    project_id: i64,
    issue_id: i64,
    user: &AuthUser,
) -> ApiResult<IssueRow> {
    project_for_member(repos, project_id, user).await?;
    repos
        .issues()
        .get(project_id, issue_id)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "issue {issue_id} not found in project {project_id}"
            ))
        })
}

pub async fn comment_for_member(
    repos: &dyn Repositories,
    project_id: i64,
    issue_id: i64,
    comment_id: i64,
    user: &AuthUser,
) -> ApiResult<CommentRow> {
    issue_for_member(repos, project_id, issue_id, user).await?;
    repos
        .comments()
        .get(issue_id, comment_id)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "comment {comment_id} not found on issue {issue_id}"
            ))
        })
}

pub fn ensure_author(author_id: i64, user: &AuthUser, resource: &str) -> ApiResult<()> {
    if author_id != user.id {
        return Err(ApiError::forbidden(format!(
            "only the author of this {resource} may change it"
        )));
    }
    Ok(())
}

/// Assignees must already be members of the project.
pub async fn ensure_assignable(
    repos: &dyn Repositories,
    project_id: i64,
    assignee_id: i64,
) -> ApiResult<()> {
    if !repos
        .contributors()
        .is_contributor(project_id, assignee_id)
        .await?
    {
        return Err(ApiError::field(
            "assignee_id",
            "the assigned user must be a contributor of the project",
        ));
    }
    Ok(())
}
