use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use common::{validation, FieldErrors};
use db::UserUpdate;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::dto::{UserDto, UserSummaryDto};
use crate::error::{ApiError, ApiResult};
use crate::extract::{AuthUser, JsonBody};
use crate::routes::session::{hash_off_thread, USERNAME_TAKEN};
use crate::routes::{ApiState, ListQuery};

#[instrument(skip(state, _caller))]
pub async fn list_users(
    State(state): State<Arc<ApiState>>,
    _caller: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<UserSummaryDto>>> {
    let rows = state.repositories.users().list(query.page()).await?;
    Ok(Json(rows.into_iter().map(UserSummaryDto::from).collect()))
}

#[instrument(skip(state, _caller))]
pub async fn get_user(
    State(state): State<Arc<ApiState>>,
    _caller: AuthUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserDto>> {
    let user = state
        .repositories
        .users()
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))?;
    Ok(Json(UserDto::from(user)))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserPatch {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    birth_date: Option<Option<NaiveDate>>,
    can_be_contacted: Option<bool>,
    can_data_be_shared: Option<bool>,
}

#[instrument(skip(state, caller, patch), fields(caller_id = caller.id))]
pub async fn update_user(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path(user_id): Path<i64>,
    JsonBody(patch): JsonBody<UserPatch>,
) -> ApiResult<Json<UserDto>> {
    let users = state.repositories.users();
    let existing = users
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))?;
    ensure_self(existing.id, &caller)?;

    let mut errors = FieldErrors::new();
    if let Some(username) = patch.username.as_deref() {
        errors.check("username", validation::username(username));
        if username != existing.username && users.get_by_username(username).await?.is_some() {
            errors.add("username", USERNAME_TAKEN);
        }
    }
    if let Some(email) = patch.email.as_deref() {
        errors.check("email", validation::email(email));
    }
    if let Some(password) = patch.password.as_deref() {
        let username = patch.username.as_deref().unwrap_or(&existing.username);
        errors.check("password", validation::password(password, Some(username)));
    }
    if let Some(Some(birth_date)) = patch.birth_date {
        errors.check(
            "birth_date",
            validation::birth_date(birth_date, Utc::now().date_naive()),
        );
    }
    errors.finish()?;

    let password_hash = match patch.password {
        Some(password) => Some(hash_off_thread(password).await?),
        None => None,
    };

    let updated = users
        .update(
            user_id,
            UserUpdate {
                username: patch.username,
                email: patch.email,
                password_hash,
                birth_date: patch.birth_date,
                can_be_contacted: patch.can_be_contacted,
                can_data_be_shared: patch.can_data_be_shared,
            },
        )
        .await
        .map_err(|err| {
            if err.is_conflict() {
                ApiError::field("username", USERNAME_TAKEN)
            } else {
                ApiError::from(err)
            }
        })?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))?;
    Ok(Json(UserDto::from(updated)))
}

#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn delete_user(
    State(state): State<Arc<ApiState>>,
    caller: AuthUser,
    Path(user_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let users = state.repositories.users();
    let existing = users
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))?;
    ensure_self(existing.id, &caller)?;

    if !users.delete(user_id).await? {
        return Err(ApiError::not_found(format!("user {user_id} not found")));
    }
    info!(user_id, "deleted user");
    Ok(StatusCode::NO_CONTENT)
}

fn ensure_self(user_id: i64, caller: &AuthUser) -> ApiResult<()> {
    if user_id != caller.id {
        return Err(ApiError::forbidden("you may only change your own account"));
    }
    Ok(())
}
