use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectType {
    Backend,
    Frontend,
    Ios,
    Android,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_tag", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueTag {
    Bug,
    Feature,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_priority", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuePriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    #[default]
    ToDo,
    InProgress,
    Finished,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub birth_date: Option<NaiveDate>,
    pub can_be_contacted: bool,
    pub can_data_be_shared: bool,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub project_type: ProjectType,
    pub author_id: i64,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContributorRow {
    pub id: i64,
    pub user_id: i64,
    pub project_id: i64,
    pub username: String,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IssueRow {
    pub id: i64,
    pub project_id: i64,
    pub author_id: i64,
    pub assignee_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub tag: IssueTag,
    pub priority: IssuePriority,
    pub status: IssueStatus,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub uuid: Uuid,
    pub issue_id: i64,
    pub author_id: i64,
    pub description: String,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub birth_date: Option<NaiveDate>,
    pub can_be_contacted: bool,
    pub can_data_be_shared: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub birth_date: Option<Option<NaiveDate>>,
    pub can_be_contacted: Option<bool>,
    pub can_data_be_shared: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub project_type: ProjectType,
    pub author_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub project_type: Option<ProjectType>,
}

#[derive(Debug, Clone)]
pub struct NewIssue {
    pub project_id: i64,
    pub author_id: i64,
    pub assignee_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub tag: IssueTag,
    pub priority: IssuePriority,
    pub status: IssueStatus,
}

#[derive(Debug, Clone, Default)]
pub struct IssueUpdate {
    pub assignee_id: Option<Option<i64>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tag: Option<IssueTag>,
    pub priority: Option<IssuePriority>,
    pub status: Option<IssueStatus>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub issue_id: i64,
    pub author_id: i64,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct CommentUpdate {
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 500;

    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub users: i64,
    pub projects: i64,
    pub issues: i64,
    pub comments: i64,
}
