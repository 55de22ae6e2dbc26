use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use db::models::{
    CommentRow, ContributorRow, IssuePriority, IssueRow, IssueStatus, IssueTag, ProjectRow,
    ProjectType, UserRow,
};

#[derive(Debug, Serialize)]
pub struct UserSummaryDto {
    pub id: i64,
    pub username: String,
}

impl From<UserRow> for UserSummaryDto {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
        }
    }
}

/// Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub birth_date: Option<NaiveDate>,
    pub can_be_contacted: bool,
    pub can_data_be_shared: bool,
    pub created_time: DateTime<Utc>,
}

impl From<UserRow> for UserDto {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            birth_date: row.birth_date,
            can_be_contacted: row.can_be_contacted,
            can_data_be_shared: row.can_data_be_shared,
            created_time: row.created_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectSummaryDto {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub author_id: i64,
    pub created_time: DateTime<Utc>,
}

impl From<ProjectRow> for ProjectSummaryDto {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            project_type: row.project_type,
            author_id: row.author_id,
            created_time: row.created_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectDto {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub author_id: i64,
    pub created_time: DateTime<Utc>,
    pub contributors: Vec<ContributorDto>,
}

impl ProjectDto {
    pub fn from_row(row: ProjectRow, contributors: Vec<ContributorRow>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            project_type: row.project_type,
            author_id: row.author_id,
            created_time: row.created_time,
            contributors: contributors.into_iter().map(ContributorDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContributorDto {
    pub id: i64,
    pub user_id: i64,
    pub project_id: i64,
    pub username: String,
    pub created_time: DateTime<Utc>,
}

impl From<ContributorRow> for ContributorDto {
    fn from(row: ContributorRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            project_id: row.project_id,
            username: row.username,
            created_time: row.created_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IssueSummaryDto {
    pub id: i64,
    pub title: String,
    pub tag: IssueTag,
    pub priority: IssuePriority,
    pub status: IssueStatus,
    pub assignee_id: Option<i64>,
    pub author_id: i64,
    pub created_time: DateTime<Utc>,
}

impl From<IssueRow> for IssueSummaryDto {
    fn from(row: IssueRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            tag: row.tag,
            priority: row.priority,
            status: row.status,
            assignee_id: row.assignee_id,
            author_id: row.author_id,
            created_time: row.created_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IssueDto {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub tag: IssueTag,
    pub priority: IssuePriority,
    pub status: IssueStatus,
    pub assignee_id: Option<i64>,
    pub author_id: i64,
    pub created_time: DateTime<Utc>,
}

impl From<IssueRow> for IssueDto {
    fn from(row: IssueRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            title: row.title,
            description: row.description,
            tag: row.tag,
            priority: row.priority,
            status: row.status,
            assignee_id: row.assignee_id,
            author_id: row.author_id,
            created_time: row.created_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentSummaryDto {
    pub id: i64,
    pub uuid: Uuid,
    pub description: String,
    pub author_id: i64,
    pub created_time: DateTime<Utc>,
}

impl From<CommentRow> for CommentSummaryDto {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            description: row.description,
            author_id: row.author_id,
            created_time: row.created_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentDto {
    pub id: i64,
    pub uuid: Uuid,
    pub issue_id: i64,
    pub description: String,
    pub author_id: i64,
    pub created_time: DateTime<Utc>,
}

impl From<CommentRow> for CommentDto {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            issue_id: row.issue_id,
            description: row.description,
            author_id: row.author_id,
            created_time: row.created_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_dto_omits_password_hash() {
        let row = UserRow {
            id: 1,
            username: "author".into(),
            email: "a@b.io".into(),
            password_hash: "$argon2id$secret".into(),
            birth_date: None,
            can_be_contacted: true,
            can_data_be_shared: false,
            created_time: Utc::now(),
        };
        let value = serde_json::to_value(UserDto::from(row)).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["username"], "author");
        assert_eq!(value["can_be_contacted"], true);
    }

    #[test]
    fn project_type_serializes_as_type() {
        let row = ProjectRow {
            id: 4,
            title: "T".into(),
            description: String::new(),
            project_type: ProjectType::Backend,
            author_id: 1,
            created_time: Utc::now(),
        };
        let value = serde_json::to_value(ProjectSummaryDto::from(row)).unwrap();
        assert_eq!(value["type"], "BACKEND");
        assert!(value.get("project_type").is_none());
    }
}
