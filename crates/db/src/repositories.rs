use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{
    CommentRow, CommentUpdate, ContributorRow, EntityCounts, IssueRow, IssueUpdate, NewComment,
    NewIssue, NewProject, NewUser, Page, ProjectRow, ProjectUpdate, UserRow, UserUpdate,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `DbError::Conflict` when the username is taken.
    async fn create(&self, user: NewUser) -> Result<UserRow>;
    async fn get_by_id(&self, id: i64) -> Result<Option<UserRow>>;
    async fn get_by_username(&self, username: &str) -> Result<Option<UserRow>>;
    async fn list(&self, page: Page) -> Result<Vec<UserRow>>;
    async fn update(&self, id: i64, update: UserUpdate) -> Result<Option<UserRow>>;
    async fn delete(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Inserts the project and the author's contributor row atomically.
    async fn create(&self, project: NewProject) -> Result<ProjectRow>;
    async fn get(&self, id: i64) -> Result<Option<ProjectRow>>;
    /// Projects the user authored or contributes to.
    async fn list_for_user(&self, user_id: i64, page: Page) -> Result<Vec<ProjectRow>>;
    async fn update(&self, id: i64, update: ProjectUpdate) -> Result<Option<ProjectRow>>;
    async fn delete(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait ContributorRepository: Send + Sync {
    /// Fails with `DbError::Conflict` when the user is already a member.
    async fn add(&self, project_id: i64, user_id: i64) -> Result<ContributorRow>;
    async fn get(&self, project_id: i64, contributor_id: i64) -> Result<Option<ContributorRow>>;
    async fn list_by_project(&self, project_id: i64, page: Page) -> Result<Vec<ContributorRow>>;
    /// Every member, unpaged; used to embed the roster in project detail.
    async fn list_all_by_project(&self, project_id: i64) -> Result<Vec<ContributorRow>>;
    async fn is_contributor(&self, project_id: i64, user_id: i64) -> Result<bool>;
    /// Issues assigned to the removed user are left unassigned.
    async fn remove(&self, project_id: i64, contributor_id: i64) -> Result<bool>;
}

#[async_trait]
pub trait IssueRepository: Send + Sync {
    async fn create(&self, issue: NewIssue) -> Result<IssueRow>;
    async fn get(&self, project_id: i64, issue_id: i64) -> Result<Option<IssueRow>>;
    async fn list_by_project(&self, project_id: i64, page: Page) -> Result<Vec<IssueRow>>;
    async fn update(
        &self,
        project_id: i64,
        issue_id: i64,
        update: IssueUpdate,
    ) -> Result<Option<IssueRow>>;
    async fn delete(&self, project_id: i64, issue_id: i64) -> Result<bool>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: NewComment) -> Result<CommentRow>;
    async fn get(&self, issue_id: i64, comment_id: i64) -> Result<Option<CommentRow>>;
    async fn list_by_issue(&self, issue_id: i64, page: Page) -> Result<Vec<CommentRow>>;
    async fn update(
        &self,
        issue_id: i64,
        comment_id: i64,
        update: CommentUpdate,
    ) -> Result<Option<CommentRow>>;
    async fn delete(&self, issue_id: i64, comment_id: i64) -> Result<bool>;
}

#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn entity_counts(&self) -> Result<EntityCounts>;
}

pub trait Repositories: Send + Sync {
    fn users(&self) -> &dyn UserRepository;
    fn projects(&self) -> &dyn ProjectRepository;
    fn contributors(&self) -> &dyn ContributorRepository;
    fn issues(&self) -> &dyn IssueRepository;
    fn comments(&self) -> &dyn CommentRepository;
    fn stats(&self) -> &dyn StatsRepository;
}
