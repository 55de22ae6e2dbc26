use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::time::{sleep, Duration};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::{DbError, Result};
use crate::models::{
    CommentRow, CommentUpdate, ContributorRow, EntityCounts, IssueRow, IssueUpdate, NewComment,
    NewIssue, NewProject, NewUser, Page, ProjectRow, ProjectUpdate, UserRow, UserUpdate,
};
use crate::repositories::{
    CommentRepository, ContributorRepository, IssueRepository, ProjectRepository, Repositories,
    StatsRepository, UserRepository,
};

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(DbError::Migration)
}

#[derive(Clone)]
pub struct PgDatabase {
    user_repo: Arc<PgUserRepository>,
    project_repo: Arc<PgProjectRepository>,
    contributor_repo: Arc<PgContributorRepository>,
    issue_repo: Arc<PgIssueRepository>,
    comment_repo: Arc<PgCommentRepository>,
    stats_repo: Arc<PgStatsRepository>,
}

impl PgDatabase {
    pub async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self> {
        const MAX_ATTEMPTS: u32 = 5;
        const BASE_DELAY_MS: u64 = 500;

        let mut attempts = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(database_url)
                .await
            {
                Ok(pool) => {
                    run_migrations(&pool).await?;
                    return Ok(Self::from_pool(pool));
                }
                Err(err) => {
                    attempts += 1;
                    if attempts >= MAX_ATTEMPTS {
                        return Err(DbError::Query(err));
                    }

                    let exp = (attempts - 1).min(5);
                    let backoff = Duration::from_millis(BASE_DELAY_MS * (1u64 << exp));
                    warn!(
                        attempts,
                        error = %err,
                        wait_ms = backoff.as_millis(),
                        "database connection failed; retrying"
                    );
                    sleep(backoff).await;
                }
            }
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        let user_repo = Arc::new(PgUserRepository { pool: pool.clone() });
        let project_repo = Arc::new(PgProjectRepository { pool: pool.clone() });
        let contributor_repo = Arc::new(PgContributorRepository { pool: pool.clone() });
        let issue_repo = Arc::new(PgIssueRepository { pool: pool.clone() });
        let comment_repo = Arc::new(PgCommentRepository { pool: pool.clone() });
        let stats_repo = Arc::new(PgStatsRepository { pool });

        Self {
            user_repo,
            project_repo,
            contributor_repo,
            issue_repo,
            comment_repo,
            stats_repo,
        }
    }
}

impl Repositories for PgDatabase {
    fn users(&self) -> &dyn UserRepository {
        &*self.user_repo
    }

    fn projects(&self) -> &dyn ProjectRepository {
        &*self.project_repo
    }

    fn contributors(&self) -> &dyn ContributorRepository {
        &*self.contributor_repo
    }

    fn issues(&self) -> &dyn IssueRepository {
        &*self.issue_repo
    }

    fn comments(&self) -> &dyn CommentRepository {
        &*self.comment_repo
    }

    fn stats(&self) -> &dyn StatsRepository {
        &*self.stats_repo
    }
}

#[derive(Clone)]
struct PgUserRepository {
    pool: PgPool,
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create(&self, user: NewUser) -> Result<UserRow> {
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, password_hash, birth_date, can_be_contacted, can_data_be_shared)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, email, password_hash, birth_date, can_be_contacted,
                      can_data_be_shared, created_time
            "#,
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.birth_date)
        .bind(user.can_be_contacted)
        .bind(user.can_data_be_shared)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_hash, birth_date, can_be_contacted,
                   can_data_be_shared, created_time
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_hash, birth_date, can_be_contacted,
                   can_data_be_shared, created_time
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn list(&self, page: Page) -> Result<Vec<UserRow>> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_hash, birth_date, can_be_contacted,
                   can_data_be_shared, created_time
            FROM users
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    #[instrument(skip(self, update))]
    async fn update(&self, id: i64, update: UserUpdate) -> Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                birth_date = CASE WHEN $5 THEN $6 ELSE birth_date END,
                can_be_contacted = COALESCE($7, can_be_contacted),
                can_data_be_shared = COALESCE($8, can_data_be_shared)
            WHERE id = $1
            RETURNING id, username, email, password_hash, birth_date, can_be_contacted,
                      can_data_be_shared, created_time
            "#,
        )
        .bind(id)
        .bind(update.username)
        .bind(update.email)
        .bind(update.password_hash)
        .bind(update.birth_date.is_some())
        .bind(update.birth_date.flatten())
        .bind(update.can_be_contacted)
        .bind(update.can_data_be_shared)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<bool> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected() > 0)
            .map_err(DbError::Query)
    }
}

#[derive(Clone)]
struct PgProjectRepository {
    pool: PgPool,
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    #[instrument(skip(self, project), fields(author_id = project.author_id))]
    async fn create(&self, project: NewProject) -> Result<ProjectRow> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            INSERT INTO projects (title, description, project_type, author_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, description, project_type, author_id, created_time
            "#,
        )
        .bind(project.title)
        .bind(project.description)
        .bind(project.project_type)
        .bind(project.author_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO contributors (project_id, user_id) VALUES ($1, $2)")
            .bind(row.id)
            .bind(row.author_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn get(&self, id: i64) -> Result<Option<ProjectRow>> {
        sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id, title, description, project_type, author_id, created_time
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn list_for_user(&self, user_id: i64, page: Page) -> Result<Vec<ProjectRow>> {
        sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT p.id, p.title, p.description, p.project_type, p.author_id, p.created_time
            FROM projects p
            WHERE p.author_id = $1
               OR EXISTS (
                    SELECT 1 FROM contributors c
                    WHERE c.project_id = p.id AND c.user_id = $1
               )
            ORDER BY p.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    #[instrument(skip(self, update))]
    async fn update(&self, id: i64, update: ProjectUpdate) -> Result<Option<ProjectRow>> {
        sqlx::query_as::<_, ProjectRow>(
            r#"
            UPDATE projects
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                project_type = COALESCE($4, project_type)
            WHERE id = $1
            RETURNING id, title, description, project_type, author_id, created_time
            "#,
        )
        .bind(id)
        .bind(update.title)
        .bind(update.description)
        .bind(update.project_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<bool> {
        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected() > 0)
            .map_err(DbError::Query)
    }
}

#[derive(Clone)]
struct PgContributorRepository {
    pool: PgPool,
}

#[async_trait]
impl ContributorRepository for PgContributorRepository {
    #[instrument(skip(self))]
    async fn add(&self, project_id: i64, user_id: i64) -> Result<ContributorRow> {
        sqlx::query_as::<_, ContributorRow>(
            r#"
            WITH inserted AS (
                INSERT INTO contributors (project_id, user_id)
                VALUES ($1, $2)
                RETURNING id, user_id, project_id, created_time
            )
            SELECT i.id, i.user_id, i.project_id, u.username, i.created_time
            FROM inserted i
            JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)
    }

    async fn get(&self, project_id: i64, contributor_id: i64) -> Result<Option<ContributorRow>> {
        sqlx::query_as::<_, ContributorRow>(
            r#"
            SELECT c.id, c.user_id, c.project_id, u.username, c.created_time
            FROM contributors c
            JOIN users u ON u.id = c.user_id
            WHERE c.project_id = $1 AND c.id = $2
            "#,
        )
        .bind(project_id)
        .bind(contributor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn list_by_project(&self, project_id: i64, page: Page) -> Result<Vec<ContributorRow>> {
        sqlx::query_as::<_, ContributorRow>(
            r#"
            SELECT c.id, c.user_id, c.project_id, u.username, c.created_time
            FROM contributors c
            JOIN users u ON u.id = c.user_id
            WHERE c.project_id = $1
            ORDER BY c.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(project_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn is_contributor(&self, project_id: i64, user_id: i64) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM contributors WHERE project_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn list_all_by_project(&self, project_id: i64) -> Result<Vec<ContributorRow>> {
        sqlx::query_as::<_, ContributorRow>(
            r#"
            SELECT c.id, c.user_id, c.project_id, u.username, c.created_time
            FROM contributors c
            JOIN users u ON u.id = c.user_id
            WHERE c.project_id = $1
            ORDER BY c.id
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Also unassigns the removed member from the project's issues.
    #[instrument(skip(self))]
    async fn remove(&self, project_id: i64, contributor_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let removed_user = sqlx::query_scalar::<_, i64>(
            "DELETE FROM contributors WHERE project_id = $1 AND id = $2 RETURNING user_id",
        )
        .bind(project_id)
        .bind(contributor_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_id) = removed_user else {
            return Ok(false);
        };

        let unassigned = sqlx::query(
            "UPDATE issues SET assignee_id = NULL WHERE project_id = $1 AND assignee_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        debug!(project_id, user_id, unassigned, "removed contributor");
        Ok(true)
    }
}

#[derive(Clone)]
struct PgIssueRepository {
    pool: PgPool,
}

#[async_trait]
impl IssueRepository for PgIssueRepository {
    #[instrument(skip(self, issue), fields(project_id = issue.project_id))]
    async fn create(&self, issue: NewIssue) -> Result<IssueRow> {
        sqlx::query_as::<_, IssueRow>(
            r#"
            INSERT INTO issues (
                project_id, author_id, assignee_id, title, description, tag, priority, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, project_id, author_id, assignee_id, title, description, tag,
                      priority, status, created_time
            "#,
        )
        .bind(issue.project_id)
        .bind(issue.author_id)
        .bind(issue.assignee_id)
        .bind(issue.title)
        .bind(issue.description)
        .bind(issue.tag)
        .bind(issue.priority)
        .bind(issue.status)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)
    }

    async fn get(&self, project_id: i64, issue_id: i64) -> Result<Option<IssueRow>> {
        sqlx::query_as::<_, IssueRow>(
            r#"
            SELECT id, project_id, author_id, assignee_id, title, description, tag,
                   priority, status, created_time
            FROM issues
            WHERE project_id = $1 AND id = $2
            "#,
        )
        .bind(project_id)
        .bind(issue_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn list_by_project(&self, project_id: i64, page: Page) -> Result<Vec<IssueRow>> {
        sqlx::query_as::<_, IssueRow>(
            r#"
            SELECT id, project_id, author_id, assignee_id, title, description, tag,
                   priority, status, created_time
            FROM issues
            WHERE project_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(project_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    #[instrument(skip(self, update))]
    async fn update(
        &self,
        project_id: i64,
        issue_id: i64,
        update: IssueUpdate,
    ) -> Result<Option<IssueRow>> {
        sqlx::query_as::<_, IssueRow>(
            r#"
            UPDATE issues
            SET assignee_id = CASE WHEN $3 THEN $4 ELSE assignee_id END,
                title = COALESCE($5, title),
                description = COALESCE($6, description),
                tag = COALESCE($7, tag),
                priority = COALESCE($8, priority),
                status = COALESCE($9, status)
            WHERE project_id = $1 AND id = $2
            RETURNING id, project_id, author_id, assignee_id, title, description, tag,
                      priority, status, created_time
            "#,
        )
        .bind(project_id)
        .bind(issue_id)
        .bind(update.assignee_id.is_some())
        .bind(update.assignee_id.flatten())
        .bind(update.title)
        .bind(update.description)
        .bind(update.tag)
        .bind(update.priority)
        .bind(update.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)
    }

    #[instrument(skip(self))]
    async fn delete(&self, project_id: i64, issue_id: i64) -> Result<bool> {
        sqlx::query("DELETE FROM issues WHERE project_id = $1 AND id = $2")
            .bind(project_id)
            .bind(issue_id)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected() > 0)
            .map_err(DbError::Query)
    }
}

#[derive(Clone)]
struct PgCommentRepository {
    pool: PgPool,
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    #[instrument(skip(self, comment), fields(issue_id = comment.issue_id))]
    async fn create(&self, comment: NewComment) -> Result<CommentRow> {
        sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (uuid, issue_id, author_id, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, uuid, issue_id, author_id, description, created_time
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(comment.issue_id)
        .bind(comment.author_id)
        .bind(comment.description)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)
    }

    async fn get(&self, issue_id: i64, comment_id: i64) -> Result<Option<CommentRow>> {
        sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, uuid, issue_id, author_id, description, created_time
            FROM comments
            WHERE issue_id = $1 AND id = $2
            "#,
        )
        .bind(issue_id)
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn list_by_issue(&self, issue_id: i64, page: Page) -> Result<Vec<CommentRow>> {
        sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, uuid, issue_id, author_id, description, created_time
            FROM comments
            WHERE issue_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(issue_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    #[instrument(skip(self, update))]
    async fn update(
        &self,
        issue_id: i64,
        comment_id: i64,
        update: CommentUpdate,
    ) -> Result<Option<CommentRow>> {
        sqlx::query_as::<_, CommentRow>(
            r#"
            UPDATE comments
            SET description = COALESCE($3, description)
            WHERE issue_id = $1 AND id = $2
            RETURNING id, uuid, issue_id, author_id, description, created_time
            "#,
        )
        .bind(issue_id)
        .bind(comment_id)
        .bind(update.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    #[instrument(skip(self))]
    async fn delete(&self, issue_id: i64, comment_id: i64) -> Result<bool> {
        sqlx::query("DELETE FROM comments WHERE issue_id = $1 AND id = $2")
            .bind(issue_id)
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected() > 0)
            .map_err(DbError::Query)
    }
}

#[derive(Clone)]
struct PgStatsRepository {
    pool: PgPool,
}

#[async_trait]
impl StatsRepository for PgStatsRepository {
    async fn entity_counts(&self) -> Result<EntityCounts> {
        let (users, projects, issues, comments) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM projects),
                (SELECT COUNT(*) FROM issues),
                (SELECT COUNT(*) FROM comments)
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(EntityCounts {
            users,
            projects,
            issues,
            comments,
        })
    }
}
