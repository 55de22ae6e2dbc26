#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use api::{build_router, ApiState};
use async_trait::async_trait;
use auth::TokenIssuer;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use db::errors::Result;
use db::*;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

/// Vec-backed stand-in for Postgres that mirrors its constraints and cascades.
#[derive(Default)]
pub struct MemoryRepos {
    store: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    next_id: i64,
    users: Vec<UserRow>,
    projects: Vec<ProjectRow>,
    contributors: Vec<ContributorRow>,
    issues: Vec<IssueRow>,
    comments: Vec<CommentRow>,
}

impl Store {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn drop_issue(&mut self, issue_id: i64) {
        self.issues.retain(|issue| issue.id != issue_id);
        self.comments.retain(|comment| comment.issue_id != issue_id);
    }

    fn drop_project(&mut self, project_id: i64) {
        self.projects.retain(|project| project.id != project_id);
        self.contributors.retain(|c| c.project_id != project_id);
        let issue_ids: Vec<i64> = self
            .issues
            .iter()
            .filter(|issue| issue.project_id == project_id)
            .map(|issue| issue.id)
            .collect();
        for issue_id in issue_ids {
            self.drop_issue(issue_id);
        }
    }
}

fn page_of<T: Clone>(rows: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    rows.skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

impl MemoryRepos {
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }
}

#[async_trait]
impl UserRepository for MemoryRepos {
    async fn create(&self, user: NewUser) -> Result<UserRow> {
        let mut store = self.lock();
        if store.users.iter().any(|u| u.username == user.username) {
            return Err(DbError::Conflict("users_username_key".into()));
        }
        let row = UserRow {
            id: store.id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            birth_date: user.birth_date,
            can_be_contacted: user.can_be_contacted,
            can_data_be_shared: user.can_data_be_shared,
            created_time: Utc::now(),
        };
        store.users.push(row.clone());
        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list(&self, page: Page) -> Result<Vec<UserRow>> {
        Ok(page_of(self.lock().users.iter().cloned(), page))
    }

    async fn update(&self, id: i64, update: UserUpdate) -> Result<Option<UserRow>> {
        let mut store = self.lock();
        if let Some(username) = update.username.as_deref() {
            if store.users.iter().any(|u| u.id != id && u.username == username) {
                return Err(DbError::Conflict("users_username_key".into()));
            }
        }
        let Some(user) = store.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(username) = update.username {
            user.username = username;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(hash) = update.password_hash {
            user.password_hash = hash;
        }
        if let Some(birth_date) = update.birth_date {
            user.birth_date = birth_date;
        }
        if let Some(flag) = update.can_be_contacted {
            user.can_be_contacted = flag;
        }
        if let Some(flag) = update.can_data_be_shared {
            user.can_data_be_shared = flag;
        }
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut store = self.lock();
        let before = store.users.len();
        store.users.retain(|u| u.id != id);
        if store.users.len() == before {
            return Ok(false);
        }
        let authored: Vec<i64> = store
            .projects
            .iter()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        for project_id in authored {
            store.drop_project(project_id);
        }
        store.contributors.retain(|c| c.user_id != id);
        for issue in store.issues.iter_mut() {
            if issue.assignee_id == Some(id) {
                issue.assignee_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl ProjectRepository for MemoryRepos {
    async fn create(&self, project: NewProject) -> Result<ProjectRow> {
        let mut store = self.lock();
        let username = store
            .users
            .iter()
            .find(|u| u.id == project.author_id)
            .map(|u| u.username.clone())
            .ok_or(DbError::Query(sqlx::Error::RowNotFound))?;
        let row = ProjectRow {
            id: store.id(),
            title: project.title,
            description: project.description,
            project_type: project.project_type,
            author_id: project.author_id,
            created_time: Utc::now(),
        };
        let contributor = ContributorRow {
            id: store.id(),
            user_id: project.author_id,
            project_id: row.id,
            username,
            created_time: row.created_time,
        };
        store.projects.push(row.clone());
        store.contributors.push(contributor);
        Ok(row)
    }

    async fn get(&self, id: i64) -> Result<Option<ProjectRow>> {
        Ok(self.lock().projects.iter().find(|p| p.id == id).cloned())
    }

    async fn list_for_user(&self, user_id: i64, page: Page) -> Result<Vec<ProjectRow>> {
        let store = self.lock();
        let visible = store.projects.iter().filter(|p| {
            p.author_id == user_id
                || store
                    .contributors
                    .iter()
                    .any(|c| c.project_id == p.id && c.user_id == user_id)
        });
        Ok(page_of(visible.cloned(), page))
    }

    async fn update(&self, id: i64, update: ProjectUpdate) -> Result<Option<ProjectRow>> {
        let mut store = self.lock();
        let Some(project) = store.projects.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            project.title = title;
        }
        if let Some(description) = update.description {
            project.description = description;
        }
        if let Some(project_type) = update.project_type {
            project.project_type = project_type;
        }
        Ok(Some(project.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut store = self.lock();
        if !store.projects.iter().any(|p| p.id == id) {
            return Ok(false);
        }
        store.drop_project(id);
        Ok(true)
    }
}

#[async_trait]
impl ContributorRepository for MemoryRepos {
    async fn add(&self, project_id: i64, user_id: i64) -> Result<ContributorRow> {
        let mut store = self.lock();
        if store
            .contributors
            .iter()
            .any(|c| c.project_id == project_id && c.user_id == user_id)
        {
            return Err(DbError::Conflict("contributors_project_user_key".into()));
        }
        let username = store
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
            .ok_or(DbError::Query(sqlx::Error::RowNotFound))?;
        let row = ContributorRow {
            id: store.id(),
            user_id,
            project_id,
            username,
            created_time: Utc::now(),
        };
        store.contributors.push(row.clone());
        Ok(row)
    }

    async fn get(&self, project_id: i64, contributor_id: i64) -> Result<Option<ContributorRow>> {
        Ok(self
            .lock()
            .contributors
            .iter()
            .find(|c| c.project_id == project_id && c.id == contributor_id)
            .cloned())
    }

    async fn list_by_project(&self, project_id: i64, page: Page) -> Result<Vec<ContributorRow>> {
        let store = self.lock();
        let rows = store.contributors.iter().filter(|c| c.project_id == project_id);
        Ok(page_of(rows.cloned(), page))
    }

    async fn list_all_by_project(&self, project_id: i64) -> Result<Vec<ContributorRow>> {
        let store = self.lock();
        Ok(store
            .contributors
            .iter()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn is_contributor(&self, project_id: i64, user_id: i64) -> Result<bool> {
        Ok(self
            .lock()
            .contributors
            .iter()
            .any(|c| c.project_id == project_id && c.user_id == user_id))
    }

    async fn remove(&self, project_id: i64, contributor_id: i64) -> Result<bool> {
        let mut store = self.lock();
        let Some(position) = store
            .contributors
            .iter()
            .position(|c| c.project_id == project_id && c.id == contributor_id)
        else {
            return Ok(false);
        };
        let removed = store.contributors.remove(position);
        for issue in store.issues.iter_mut() {
            if issue.project_id == project_id && issue.assignee_id == Some(removed.user_id) {
                issue.assignee_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl IssueRepository for MemoryRepos {
    async fn create(&self, issue: NewIssue) -> Result<IssueRow> {
        let mut store = self.lock();
        let row = IssueRow {
            id: store.id(),
            project_id: issue.project_id,
            author_id: issue.author_id,
            assignee_id: issue.assignee_id,
            title: issue.title,
            description: issue.description,
            tag: issue.tag,
            priority: issue.priority,
            status: issue.status,
            created_time: Utc::now(),
        };
        store.issues.push(row.clone());
        Ok(row)
    }

    async fn get(&self, project_id: i64, issue_id: i64) -> Result<Option<IssueRow>> {
        Ok(self
            .lock()
            .issues
            .iter()
            .find(|i| i.project_id == project_id && i.id == issue_id)
            .cloned())
    }

    async fn list_by_project(&self, project_id: i64, page: Page) -> Result<Vec<IssueRow>> {
        let store = self.lock();
        let rows = store.issues.iter().filter(|i| i.project_id == project_id);
        Ok(page_of(rows.cloned(), page))
    }

    async fn update(
        &self,
        project_id: i64,
        issue_id: i64,
        update: IssueUpdate,
    ) -> Result<Option<IssueRow>> {
        let mut store = self.lock();
        let Some(issue) = store
            .issues
            .iter_mut()
            .find(|i| i.project_id == project_id && i.id == issue_id)
        else {
            return Ok(None);
        };
        if let Some(assignee_id) = update.assignee_id {
            issue.assignee_id = assignee_id;
        }
        if let Some(title) = update.title {
            issue.title = title;
        }
        if let Some(description) = update.description {
            issue.description = description;
        }
        if let Some(tag) = update.tag {
            issue.tag = tag;
        }
        if let Some(priority) = update.priority {
            issue.priority = priority;
        }
        if let Some(status) = update.status {
            issue.status = status;
        }
        Ok(Some(issue.clone()))
    }

    async fn delete(&self, project_id: i64, issue_id: i64) -> Result<bool> {
        let mut store = self.lock();
        if !store
            .issues
            .iter()
            .any(|i| i.project_id == project_id && i.id == issue_id)
        {
            return Ok(false);
        }
        store.drop_issue(issue_id);
        Ok(true)
    }
}

#[async_trait]
impl CommentRepository for MemoryRepos {
    async fn create(&self, comment: NewComment) -> Result<CommentRow> {
        let mut store = self.lock();
        let row = CommentRow {
            id: store.id(),
            uuid: Uuid::new_v4(),
            issue_id: comment.issue_id,
            author_id: comment.author_id,
            description: comment.description,
            created_time: Utc::now(),
        };
        store.comments.push(row.clone());
        Ok(row)
    }

    async fn get(&self, issue_id: i64, comment_id: i64) -> Result<Option<CommentRow>> {
        Ok(self
            .lock()
            .comments
            .iter()
            .find(|c| c.issue_id == issue_id && c.id == comment_id)
            .cloned())
    }

    async fn list_by_issue(&self, issue_id: i64, page: Page) -> Result<Vec<CommentRow>> {
        let store = self.lock();
        let rows = store.comments.iter().filter(|c| c.issue_id == issue_id);
        Ok(page_of(rows.cloned(), page))
    }

    async fn update(
        &self,
        issue_id: i64,
        comment_id: i64,
        update: CommentUpdate,
    ) -> Result<Option<CommentRow>> {
        let mut store = self.lock();
        let Some(comment) = store
            .comments
            .iter_mut()
            .find(|c| c.issue_id == issue_id && c.id == comment_id)
        else {
            return Ok(None);
        };
        if let Some(description) = update.description {
            comment.description = description;
        }
        Ok(Some(comment.clone()))
    }

    async fn delete(&self, issue_id: i64, comment_id: i64) -> Result<bool> {
        let mut store = self.lock();
        let before = store.comments.len();
        store
            .comments
            .retain(|c| !(c.issue_id == issue_id && c.id == comment_id));
        Ok(store.comments.len() != before)
    }
}

#[async_trait]
impl StatsRepository for MemoryRepos {
    async fn entity_counts(&self) -> Result<EntityCounts> {
        let store = self.lock();
        Ok(EntityCounts {
            users: store.users.len() as i64,
            projects: store.projects.len() as i64,
            issues: store.issues.len() as i64,
            comments: store.comments.len() as i64,
        })
    }
}

impl Repositories for MemoryRepos {
    fn users(&self) -> &dyn UserRepository {
        self
    }

    fn projects(&self) -> &dyn ProjectRepository {
        self
    }

    fn contributors(&self) -> &dyn ContributorRepository {
        self
    }

    fn issues(&self) -> &dyn IssueRepository {
        self
    }

    fn comments(&self) -> &dyn CommentRepository {
        self
    }

    fn stats(&self) -> &dyn StatsRepository {
        self
    }
}

pub const PASSWORD: &str = "Sturdy-Pass-42";

pub fn token_issuer() -> TokenIssuer {
    TokenIssuer::new(b"test-signing-secret", Duration::minutes(5), Duration::days(1))
}

pub fn app_with_repos(repositories: Arc<MemoryRepos>, prefix: &str) -> Router {
    common::logging::init_logging("warn");
    let state = Arc::new(ApiState {
        repositories,
        tokens: token_issuer(),
        metrics_path: "/metrics".into(),
        prefix: prefix.into(),
    });
    build_router(state)
}

pub fn app_with_prefix(prefix: &str) -> Router {
    app_with_repos(Arc::new(MemoryRepos::default()), prefix)
}

pub fn app() -> Router {
    app_with_prefix("")
}

pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Reply { status, body }
}

/// Registers `username` and returns `(user_id, access_token)`.
pub async fn signup(app: &Router, username: &str) -> (i64, String) {
    let reply = call(
        app,
        Method::POST,
        "/register/",
        None,
        Some(serde_json::json!({
            "username": username,
            "password": PASSWORD,
            "email": format!("{username}@example.com"),
            "birth_date": "1990-04-12",
            "can_be_contacted": true,
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
    let user_id = reply.body["id"].as_i64().unwrap();

    let login = call(
        app,
        Method::POST,
        "/login/",
        None,
        Some(serde_json::json!({ "username": username, "password": PASSWORD })),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);
    (user_id, login.body["access"].as_str().unwrap().to_string())
}
