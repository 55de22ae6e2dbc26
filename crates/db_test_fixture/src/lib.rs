use std::env;

use anyhow::{Context, Result};
use db::pg::{run_migrations, PgDatabase};
use db::{NewUser, Repositories, UserRow};
use sqlx::{Executor, PgPool};
use tracing::debug;
use uuid::Uuid;

/// Hands out throwaway databases on the server named by `TEST_ADMIN_URL`
/// (or `DATABASE_URL`). The admin URL must not include a database name.
pub struct DbFixture {
    admin_url: String,
}

impl DbFixture {
    pub fn from_env() -> Result<Self> {
        let admin_url = env::var("TEST_ADMIN_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .context("TEST_ADMIN_URL or DATABASE_URL must be set for tests")?;
        Ok(Self {
            admin_url: admin_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn create(&self, prefix: &str) -> Result<DatabaseHandle> {
        let handle = self.create_unmigrated(prefix).await?;
        run_migrations(&handle.pool).await?;
        Ok(handle)
    }

    pub async fn create_unmigrated(&self, prefix: &str) -> Result<DatabaseHandle> {
        let db_name = format!("{}_{}", prefix, Uuid::new_v4().simple());
        let admin_pool = PgPool::connect(&self.admin_url).await?;
        let create_sql = format!("CREATE DATABASE \"{}\"", db_name);
        admin_pool.execute(create_sql.as_str()).await?;
        debug!(database = %db_name, "created test database");

        let url = format!("{}/{}", self.admin_url, db_name);
        let pool = PgPool::connect(&url).await?;
        Ok(DatabaseHandle {
            pool,
            url,
            name: db_name,
            admin_url: self.admin_url.clone(),
        })
    }
}

pub struct DatabaseHandle {
    pool: PgPool,
    url: String,
    name: String,
    admin_url: String,
}

impl DatabaseHandle {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn database_url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> PgDatabase {
        PgDatabase::from_pool(self.pool.clone())
    }

    /// Inserts a user with a placeholder hash; enough for ownership and
    /// membership tests that never log in.
    pub async fn seed_user(&self, username: &str) -> Result<UserRow> {
        let user = self
            .database()
            .users()
            .create(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.test"),
                password_hash: "unused".to_string(),
                birth_date: None,
                can_be_contacted: false,
                can_data_be_shared: false,
            })
            .await?;
        Ok(user)
    }

    pub async fn cleanup(self) -> Result<()> {
        self.pool.close().await;
        let admin_pool = PgPool::connect(&self.admin_url).await?;
        let terminate_sql = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}'",
            self.name
        );
        admin_pool.execute(terminate_sql.as_str()).await?;
        let drop_sql = format!("DROP DATABASE IF EXISTS \"{}\"", self.name);
        admin_pool.execute(drop_sql.as_str()).await?;
        debug!(database = %self.name, "dropped test database");
        Ok(())
    }
}
