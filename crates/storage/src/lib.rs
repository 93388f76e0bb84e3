use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{UserId, Username};

/// Process-wide persistence handle. Cloning shares the same pool.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Waits for in-flight queries and closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Creates a user, or replaces the password of an existing one.
    pub async fn create_user(&self, username: &str, password: &str) -> Result<UserId> {
        let password_hash = hash_password(password)?;
        let rec = sqlx::query(
            "INSERT INTO users (username, password_hash) VALUES (?, ?)
             ON CONFLICT(username) DO UPDATE SET password_hash=excluded.password_hash
             RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to store user '{username}'"))?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn user_exists(&self, username: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Checks a username/password pair. Unknown users verify as `false`.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> Result<bool> {
        let row = sqlx::query("SELECT password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load password hash")?;
        let Some(row) = row else {
            debug!(%username, "credential check for unknown user");
            return Ok(false);
        };
        let stored: String = row.try_get("password_hash")?;
        verify_password(password, &stored)
    }

    pub async fn list_usernames(&self) -> Result<Vec<Username>> {
        let rows = sqlx::query("SELECT username FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .context("failed to list users")?;
        Ok(rows
            .into_iter()
            .map(|row| Username::new(row.get::<String, _>(0)))
            .collect())
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("invalid stored password hash: {e}"))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("failed to verify password: {e}")),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let parent = sqlite_path(database_url)
        .as_deref()
        .and_then(Path::parent)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf);
    if let Some(dir) = parent {
        fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create database directory {}", dir.display()))?;
    }
    Ok(())
}

/// Filesystem location behind a `sqlite:` URL; `None` for in-memory or non-sqlite URLs.
fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let (path, _options) = rest.split_once('?').unwrap_or((rest, ""));
    match path {
        "" | ":memory:" => None,
        path => Some(PathBuf::from(path)),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
