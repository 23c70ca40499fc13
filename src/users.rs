//! # User Record Store
//! Small relational table of user records. The sync export reads it in full;
//! `/users` serves it read-only.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use serde::Serialize;

use crate::error::ExportError;

/// One row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: Option<String>,
    pub last_login: Option<String>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read_all(&self) -> Result<Vec<UserRow>, ExportError>;
}

const SAMPLE_USERS: &[(&str, &str)] = &[
    ("demo_user", "demo@example.com"),
    ("test_user", "test@example.com"),
    ("admin", "admin@example.com"),
];

/// SQLite-backed store. Opens a fresh connection per call; rusqlite
/// connections are not `Sync`.
pub struct SqliteUserStore {
    path: PathBuf,
}

impl SqliteUserStore {
    /// Create the table if needed and seed the sample users (insert-or-ignore).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating database dir {}", dir.display()))?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("opening sqlite db {}", path.display()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                last_login TIMESTAMP
            );",
        )
        .context("creating users table")?;
        for (username, email) in SAMPLE_USERS {
            conn.execute(
                "INSERT OR IGNORE INTO users (username, email) VALUES (?1, ?2)",
                (username, email),
            )
            .with_context(|| format!("seeding user {username}"))?;
        }
        tracing::info!(path = %path.display(), "user database initialized");
        Ok(Self { path })
    }

    fn read_all_blocking(path: &Path) -> rusqlite::Result<Vec<UserRow>> {
        let conn = Connection::open(path)?;
        let mut stmt = conn.prepare(
            "SELECT id, username, email, created_at, last_login FROM users ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                created_at: row.get(3)?,
                last_login: row.get(4)?,
            })
        })?;
        let users = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }
}

#[async_trait]
impl RecordStore for SqliteUserStore {
    async fn read_all(&self) -> Result<Vec<UserRow>, ExportError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::read_all_blocking(&path))
            .await
            .map_err(|e| ExportError::RecordStore(format!("reader task: {e}")))?
            .map_err(|e| ExportError::RecordStore(e.to_string()))
    }
}
