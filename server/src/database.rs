// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool, migrate::MigrateDatabase};
use std::path::Path;
use taskboard_common::{
    CreateTaskPayload, Task, TaskTransition, UpdateProfilePayload, UpdateTaskPayload,
    UpdateUserPayload, User,
};
use tracing::{debug, info};

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        is_admin BOOLEAN NOT NULL DEFAULT 0,
        is_superadmin BOOLEAN NOT NULL DEFAULT 0,
        avatar_url TEXT NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL REFERENCES users(id),
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        state TEXT NOT NULL,
        due_date TIMESTAMP WITH TIME ZONE NULL,
        reward TEXT NULL,
        created_at TIMESTAMP NOT NULL,
        started_at TIMESTAMP WITH TIME ZONE NULL,
        completed_at TIMESTAMP WITH TIME ZONE NULL
    );
    "#,
];

const USER_COLUMNS: &str =
    "id, email, is_active, is_admin, is_superadmin, avatar_url, created_at, updated_at";

/// A user row together with its stored password hash. Only used by the login flow.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}

/// Establishes the database connection pool.
/// If the database does not exist, it creates it (and its parent directory).
/// It also ensures the `users` and `tasks` tables exist.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        if let Some(parent) = database_file_path(database_url).and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
        }
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// A private in-memory database. The pool holds exactly one connection that
/// never expires, since every SQLite `:memory:` connection is its own database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("Failed to open in-memory database")?;

    init_schema(&pool).await?;
    Ok(pool)
}

fn database_file_path(database_url: &str) -> Option<&Path> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(Path::new(path))
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to create schema")?;
    }
    info!("'users' and 'tasks' tables are ready.");
    Ok(())
}

// --- Users ---

/// Inserts a new, active user.
pub async fn create_user_in_db(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
    is_admin: bool,
    is_superadmin: bool,
) -> Result<User> {
    let now = Utc::now();
    debug!(
        "Insert user: email={}, is_admin={}, is_superadmin={}",
        email, is_admin, is_superadmin
    );

    let id = sqlx::query(
        "INSERT INTO users (email, password_hash, is_active, is_admin, is_superadmin, avatar_url, created_at, updated_at) VALUES (?, ?, 1, ?, ?, NULL, ?, ?)",
    )
    .bind(email)
    .bind(password_hash)
    .bind(is_admin)
    .bind(is_superadmin)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert user into DB")?
    .last_insert_rowid();

    Ok(User {
        id,
        email: email.to_string(),
        is_active: true,
        is_admin,
        is_superadmin,
        avatar_url: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?");
    sqlx::query_as::<_, UserRecord>(&query)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to look up user by email")
}

pub async fn get_user_from_db(pool: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    sqlx::query_as::<_, User>(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to retrieve user with ID: {user_id}"))
}

pub async fn list_users_from_db(pool: &SqlitePool) -> Result<Vec<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC");
    sqlx::query_as::<_, User>(&query)
        .fetch_all(pool)
        .await
        .context("Failed to list users")
}

/// Applies an admin update. Returns `None` when the user does not exist.
pub async fn update_user_in_db(
    pool: &SqlitePool,
    user_id: i64,
    payload: &UpdateUserPayload,
) -> Result<Option<User>> {
    let result = sqlx::query(
        "UPDATE users SET is_active = COALESCE(?, is_active), is_admin = COALESCE(?, is_admin), updated_at = ? WHERE id = ?",
    )
    .bind(payload.is_active)
    .bind(payload.is_admin)
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to update user with ID: {user_id}"))?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_user_from_db(pool, user_id).await
}

pub async fn update_profile_in_db(
    pool: &SqlitePool,
    user_id: i64,
    payload: &UpdateProfilePayload,
) -> Result<Option<User>> {
    let result = sqlx::query("UPDATE users SET avatar_url = ?, updated_at = ? WHERE id = ?")
        .bind(&payload.avatar_url)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to update profile of user with ID: {user_id}"))?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_user_from_db(pool, user_id).await
}

// --- Tasks ---

/// Retrieves the tasks of one owner. Archived tasks are only included on request.
pub async fn list_tasks_from_db(
    pool: &SqlitePool,
    owner_id: i64,
    include_archived: bool,
) -> Result<Vec<Task>> {
    let query = if include_archived {
        "SELECT * FROM tasks WHERE owner_id = ? ORDER BY id ASC"
    } else {
        "SELECT * FROM tasks WHERE owner_id = ? AND state != 'archived' ORDER BY id ASC"
    };

    sqlx::query_as::<_, Task>(query)
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .context("Failed to retrieve tasks from DB")
}

pub async fn get_task_from_db(
    pool: &SqlitePool,
    owner_id: i64,
    task_id: i64,
) -> Result<Option<Task>> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ? AND owner_id = ?")
        .bind(task_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to retrieve task with ID: {task_id}"))
}

/// Inserts a new task into the database. New tasks always start as `todo`.
pub async fn create_task_in_db(
    pool: &SqlitePool,
    owner_id: i64,
    payload: CreateTaskPayload,
) -> Result<Task> {
    let created_at = Utc::now();

    debug!(
        "Insert values: owner_id={}, title={}, due_date={:?}, reward={:?}, created_at={}",
        owner_id, payload.title, payload.due_date, payload.reward, created_at
    );

    let id = sqlx::query(
        "INSERT INTO tasks (owner_id, title, description, state, due_date, reward, created_at, started_at, completed_at) VALUES (?, ?, ?, 'todo', ?, ?, ?, NULL, NULL)",
    )
    .bind(owner_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.due_date)
    .bind(&payload.reward)
    .bind(created_at)
    .execute(pool)
    .await
    .context("Failed to insert task into DB")?
    .last_insert_rowid();

    Ok(Task {
        id,
        owner_id,
        title: payload.title,
        description: payload.description,
        state: taskboard_common::TaskState::Todo,
        due_date: payload.due_date,
        created_at,
        reward: payload.reward,
        started_at: None,
        completed_at: None,
    })
}

/// Updates the editable fields of a task. Returns `None` if the task does not
/// exist or belongs to someone else.
pub async fn update_task_in_db(
    pool: &SqlitePool,
    owner_id: i64,
    task_id: i64,
    payload: &UpdateTaskPayload,
) -> Result<Option<Task>> {
    let result = sqlx::query(
        "UPDATE tasks SET title = COALESCE(?, title), description = COALESCE(?, description), due_date = COALESCE(?, due_date), reward = COALESCE(?, reward) WHERE id = ? AND owner_id = ?",
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.due_date)
    .bind(&payload.reward)
    .bind(task_id)
    .bind(owner_id)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to update task with ID: {task_id}"))?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_task_from_db(pool, owner_id, task_id).await
}

/// Moves a task to the target state of `transition`, from whatever state it is in.
///
/// `start` keeps the first `started_at`, `complete` stamps `completed_at` and
/// `reopen` clears it.
pub async fn transition_task_in_db(
    pool: &SqlitePool,
    owner_id: i64,
    task_id: i64,
    transition: TaskTransition,
) -> Result<Option<Task>> {
    let query = match transition {
        TaskTransition::Start => {
            "UPDATE tasks SET state = ?, started_at = COALESCE(started_at, ?) WHERE id = ? AND owner_id = ?"
        }
        TaskTransition::Complete => {
            "UPDATE tasks SET state = ?, completed_at = ? WHERE id = ? AND owner_id = ?"
        }
        TaskTransition::Archive => {
            "UPDATE tasks SET state = ? WHERE id = ? AND owner_id = ?"
        }
        TaskTransition::Reopen => {
            "UPDATE tasks SET state = ?, completed_at = NULL WHERE id = ? AND owner_id = ?"
        }
    };
    let now = Utc::now();
    let target = transition.target_state();

    debug!(
        "Applying '{}' to task {} (-> {})",
        transition.as_str(),
        task_id,
        target
    );

    let statement = sqlx::query(query).bind(target);
    let statement = match transition {
        TaskTransition::Start | TaskTransition::Complete => statement.bind(now),
        TaskTransition::Archive | TaskTransition::Reopen => statement,
    };
    let result = statement
        .bind(task_id)
        .bind(owner_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to apply transition to task with ID: {task_id}"))?;

    info!(
        "Transition '{}' affected {} rows for task ID: {}",
        transition.as_str(),
        result.rows_affected(),
        task_id
    );

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_task_from_db(pool, owner_id, task_id).await
}

/// Permanently removes every archived task, across all owners.
pub async fn purge_archived_tasks_in_db(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM tasks WHERE state = 'archived'")
        .execute(pool)
        .await
        .context("Failed to purge archived tasks")?;

    let purged = result.rows_affected();
    info!("Purged {} archived tasks.", purged);
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use taskboard_common::TaskState;

    async fn setup_test_db() -> (SqlitePool, User) {
        let pool = connect_in_memory().await.unwrap();
        let owner = create_user_in_db(&pool, "owner@example.com", "hash", false, false)
            .await
            .unwrap();
        (pool, owner)
    }

    fn payload(title: &str) -> CreateTaskPayload {
        CreateTaskPayload {
            title: title.to_string(),
            description: "Test the database".to_string(),
            due_date: Some(Utc.with_ymd_and_hms(2023, 12, 31, 18, 0, 0).unwrap()),
            reward: Some("Cake".to_string()),
        }
    }

    #[test]
    fn test_database_file_path() {
        assert_eq!(
            database_file_path("sqlite://database/taskboard.db"),
            Some(Path::new("database/taskboard.db"))
        );
        assert_eq!(
            database_file_path("sqlite:data.db?mode=rwc"),
            Some(Path::new("data.db"))
        );
        assert_eq!(database_file_path("sqlite::memory:"), None);
    }

    #[tokio::test]
    async fn test_establish_connection_pool_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("taskboard.db");
        let url = format!("sqlite://{}", db_path.display());

        let pool = establish_connection_pool(&url).await.unwrap();
        assert!(db_path.exists());
        assert!(list_users_from_db(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_and_get_task() {
        let (pool, owner) = setup_test_db().await;

        let created = create_task_in_db(&pool, owner.id, payload("Buy milk"))
            .await
            .unwrap();
        assert!(created.id > 0);
        assert_eq!(created.state, TaskState::Todo);

        let fetched = get_task_from_db(&pool, owner.id, created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.title, "Buy milk");
        assert_eq!(fetched.due_date, created.due_date);
        assert_eq!(fetched.reward.as_deref(), Some("Cake"));

        // Other users cannot see it.
        assert!(get_task_from_db(&pool, owner.id + 1, created.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_excludes_archived_unless_requested() {
        let (pool, owner) = setup_test_db().await;
        let kept = create_task_in_db(&pool, owner.id, payload("Kept"))
            .await
            .unwrap();
        let archived = create_task_in_db(&pool, owner.id, payload("Archived"))
            .await
            .unwrap();
        transition_task_in_db(&pool, owner.id, archived.id, TaskTransition::Archive)
            .await
            .unwrap();

        let visible = list_tasks_from_db(&pool, owner.id, false).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, kept.id);

        let all = list_tasks_from_db(&pool, owner.id, true).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_transitions_stamp_timestamps() {
        let (pool, owner) = setup_test_db().await;
        let task = create_task_in_db(&pool, owner.id, payload("Lifecycle"))
            .await
            .unwrap();

        let started = transition_task_in_db(&pool, owner.id, task.id, TaskTransition::Start)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(started.state, TaskState::InProgress);
        assert!(started.started_at.is_some());

        let done = transition_task_in_db(&pool, owner.id, task.id, TaskTransition::Complete)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.state, TaskState::Done);
        assert!(done.completed_at.is_some());
        assert_eq!(done.started_at, started.started_at);

        let archived = transition_task_in_db(&pool, owner.id, task.id, TaskTransition::Archive)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(archived.state, TaskState::Archived);
        assert_eq!(archived.completed_at, done.completed_at);

        let reopened = transition_task_in_db(&pool, owner.id, task.id, TaskTransition::Reopen)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reopened.state, TaskState::Todo);
        assert!(reopened.completed_at.is_none());

        assert!(transition_task_in_db(&pool, owner.id, 9999, TaskTransition::Start)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_task_keeps_untouched_fields() {
        let (pool, owner) = setup_test_db().await;
        let task = create_task_in_db(&pool, owner.id, payload("Original"))
            .await
            .unwrap();
        let new_due = Utc::now() + Duration::days(3);

        let updated = update_task_in_db(
            &pool,
            owner.id,
            task.id,
            &UpdateTaskPayload {
                title: Some("Renamed".to_string()),
                due_date: Some(new_due),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description, "Test the database");
        assert_eq!(updated.reward.as_deref(), Some("Cake"));
        assert_eq!(
            updated.due_date.map(|d| d.timestamp()),
            Some(new_due.timestamp())
        );
    }

    #[tokio::test]
    async fn test_purge_archived_tasks() {
        let (pool, owner) = setup_test_db().await;
        for title in ["One", "Two", "Three"] {
            let task = create_task_in_db(&pool, owner.id, payload(title))
                .await
                .unwrap();
            if title != "Two" {
                transition_task_in_db(&pool, owner.id, task.id, TaskTransition::Archive)
                    .await
                    .unwrap();
            }
        }

        assert_eq!(purge_archived_tasks_in_db(&pool).await.unwrap(), 2);
        let remaining = list_tasks_from_db(&pool, owner.id, true).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "Two");
    }

    #[tokio::test]
    async fn test_users_round_trip() {
        let (pool, owner) = setup_test_db().await;

        let record = find_user_by_email(&pool, "owner@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.user.id, owner.id);
        assert_eq!(record.password_hash, "hash");

        let updated = update_user_in_db(
            &pool,
            owner.id,
            &UpdateUserPayload {
                is_active: Some(false),
                is_admin: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!updated.is_active);
        assert!(!updated.is_admin);

        let profile = update_profile_in_db(
            &pool,
            owner.id,
            &UpdateProfilePayload {
                avatar_url: Some("https://example.com/a.png".to_string()),
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(profile.avatar_url.as_deref(), Some("https://example.com/a.png"));

        assert!(update_user_in_db(&pool, 4242, &UpdateUserPayload::default())
            .await
            .unwrap()
            .is_none());
        assert_eq!(list_users_from_db(&pool).await.unwrap().len(), 1);
    }
}
