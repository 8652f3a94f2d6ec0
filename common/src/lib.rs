// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod token;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub use token::{Claims, TokenError};

/// Lifecycle state of a task.
///
/// Stored as snake_case text both on the wire and in the database.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskState {
    Todo,
    InProgress,
    Done,
    Archived,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Todo => "todo",
            TaskState::InProgress => "in_progress",
            TaskState::Done => "done",
            TaskState::Archived => "archived",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[allow(clippy::doc_overindented_list_items)]
/// Represents a task within the system.
///
/// Derivation attributes (derive):
/// - `Serialize`, `Deserialize`: Allows conversion to/from JSON.
/// - `sqlx::FromRow`: Allows `sqlx` to create a `Task` instance directly
///    from a database result row.
///
/// `due_date` is decoded leniently: anything that is not a parseable
/// timestamp is read as "no due date".
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Task {
    pub id: i64,

    #[serde(default)]
    pub owner_id: i64,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub state: TaskState,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub due_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub reward: Option<String>,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Structure used to receive task creation data from the API.
/// The state is not part of the payload: new tasks always start as `todo`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateTaskPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reward: Option<String>,
}

/// Partial update of a task's editable fields. `None` leaves a field untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateTaskPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<String>,
}

/// Explicit state transitions a task can go through.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskTransition {
    Start,
    Complete,
    Archive,
    Reopen,
}

impl TaskTransition {
    /// The state a task is in once the transition is applied.
    pub fn target_state(self) -> TaskState {
        match self {
            TaskTransition::Start => TaskState::InProgress,
            TaskTransition::Complete => TaskState::Done,
            TaskTransition::Archive => TaskState::Archived,
            TaskTransition::Reopen => TaskState::Todo,
        }
    }

    /// Path segment used by the REST API (`/api/tasks/{id}/{segment}`).
    pub fn as_str(self) -> &'static str {
        match self {
            TaskTransition::Start => "start",
            TaskTransition::Complete => "complete",
            TaskTransition::Archive => "archive",
            TaskTransition::Reopen => "reopen",
        }
    }
}

/// A user account, as exposed to clients. The password hash never leaves the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub is_superadmin: bool,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Self-service profile update.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateProfilePayload {
    pub avatar_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateUserPayload {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Admin-side account update. `is_admin` may only be changed by a superadmin.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateUserPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub purged: u64,
}

/// Parses a timestamp the way the task API accepts them: RFC 3339, a naive
/// date-time (read as UTC), or a bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(parse_timestamp))
}
