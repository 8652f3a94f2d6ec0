// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth::{AdminUser, AuthUser, hash_password};
use crate::database;
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use taskboard_common::{
    CreateTaskPayload, CreateUserPayload, PurgeReport, Task, TaskTransition, UpdateProfilePayload,
    UpdateTaskPayload, UpdateUserPayload, User,
};
use tracing::{debug, error, info};

#[derive(Deserialize, Debug, Default)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub include_archived: bool,
}

/// Handler for listing the caller's tasks.
pub async fn list_tasks(
    State(pool): State<SqlitePool>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = database::list_tasks_from_db(&pool, user.id, query.include_archived).await?;
    info!(
        "Successfully retrieved {} tasks for user ID {} (include_archived={}).",
        tasks.len(),
        user.id,
        query.include_archived
    );
    Ok(Json(tasks))
}

/// Handler for creating a new task.
pub async fn create_task(
    State(pool): State<SqlitePool>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateTaskPayload>, // Extracting the request body as JSON
) -> Result<(StatusCode, Json<Task>), AppError> {
    debug!("Received request to create task: {}", payload.title);
    if payload.title.trim().is_empty() {
        error!("Validation failed: Task title is empty.");
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "Task title cannot be empty.",
        ));
    }

    let new_task = database::create_task_in_db(&pool, user.id, payload).await?;

    info!("Task created successfully with ID: {}", new_task.id);

    // Return a 201 Created status with the new task as JSON.
    Ok((StatusCode::CREATED, Json(new_task)))
}

pub async fn get_task(
    State(pool): State<SqlitePool>,
    AuthUser(user): AuthUser,
    Path(task_id): Path<i64>,
) -> Result<Json<Task>, AppError> {
    database::get_task_from_db(&pool, user.id, task_id)
        .await?
        .map(Json)
        .ok_or_else(|| task_not_found(task_id))
}

pub async fn update_task(
    State(pool): State<SqlitePool>,
    AuthUser(user): AuthUser,
    Path(task_id): Path<i64>,
    Json(payload): Json<UpdateTaskPayload>,
) -> Result<Json<Task>, AppError> {
    debug!("Received update for task ID: {}", task_id);
    if payload.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        error!("Validation failed: Task title is empty.");
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "Task title cannot be empty.",
        ));
    }

    let task = database::update_task_in_db(&pool, user.id, task_id, &payload)
        .await?
        .ok_or_else(|| task_not_found(task_id))?;
    info!("Task with ID {} updated.", task_id);
    Ok(Json(task))
}

pub async fn start_task(
    pool: State<SqlitePool>,
    user: AuthUser,
    task_id: Path<i64>,
) -> Result<Json<Task>, AppError> {
    transition_task(pool, user, task_id, TaskTransition::Start).await
}

pub async fn complete_task(
    pool: State<SqlitePool>,
    user: AuthUser,
    task_id: Path<i64>,
) -> Result<Json<Task>, AppError> {
    transition_task(pool, user, task_id, TaskTransition::Complete).await
}

pub async fn archive_task(
    pool: State<SqlitePool>,
    user: AuthUser,
    task_id: Path<i64>,
) -> Result<Json<Task>, AppError> {
    transition_task(pool, user, task_id, TaskTransition::Archive).await
}

pub async fn reopen_task(
    pool: State<SqlitePool>,
    user: AuthUser,
    task_id: Path<i64>,
) -> Result<Json<Task>, AppError> {
    transition_task(pool, user, task_id, TaskTransition::Reopen).await
}

async fn transition_task(
    State(pool): State<SqlitePool>,
    AuthUser(user): AuthUser,
    Path(task_id): Path<i64>,
    transition: TaskTransition,
) -> Result<Json<Task>, AppError> {
    let task = database::transition_task_in_db(&pool, user.id, task_id, transition)
        .await?
        .ok_or_else(|| task_not_found(task_id))?;
    info!("Task with ID {} is now {}.", task.id, task.state);
    Ok(Json(task))
}

/// Handler for deleting a task by ID. Tasks are archived, never removed.
pub async fn delete_task(
    State(pool): State<SqlitePool>,
    AuthUser(user): AuthUser,
    Path(task_id): Path<i64>, // Extract task ID from the URL path
) -> Result<StatusCode, AppError> {
    debug!("Attempting to delete task with ID: {}", task_id);

    match database::transition_task_in_db(&pool, user.id, task_id, TaskTransition::Archive).await? {
        Some(_) => {
            info!("Task with ID {} archived on delete.", task_id);
            Ok(StatusCode::NO_CONTENT) // 204 No Content for successful deletion
        }
        None => Err(task_not_found(task_id)),
    }
}

/// Handler for the printable, plain-text version of a task.
pub async fn print_task(
    State(pool): State<SqlitePool>,
    AuthUser(user): AuthUser,
    Path(task_id): Path<i64>,
) -> Result<String, AppError> {
    let task = database::get_task_from_db(&pool, user.id, task_id)
        .await?
        .ok_or_else(|| task_not_found(task_id))?;
    Ok(render_ticket(&task))
}

fn render_ticket(task: &Task) -> String {
    let mut ticket = format!("#{} {}\n", task.id, task.title);
    ticket.push_str(&format!("State:   {}\n", task.state.as_str().replace('_', " ")));
    if let Some(due) = task.due_date {
        ticket.push_str(&format!("Due:     {}\n", due.format("%Y-%m-%d %H:%M UTC")));
    }
    if let Some(reward) = task.reward.as_deref().filter(|r| !r.is_empty()) {
        ticket.push_str(&format!("Reward:  {reward}\n"));
    }
    ticket.push_str(&format!(
        "Created: {}\n",
        task.created_at.format("%Y-%m-%d %H:%M UTC")
    ));
    if !task.description.is_empty() {
        ticket.push_str("--------------------------------\n");
        ticket.push_str(&task.description);
        ticket.push('\n');
    }
    ticket
}

// --- Profile ---

pub async fn get_profile(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

pub async fn update_profile(
    State(pool): State<SqlitePool>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<User>, AppError> {
    let updated = database::update_profile_in_db(&pool, user.id, &payload)
        .await?
        .ok_or_else(|| user_not_found(user.id))?;
    info!("Profile of user ID {} updated.", user.id);
    Ok(Json(updated))
}

// --- Admin ---

pub async fn list_users(
    State(pool): State<SqlitePool>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<User>>, AppError> {
    let users = database::list_users_from_db(&pool).await?;
    info!("Successfully retrieved {} users.", users.len());
    Ok(Json(users))
}

pub async fn create_user(
    State(pool): State<SqlitePool>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreateUserPayload>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let email = payload.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "A valid email address is required.",
        ));
    }
    if payload.password.len() < 8 {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters long.",
        ));
    }
    if payload.is_admin && !admin.is_superadmin {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "Only a superadmin can grant administrator rights.",
        ));
    }
    if database::find_user_by_email(&pool, email).await?.is_some() {
        return Err(AppError::new(
            StatusCode::CONFLICT,
            &format!("A user with email {email} already exists."),
        ));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = database::create_user_in_db(&pool, email, &password_hash, payload.is_admin, false)
        .await?;
    info!("User {} created by admin ID {}.", user.id, admin.id);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(pool): State<SqlitePool>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<Json<User>, AppError> {
    let target = database::get_user_from_db(&pool, user_id)
        .await?
        .ok_or_else(|| user_not_found(user_id))?;

    if payload.is_admin.is_some() && !admin.is_superadmin {
        error!("Admin ID {} tried to change admin rights.", admin.id);
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "Only a superadmin can change administrator rights.",
        ));
    }
    if target.is_superadmin && !admin.is_superadmin {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "Only a superadmin can modify a superadmin account.",
        ));
    }

    let updated = database::update_user_in_db(&pool, user_id, &payload)
        .await?
        .ok_or_else(|| user_not_found(user_id))?;
    info!("User {} updated by admin ID {}.", user_id, admin.id);
    Ok(Json(updated))
}

/// Database maintenance: drops every archived task for good.
pub async fn purge_archived(
    State(pool): State<SqlitePool>,
    AdminUser(admin): AdminUser,
) -> Result<Json<PurgeReport>, AppError> {
    debug!("Admin ID {} requested an archive purge.", admin.id);
    let purged = database::purge_archived_tasks_in_db(&pool).await?;
    Ok(Json(PurgeReport { purged }))
}

fn task_not_found(task_id: i64) -> AppError {
    error!("Task with ID {} not found.", task_id);
    AppError::new(
        StatusCode::NOT_FOUND,
        &format!("Task with ID {task_id} not found."),
    )
}

fn user_not_found(user_id: i64) -> AppError {
    AppError::new(
        StatusCode::NOT_FOUND,
        &format!("User with ID {user_id} not found."),
    )
}

// --- Custom Error Handling ---

/// Our custom error type for the application.
#[derive(Debug)]
pub struct AppError {
    code: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.code
    }
}

/// Allows converting an `anyhow::Error` (coming from `database.rs`)
/// into our `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Log the internal error for debugging.
        tracing::error!("Internal server error: {:?}", err);
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred.".to_string(),
        }
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(
            "Responding with error: status_code={}, message={}",
            self.code.as_u16(),
            self.message
        );
        (
            self.code,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
