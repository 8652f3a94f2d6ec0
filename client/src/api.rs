// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Typed access to the Taskboard REST API.

use crate::authenticator::RequestAuthenticator;
use crate::board::BoardView;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::navigator::{LOGIN_PATH, Navigator, post_login_destination};
use crate::session::{FileCredentialStore, Session};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use taskboard_common::{
    Claims, CreateTaskPayload, CreateUserPayload, LoginPayload, PurgeReport, Task, TaskTransition,
    TokenResponse, UpdateProfilePayload, UpdateTaskPayload, UpdateUserPayload, User, token,
};
use tracing::{debug, info};

/// Every call goes through the [`RequestAuthenticator`], so a 401 anywhere
/// signs the user out.
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: Session,
    navigator: Arc<dyn Navigator>,
    authenticator: RequestAuthenticator,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Session, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let authenticator =
            RequestAuthenticator::new(base_url.clone(), session.clone(), navigator.clone());
        Ok(Self {
            http: Client::new(),
            base_url,
            session,
            navigator,
            authenticator,
        })
    }

    /// Client backed by the credentials file named in `config`.
    pub fn from_config(config: &ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let store = FileCredentialStore::new(&config.credentials_path);
        Self::new(&config.api_url, Session::new(Arc::new(store)), navigator)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::config(format!("invalid API path {path}: {e}")))?;
        Ok(self.http.request(method, url))
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder
            .build()
            .map_err(|e| ClientError::config(format!("could not build request: {e}")))?;
        self.authenticator.execute(&self.http, request).await
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.execute(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    // --- Session ---

    /// Exchanges credentials for a token, stores it, and moves on to the
    /// `returnUrl` of the login view (or home).
    pub async fn login(&self, email: &str, password: &str) -> Result<Claims> {
        let payload = LoginPayload {
            email: email.to_string(),
            password: password.to_string(),
        };
        let token: TokenResponse = self
            .fetch(self.request(Method::POST, "api/auth/token")?.json(&payload))
            .await?;
        let claims = token::decode_unverified(&token.access_token)
            .map_err(|e| ClientError::Decode(format!("access token: {e}")))?;

        self.session.store_token(&token.access_token)?;
        info!("Signed in as {}", claims.email);

        let destination = post_login_destination(&self.navigator.current_location());
        self.navigator.navigate(&destination);
        Ok(claims)
    }

    pub fn logout(&self) -> Result<()> {
        self.session.clear()?;
        self.navigator.navigate(LOGIN_PATH);
        info!("Signed out.");
        Ok(())
    }

    pub async fn me(&self) -> Result<User> {
        self.fetch(self.request(Method::GET, "api/users/me")?).await
    }

    pub async fn update_profile(&self, payload: &UpdateProfilePayload) -> Result<User> {
        self.fetch(self.request(Method::PATCH, "api/users/me")?.json(payload))
            .await
    }

    // --- Tasks ---

    pub async fn list_tasks(&self, include_archived: bool) -> Result<Vec<Task>> {
        let builder = self
            .request(Method::GET, "api/tasks")?
            .query(&[("include_archived", include_archived)]);
        let tasks: Vec<Task> = self.fetch(builder).await?;
        debug!("Fetched {} tasks (include_archived={})", tasks.len(), include_archived);
        Ok(tasks)
    }

    /// Fetches the tasks and organizes them into a board.
    pub async fn load_board(&self, include_archived: bool) -> Result<BoardView> {
        let tasks = self.list_tasks(include_archived).await?;
        Ok(BoardView::new(tasks, include_archived))
    }

    pub async fn get_task(&self, task_id: i64) -> Result<Task> {
        self.fetch(self.request(Method::GET, &format!("api/tasks/{task_id}"))?)
            .await
    }

    pub async fn create_task(&self, payload: &CreateTaskPayload) -> Result<Task> {
        self.fetch(self.request(Method::POST, "api/tasks")?.json(payload))
            .await
    }

    pub async fn update_task(&self, task_id: i64, payload: &UpdateTaskPayload) -> Result<Task> {
        self.fetch(
            self.request(Method::PATCH, &format!("api/tasks/{task_id}"))?
                .json(payload),
        )
        .await
    }

    pub async fn transition_task(&self, task_id: i64, transition: TaskTransition) -> Result<Task> {
        let path = format!("api/tasks/{}/{}", task_id, transition.as_str());
        self.fetch(self.request(Method::POST, &path)?).await
    }

    /// Deleting archives the task on the server.
    pub async fn delete_task(&self, task_id: i64) -> Result<()> {
        self.execute(self.request(Method::DELETE, &format!("api/tasks/{task_id}"))?)
            .await?;
        Ok(())
    }

    pub async fn print_task(&self, task_id: i64) -> Result<String> {
        let response = self
            .execute(self.request(Method::GET, &format!("api/tasks/{task_id}/print"))?)
            .await?;
        response
            .text()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    // --- Admin ---

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.fetch(self.request(Method::GET, "api/admin/users")?).await
    }

    pub async fn create_user(&self, payload: &CreateUserPayload) -> Result<User> {
        self.fetch(self.request(Method::POST, "api/admin/users")?.json(payload))
            .await
    }

    pub async fn update_user(&self, user_id: i64, payload: &UpdateUserPayload) -> Result<User> {
        self.fetch(
            self.request(Method::PATCH, &format!("api/admin/users/{user_id}"))?
                .json(payload),
        )
        .await
    }

    pub async fn purge_archived_tasks(&self) -> Result<PurgeReport> {
        self.fetch(self.request(Method::POST, "api/admin/maintenance/purge-archived")?)
            .await
    }
}

/// Parses the base URL, making sure it ends with `/` so relative paths join under it.
fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ClientError::config(format!("invalid API URL {raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::config(format!("invalid API URL {raw}")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
