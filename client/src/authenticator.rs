// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Outgoing request decoration and the reaction to authentication failures.

use crate::error::{ClientError, Result};
use crate::navigator::{Navigator, is_login_location, login_redirect};
use crate::session::Session;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, Request, Response, Url};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Attaches the bearer credential to requests bound for the backend, and
/// signs the user out when the backend answers 401.
pub struct RequestAuthenticator {
    base_url: Url,
    session: Session,
    navigator: Arc<dyn Navigator>,
}

impl RequestAuthenticator {
    pub fn new(mut base_url: Url, session: Session, navigator: Arc<dyn Navigator>) -> Self {
        // `/v1` must not match `/v1evil/...`.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            session,
            navigator,
        }
    }

    /// Same origin as the backend, under its base path.
    pub fn targets_backend(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin() && url.path().starts_with(self.base_url.path())
    }

    pub fn decorate(&self, mut request: Request) -> Request {
        if !self.targets_backend(request.url()) {
            return request;
        }
        let Some(token) = self.session.token() else {
            return request;
        };

        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("Stored credential is not a valid header value, sending without it."),
        }
        request
    }

    /// Applies the 401 side effects and hands the error back unchanged.
    ///
    /// The credential is cleared every time; the login redirect is skipped when
    /// the user is already on the login view.
    pub fn handle_failure(&self, error: ClientError) -> ClientError {
        if !error.is_unauthorized() {
            return error;
        }

        if let Err(e) = self.session.clear() {
            warn!("Could not clear the stored credential: {}", e);
        }
        let current = self.navigator.current_location();
        if is_login_location(&current) {
            debug!("Authentication failed while on the login view.");
        } else {
            info!("Authentication failed, redirecting to login from {}.", current);
            self.navigator.navigate(&login_redirect(&current));
        }
        error
    }

    /// Sends `request` through `client`. Non-success responses and transport
    /// failures come back as [`ClientError::Network`]. Nothing is retried.
    pub async fn execute(&self, client: &Client, request: Request) -> Result<Response> {
        let request = self.decorate(request);
        debug!("{} {}", request.method(), request.url());

        let error = match client.execute(request).await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => ClientError::from_response(response).await,
            Err(e) => ClientError::from(e),
        };
        debug!("Request failed: {}", error);
        Err(self.handle_failure(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::HistoryNavigator;
    use reqwest::Method;

    fn setup(location: &str) -> (RequestAuthenticator, Session, Arc<HistoryNavigator>) {
        let session = Session::in_memory();
        let navigator = Arc::new(HistoryNavigator::new(location));
        let authenticator = RequestAuthenticator::new(
            Url::parse("https://api.example.com/v1/").unwrap(),
            session.clone(),
            navigator.clone(),
        );
        (authenticator, session, navigator)
    }

    fn get(url: &str) -> Request {
        Request::new(Method::GET, Url::parse(url).unwrap())
    }

    #[test]
    fn test_backend_requests_carry_the_bearer_token() {
        let (authenticator, session, _) = setup("/tasks");
        session.store_token("abc").unwrap();

        let request = authenticator.decorate(get("https://api.example.com/v1/api/tasks"));
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer abc"
        );
    }

    #[test]
    fn test_other_hosts_are_never_decorated() {
        let (authenticator, session, _) = setup("/tasks");
        session.store_token("abc").unwrap();

        for url in [
            "https://elsewhere.example.com/v1/api/tasks",
            "http://api.example.com/v1/api/tasks",
            "https://api.example.com:8443/v1/api/tasks",
            "https://api.example.com/other/api/tasks",
        ] {
            let request = authenticator.decorate(get(url));
            assert!(request.headers().get(AUTHORIZATION).is_none(), "{url}");
        }
    }

    #[test]
    fn test_base_path_without_trailing_slash_is_a_directory() {
        let session = Session::in_memory();
        session.store_token("abc").unwrap();
        let authenticator = RequestAuthenticator::new(
            Url::parse("https://api.example.com/v1").unwrap(),
            session,
            Arc::new(HistoryNavigator::new("/tasks")),
        );

        let request = authenticator.decorate(get("https://api.example.com/v1/api/tasks"));
        assert_eq!(request.headers().get(AUTHORIZATION).unwrap(), "Bearer abc");

        let request = authenticator.decorate(get("https://api.example.com/v1evil/api/tasks"));
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_no_header_without_credential() {
        let (authenticator, session, _) = setup("/tasks");
        let request = authenticator.decorate(get("https://api.example.com/v1/api/tasks"));
        assert!(request.headers().get(AUTHORIZATION).is_none());

        session.store_token("   ").unwrap();
        let request = authenticator.decorate(get("https://api.example.com/v1/api/tasks"));
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_unauthorized_clears_session_and_redirects() {
        let (authenticator, session, navigator) = setup("/tasks");
        session.store_token("abc").unwrap();

        let error = authenticator.handle_failure(ClientError::network(401, "Invalid or expired token."));

        assert!(matches!(
            &error,
            ClientError::Network { status_code: 401, message } if message == "Invalid or expired token."
        ));
        assert_eq!(session.token(), None);
        assert_eq!(navigator.current_location(), "/login?returnUrl=/tasks");
    }

    #[test]
    fn test_repeated_unauthorized_is_idempotent() {
        let (authenticator, session, navigator) = setup("/tasks");
        session.store_token("abc").unwrap();

        authenticator.handle_failure(ClientError::network(401, "first"));
        authenticator.handle_failure(ClientError::network(401, "second"));

        assert_eq!(session.token(), None);
        assert_eq!(
            navigator.history(),
            vec!["/tasks".to_string(), "/login?returnUrl=/tasks".to_string()]
        );
    }

    #[test]
    fn test_unauthorized_on_login_view_does_not_navigate() {
        let (authenticator, session, navigator) = setup("/login?returnUrl=/tasks");
        session.store_token("abc").unwrap();

        authenticator.handle_failure(ClientError::network(401, "Invalid email or password."));

        assert_eq!(session.token(), None);
        assert_eq!(navigator.history(), vec!["/login?returnUrl=/tasks".to_string()]);
    }

    #[test]
    fn test_other_errors_pass_through_untouched() {
        let (authenticator, session, navigator) = setup("/tasks");
        session.store_token("abc").unwrap();

        for status in [0, 403, 404, 500] {
            let error = authenticator.handle_failure(ClientError::network(status, "boom"));
            assert!(matches!(error, ClientError::Network { status_code, .. } if status_code == status));
        }
        assert_eq!(session.token().as_deref(), Some("abc"));
        assert_eq!(navigator.history(), vec!["/tasks".to_string()]);
    }
}
