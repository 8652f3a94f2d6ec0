// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use parking_lot::Mutex;
use tracing::debug;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";
const RETURN_URL_PARAM: &str = "returnUrl";

/// The routing layer: where the user is and where they go next.
pub trait Navigator: Send + Sync {
    fn current_location(&self) -> String;
    fn navigate(&self, location: &str);
}

/// In-memory navigation history. Navigating to the location already on top
/// of the stack is a no-op, so repeated redirects collapse into one entry.
#[derive(Debug)]
pub struct HistoryNavigator {
    entries: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    pub fn new(initial: &str) -> Self {
        Self {
            entries: Mutex::new(vec![initial.to_string()]),
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

impl Default for HistoryNavigator {
    fn default() -> Self {
        Self::new(HOME_PATH)
    }
}

impl Navigator for HistoryNavigator {
    fn current_location(&self) -> String {
        self.entries
            .lock()
            .last()
            .cloned()
            .unwrap_or_else(|| HOME_PATH.to_string())
    }

    fn navigate(&self, location: &str) {
        let mut entries = self.entries.lock();
        if entries.last().is_some_and(|top| top == location) {
            debug!("Already at {}, not navigating again.", location);
            return;
        }
        debug!("Navigating to {}", location);
        entries.push(location.to_string());
    }
}

/// The login view, remembering where to go once signed in.
pub fn login_redirect(return_url: &str) -> String {
    format!(
        "{LOGIN_PATH}?{RETURN_URL_PARAM}={}",
        encode_return_url(return_url)
    )
}

pub fn is_login_location(location: &str) -> bool {
    path_of(location) == LOGIN_PATH
}

/// The `returnUrl` carried by a location, if any.
pub fn return_url_from(location: &str) -> Option<String> {
    let query = location.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == RETURN_URL_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Where to land after logging in from `location`.
pub fn post_login_destination(location: &str) -> String {
    return_url_from(location).unwrap_or_else(|| HOME_PATH.to_string())
}

fn path_of(location: &str) -> &str {
    location
        .split(['?', '#'])
        .next()
        .unwrap_or(location)
}

// Paths stay readable; only what would break the query string is escaped.
fn encode_return_url(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '&' => encoded.push_str("%26"),
            '#' => encoded.push_str("%23"),
            '+' => encoded.push_str("%2B"),
            ' ' => encoded.push_str("%20"),
            _ => encoded.push(c),
        }
    }
    encoded
}
