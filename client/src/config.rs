// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::path::PathBuf;

const DEFAULT_API_URL: &str = "http://localhost:3000/";
const CREDENTIALS_DIR: &str = ".taskboard";
const CREDENTIALS_FILE_NAME: &str = "credentials.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub credentials_path: PathBuf,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_url = lookup("TASKBOARD_API_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let credentials_path = lookup("TASKBOARD_CREDENTIALS")
            .map(PathBuf::from)
            .unwrap_or_else(default_credentials_path);

        Self {
            api_url,
            credentials_path,
        }
    }
}

// Helper function to get the full path to the credentials file
fn default_credentials_path() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_default();
    path.push(CREDENTIALS_DIR);
    path.push(CREDENTIALS_FILE_NAME);
    path
}
