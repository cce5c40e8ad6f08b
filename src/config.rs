// Runtime settings: host, credentials, and file locations, resolved by
// the CLI layer and threaded through explicitly. Nothing reads them
// from globals.

use std::path::PathBuf;

/// Production API host. Staging deployments use an `api-stg` host.
pub const DEFAULT_HOST: &str = "https://api.universalservice.org";

/// Path prefix the enrollment service mounts its versioned API under.
pub const SERVICE_PATH: &str = "/ebbp-svc/1";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Scheme plus host of the API, e.g. `https://api.universalservice.org`.
    pub host: String,
    pub username: String,
    pub password: String,
    /// Where reports, batch-status files, and the response log land.
    pub output_dir: PathBuf,
    /// Token cache file. Staging and production tokens live in separate
    /// files so switching hosts never replays the wrong token.
    pub token_cache: PathBuf,
}

impl Settings {
    /// Base URL of the enrollment API itself.
    pub fn service_url(&self) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), SERVICE_PATH)
    }

    /// The token endpoint hangs off the host root, not the service path.
    pub fn auth_url(&self) -> String {
        format!("{}/auth/token", self.host.trim_end_matches('/'))
    }

    /// Default cache location: `.ebbp-tokens` in the home directory,
    /// with a `-stg` suffix when `host` is a staging host.
    pub fn default_token_cache(host: &str) -> PathBuf {
        let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        if host.contains("api-stg") {
            dir.join(".ebbp-tokens-stg")
        } else {
            dir.join(".ebbp-tokens")
        }
    }
}
