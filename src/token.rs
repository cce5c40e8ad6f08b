// Token manager: one cached bearer token per host, stored as the auth
// endpoint's JSON response in a single-line file. The file's mtime is
// the issuance timestamp, so loading needs no extra bookkeeping fields
// in the cache format.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Settings;
use crate::errors::ClientError;

/// Seconds shaved off a cached token's lifetime so the client never
/// presents a token that expires mid-request.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

/// A usable bearer token.
#[derive(Debug, Clone)]
pub struct Token {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// The auth endpoint's response, persisted verbatim. Fields beyond the
/// ones this client interprets ride along untouched through save/load
/// cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCredentials {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Token lifetime in seconds, counted from issuance.
    pub expires_in: i64,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Read/write access to the token cache file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the cached token, or `None` when the cache is missing,
    /// empty, unreadable, or past its margin-adjusted expiry. All of
    /// those are routine; the caller just authenticates again.
    pub fn load(&self) -> Option<Token> {
        let line = match fs::read_to_string(&self.path) {
            Ok(line) => line,
            Err(err) => {
                debug!(path = %self.path.display(), %err, "no token cache");
                return None;
            }
        };
        if line.trim().is_empty() {
            debug!(path = %self.path.display(), "token cache is empty");
            return None;
        }
        let creds: CachedCredentials = match serde_json::from_str(&line) {
            Ok(creds) => creds,
            Err(err) => {
                debug!(path = %self.path.display(), %err, "token cache is not valid JSON");
                return None;
            }
        };

        // The file's modification time is when the token was issued.
        let issued_at = match fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(err) => {
                debug!(path = %self.path.display(), %err, "token cache has no readable mtime");
                return None;
            }
        };
        let token = Token {
            value: creds.access_token,
            expires_at: issued_at
                + Duration::seconds(creds.expires_in - EXPIRY_SAFETY_MARGIN_SECS),
        };
        if token.is_expired() {
            debug!(path = %self.path.display(), "cached token has expired");
            return None;
        }
        Some(token)
    }

    /// Overwrite the cache with the latest auth response, one JSON line.
    pub fn save(&self, creds: &CachedCredentials) -> Result<()> {
        let line = serde_json::to_string(creds).context("serializing token cache")?;
        fs::write(&self.path, line)
            .with_context(|| format!("writing token cache {}", self.path.display()))?;
        Ok(())
    }
}

/// Exchange Basic-Auth credentials for a bearer token.
///
/// Only an HTTP 200 carrying a `Bearer` grant counts; any other status
/// or grant type is fatal to the run.
pub fn authenticate(
    client: &Client,
    auth_url: &str,
    username: &str,
    password: &str,
) -> Result<(Token, CachedCredentials), ClientError> {
    let credentials = BASE64.encode(format!("{username}:{password}"));

    let response = client
        .post(auth_url)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Basic {credentials}"))
        .send()
        .map_err(|source| ClientError::Transport {
            url: auth_url.to_string(),
            source,
        })?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(ClientError::AuthenticationFailed {
            status: status.as_u16(),
        });
    }

    let body = response.text().map_err(|source| ClientError::Transport {
        url: auth_url.to_string(),
        source,
    })?;
    let creds: CachedCredentials =
        serde_json::from_str(&body).map_err(|source| ClientError::Decode {
            url: auth_url.to_string(),
            source,
        })?;
    match creds.token_type.as_deref() {
        Some("Bearer") => {}
        other => {
            return Err(ClientError::NotBearer {
                token_type: other.unwrap_or_default().to_string(),
            });
        }
    }

    // A fresh token keeps its full lifetime; the safety margin only
    // applies when re-reading from the cache.
    let token = Token {
        value: creds.access_token.clone(),
        expires_at: Utc::now() + Duration::seconds(creds.expires_in),
    };
    debug!(expires_at = %token.expires_at, "bearer token issued");
    Ok((token, creds))
}

/// Produce a valid token: the cached one if it is still live, otherwise
/// a fresh Basic-Auth exchange whose response is written back to the
/// cache. At most one exchange happens per run.
pub fn ensure_token(client: &Client, settings: &Settings) -> Result<Token> {
    let store = TokenStore::new(settings.token_cache.clone());
    if let Some(token) = store.load() {
        debug!(path = %settings.token_cache.display(), "using cached token");
        return Ok(token);
    }
    info!(url = %settings.auth_url(), "no valid cached token, authenticating");
    let (token, creds) = authenticate(
        client,
        &settings.auth_url(),
        &settings.username,
        &settings.password,
    )?;
    store.save(&creds)?;
    Ok(token)
}
