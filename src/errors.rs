// Error taxonomy shared by the token manager and the service client.
// Only conditions that abort the run live here: transport failures,
// a failed or unusable auth exchange, and bodies that had to be JSON
// but were not. Business-level rejections (HTTP 400) are not errors --
// they come back as `api::Outcome::Rejected` and the caller carries on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, DNS, or TLS-level failure talking to `url`.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The auth endpoint answered with something other than HTTP 200.
    #[error("authentication failed with HTTP {status}")]
    AuthenticationFailed { status: u16 },

    /// The auth endpoint issued a grant this client cannot use.
    #[error("auth endpoint returned token_type {token_type:?}, expected \"Bearer\"")]
    NotBearer { token_type: String },

    /// A response body that had to be JSON did not parse.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}
