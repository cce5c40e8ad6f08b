// Service client for the EBBP enrollment API. One method per remote
// operation; every method builds a single bearer-authorized request,
// sends it synchronously, and funnels the response through `classify`,
// so success, business rejection, and unexpected statuses come back as
// one tagged result instead of per-operation status branching.
//
// The client never persists anything itself: methods return an
// `Outcome` and the caller decides which bodies are worth keeping.

use std::path::Path;

use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::batch::BatchRecord;
use crate::errors::ClientError;
use crate::token::Token;

/// How a response body should be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    /// Strict JSON; a parse failure is a `Decode` error.
    Json,
    /// Raw text passed through untouched (report downloads).
    Text,
}

/// Decoded response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            ResponseBody::Json(_) => None,
        }
    }

    /// Body as a JSON value. Raw text is wrapped in a JSON string so the
    /// response log can hold either shape.
    pub fn to_json(&self) -> Value {
        match self {
            ResponseBody::Json(value) => value.clone(),
            ResponseBody::Text(text) => Value::String(text.clone()),
        }
    }
}

/// Uniform classification of one request/response cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// One of the operation's success codes answered (200, plus 201 for
    /// enrollment-shaped submissions).
    Success(ResponseBody),
    /// HTTP 400: the service rejected the submission on business
    /// grounds. Reported to the caller, never raised.
    Rejected(ResponseBody),
    /// Any other status. The body is decoded leniently since error
    /// pages are not reliably JSON.
    Unexpected { status: u16, body: ResponseBody },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn body(&self) -> &ResponseBody {
        match self {
            Outcome::Success(body) | Outcome::Rejected(body) => body,
            Outcome::Unexpected { body, .. } => body,
        }
    }
}

/// Filters for the subscriber report download.
#[derive(Debug, Clone)]
pub struct SubscriberReportQuery {
    pub report_type: String,
    /// Study Area Code to filter on.
    pub sac: String,
    pub include_subscriber_id: bool,
}

/// Filters for the transaction report download. Dates use the service's
/// `MM/DD/YYYY` convention.
#[derive(Debug, Clone)]
pub struct TransactionReportQuery {
    pub report_type: String,
    pub sac: String,
    pub start_date: String,
    pub end_date: String,
    /// Transaction kind to report on, e.g. `enroll`.
    pub transaction_type: String,
    pub include_subscriber_id: bool,
}

pub struct ApiClient {
    client: Client,
    service_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(client: Client, service_url: impl Into<String>, token: &Token) -> Self {
        Self {
            client,
            service_url: service_url.into(),
            token: token.value.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.service_url, path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// POST /subscriber. 201 is the documented "created" answer; some
    /// deployments answer 200, so both count.
    pub fn enroll_subscriber(&self, record: &BatchRecord) -> Result<Outcome, ClientError> {
        self.submit_record(
            Method::POST,
            "/subscriber",
            record,
            &[StatusCode::OK, StatusCode::CREATED],
        )
    }

    /// POST /verify: an eligibility check with the same record shape as
    /// an enrollment, with nothing persisted server-side.
    pub fn verify_subscriber(&self, record: &BatchRecord) -> Result<Outcome, ClientError> {
        self.submit_record(
            Method::POST,
            "/verify",
            record,
            &[StatusCode::OK, StatusCode::CREATED],
        )
    }

    /// DELETE /subscriber.
    pub fn de_enroll_subscriber(&self, record: &BatchRecord) -> Result<Outcome, ClientError> {
        self.submit_record(Method::DELETE, "/subscriber", record, &[StatusCode::OK])
    }

    /// PUT /subscriber.
    pub fn update_subscriber(&self, record: &BatchRecord) -> Result<Outcome, ClientError> {
        self.submit_record(Method::PUT, "/subscriber", record, &[StatusCode::OK])
    }

    fn submit_record(
        &self,
        method: Method,
        path: &str,
        record: &BatchRecord,
        success: &[StatusCode],
    ) -> Result<Outcome, ClientError> {
        let url = self.url(path);
        let response = self
            .client
            .request(method, &url)
            .header(AUTHORIZATION, self.bearer())
            .json(record)
            .send()
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        classify(response, &url, BodyKind::Json, success)
    }

    /// POST /batch: upload a whole batch CSV for asynchronous processing
    /// server-side. The service looks for the file under the `filefield`
    /// part name.
    pub fn upload_batch(&self, file_name: &str, contents: String) -> Result<Outcome, ClientError> {
        let url = self.url("/batch");
        let part = multipart::Part::text(contents)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        let form = multipart::Form::new().part("filefield", part);
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer())
            .multipart(form)
            .send()
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        classify(response, &url, BodyKind::Json, &[StatusCode::OK])
    }

    /// GET /batch: processing status of previously uploaded batches, a
    /// JSON array with one object per batch.
    pub fn batch_status(&self) -> Result<Outcome, ClientError> {
        self.get("/batch", &[], BodyKind::Json)
    }

    /// GET /report/subscriber. The success body is the report itself,
    /// raw CSV text.
    pub fn subscriber_report(&self, query: &SubscriberReportQuery) -> Result<Outcome, ClientError> {
        self.get(
            "/report/subscriber",
            &[
                ("reportType", query.report_type.as_str()),
                ("sac", query.sac.as_str()),
                ("includeSubscriberId", flag(query.include_subscriber_id)),
            ],
            BodyKind::Text,
        )
    }

    /// GET /report/transaction, raw CSV text on success.
    pub fn transaction_report(
        &self,
        query: &TransactionReportQuery,
    ) -> Result<Outcome, ClientError> {
        self.get(
            "/report/transaction",
            &[
                ("reportType", query.report_type.as_str()),
                ("sac", query.sac.as_str()),
                ("startDate", query.start_date.as_str()),
                ("endDate", query.end_date.as_str()),
                ("type", query.transaction_type.as_str()),
                ("includeSubscriberId", flag(query.include_subscriber_id)),
            ],
            BodyKind::Text,
        )
    }

    fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        kind: BodyKind,
    ) -> Result<Outcome, ClientError> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .header(AUTHORIZATION, self.bearer())
            .send()
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        classify(response, &url, kind, &[StatusCode::OK])
    }
}

/// File name the service sees for an uploaded batch.
pub fn upload_file_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("batch.csv")
}

/// The service takes its boolean query flags as literal `1`/`0`.
fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Collapse one HTTP response into the `Outcome` every operation
/// shares: the operation's success codes, the 400 business-rejection
/// lane, and everything else.
fn classify(
    response: Response,
    url: &str,
    kind: BodyKind,
    success: &[StatusCode],
) -> Result<Outcome, ClientError> {
    let status = response.status();
    let text = response.text().map_err(|source| ClientError::Transport {
        url: url.to_string(),
        source,
    })?;
    debug!(%url, status = status.as_u16(), bytes = text.len(), "response received");

    if success.contains(&status) {
        return Ok(Outcome::Success(decode(&text, kind, url)?));
    }
    if status == StatusCode::BAD_REQUEST {
        return Ok(Outcome::Rejected(decode(&text, kind, url)?));
    }
    Ok(Outcome::Unexpected {
        status: status.as_u16(),
        body: decode_lenient(&text),
    })
}

fn decode(text: &str, kind: BodyKind, url: &str) -> Result<ResponseBody, ClientError> {
    match kind {
        BodyKind::Json => serde_json::from_str(text)
            .map(ResponseBody::Json)
            .map_err(|source| ClientError::Decode {
                url: url.to_string(),
                source,
            }),
        BodyKind::Text => Ok(ResponseBody::Text(text.to_string())),
    }
}

/// Error pages are not reliably JSON; fall back to the raw text.
fn decode_lenient(text: &str) -> ResponseBody {
    serde_json::from_str(text)
        .map(ResponseBody::Json)
        .unwrap_or_else(|_| ResponseBody::Text(text.to_string()))
}
