//! Wire types exchanged with the BReact API.
//!
//! Field names are snake_case on the wire. The camelCase spellings some
//! backends emit (`processId`, `createdAt`, ...) are accepted as aliases.
//! Unknown fields are ignored.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{AccessToken, ProcessId, ServiceId};

// ---------------------------------------------------------------------------
// Service metadata
// ---------------------------------------------------------------------------

/// Metadata describing one remotely available service.
///
/// Produced by the services listing endpoint and immutable once fetched.
/// `config` is opaque to the client and passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Unique key of the service.
    pub id: ServiceId,
    /// Human-readable service name.
    pub name: String,
    /// Backend-defined service configuration.
    #[serde(default)]
    pub config: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Submission receipt
// ---------------------------------------------------------------------------

/// The receipt returned by a submission call.
///
/// Consumed exactly once to drive polling; the token is only valid for the
/// process it was issued with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    /// The job to poll. Integer IDs are normalised to strings.
    #[serde(alias = "processId")]
    pub process_id: ProcessId,
    /// The token that authorises polling `process_id`.
    #[serde(alias = "accessToken")]
    pub access_token: AccessToken,
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Outer status of a polled job.
///
/// [`ResponseStatus::Pending`] is the only non-terminal value. Statuses the
/// client does not know are kept verbatim in [`ResponseStatus::Other`] and are
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseStatus {
    /// The job is still running.
    Pending,
    /// The job finished; the inner result carries its own status.
    Completed,
    /// The job failed.
    Error,
    /// Any other status string.
    Other(String),
}

impl ResponseStatus {
    /// Returns `true` for every status except [`ResponseStatus::Pending`].
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns the wire spelling of this status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ResponseStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => Self::Pending,
            "completed" => Self::Completed,
            "error" => Self::Error,
            _ => Self::Other(value),
        }
    }
}

impl From<ResponseStatus> for String {
    fn from(status: ResponseStatus) -> Self {
        match status {
            ResponseStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the inner payload produced by the remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultStatus {
    /// The operation produced a result.
    Success,
    /// The operation reported a failure.
    Error,
    /// Any other status string.
    Other(String),
}

impl ResultStatus {
    /// Returns the wire spelling of this status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ResultStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "success" => Self::Success,
            "error" => Self::Error,
            _ => Self::Other(value),
        }
    }
}

impl From<ResultStatus> for String {
    fn from(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Poll responses
// ---------------------------------------------------------------------------

/// The inner payload produced by the remote operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResult {
    /// Outcome reported by the operation itself.
    pub status: ResultStatus,
    /// Operation output, when it produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Map<String, Value>>,
    /// Operation error message, when it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Which service call produced a polled job, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Service the job belongs to.
    #[serde(default)]
    pub service: String,
    /// Endpoint that was invoked.
    #[serde(default)]
    pub endpoint: String,
    /// When the job was created.
    #[serde(
        default,
        alias = "createdAt",
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// The envelope returned by every poll of the result endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    /// Job status; only `pending` is non-terminal.
    pub status: ResponseStatus,
    /// Inner operation payload, once the job has completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ServiceResult>,
    /// Job-level error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Informational message from the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Service that produced this job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Endpoint that produced this job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// When the job was created.
    #[serde(
        default,
        alias = "createdAt",
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    /// Process metadata.
    #[serde(default, alias = "processInfo", skip_serializing_if = "Option::is_none")]
    pub process_info: Option<ProcessInfo>,
}

impl ServiceResponse {
    /// Returns `true` once the job has left the `pending` state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns the operation output map (`result.result`), if present.
    pub fn content(&self) -> Option<&Map<String, Value>> {
        self.result.as_ref().and_then(|r| r.result.as_ref())
    }
}

/// Accepts RFC 3339 timestamps and naive ISO timestamps (read as UTC).
///
/// Anything else, including non-string values, decodes as `None` so that a
/// malformed timestamp never fails an otherwise valid poll.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(parse_timestamp))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
