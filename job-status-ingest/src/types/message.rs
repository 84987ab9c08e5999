use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};
use tracing::warn;

use crate::error::message::MessageError;
use crate::types::job::JobOrigin;

/// Envelope published by the overlay and subdivision workers.
///
/// Every field is optional at this level: the poller only needs `jobKey` to
/// consolidate a message, and the status updater decides whether the rest of
/// the envelope is complete enough to apply (see [`JobStatusMessage::try_from`]).
/// Unknown fields such as `queueUrl` are ignored. A field holding a value of
/// the wrong type reads as absent, so an unrecognised `origin` falls back to
/// overlay.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerEnvelope {
    pub job_key: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub origin: Option<JobOrigin>,
    #[serde(default, deserialize_with = "lenient")]
    pub progress: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub eta: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "error_text")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub logfile_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub logs_expires_at: Option<DateTime<Utc>>,
}

/// Decodes an optional field, reading a value of the wrong type as `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match serde_json::from_value::<T>(value.clone()) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(e) => {
            warn!(%value, expected = std::any::type_name::<T>(), error = %e, "Ignoring undecodable envelope field");
            Ok(None)
        }
    }
}

/// Workers sometimes report a structured error; it is kept as its JSON text.
fn error_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(error)) => Some(error),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    Begin,
    Progress,
    Result,
    Error,
    /// Missing or unrecognised `type`
    Unknown,
}

impl MessageKind {
    fn from_type(kind: Option<&str>) -> Self {
        kind.and_then(|kind| MessageKind::from_str(kind).ok()).unwrap_or(MessageKind::Unknown)
    }

    /// Consolidation precedence within one poll batch: result/error > begin > progress.
    pub fn precedence(&self) -> u8 {
        match self {
            MessageKind::Result | MessageKind::Error => 3,
            MessageKind::Begin => 2,
            MessageKind::Progress => 1,
            MessageKind::Unknown => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageKind::Result | MessageKind::Error)
    }
}

/// A parsed queue message carrying a job key, as handed from the poller to the
/// status updater.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerMessage {
    pub job_key: String,
    pub kind: MessageKind,
    pub origin: JobOrigin,
    pub receipt_handle: Option<String>,
    pub envelope: WorkerEnvelope,
}

impl WorkerMessage {
    /// Parses a raw queue body. Fails when the body is not a JSON envelope or
    /// carries no `jobKey`; such messages can never be applied.
    pub fn parse(body: &str, receipt_handle: Option<String>) -> Result<Self, MessageError> {
        let envelope: WorkerEnvelope = serde_json::from_str(body)?;
        let job_key = match envelope.job_key.as_deref() {
            Some(job_key) if !job_key.is_empty() => job_key.to_string(),
            _ => return Err(MessageError::MissingJobKey),
        };

        Ok(Self {
            job_key,
            kind: MessageKind::from_type(envelope.kind.as_deref()),
            origin: envelope.origin.unwrap_or_default(),
            receipt_handle,
            envelope,
        })
    }

    pub fn progress(&self) -> Option<f64> {
        self.envelope.progress
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BeginUpdate {
    pub logs_url: Option<String>,
    pub logs_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub progress: f64,
    pub message: Option<String>,
    pub eta: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultUpdate {
    pub result: Value,
    pub duration_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorUpdate {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatusUpdate {
    Begin(BeginUpdate),
    Progress(ProgressUpdate),
    Result(ResultUpdate),
    Error(ErrorUpdate),
}

impl JobStatusUpdate {
    /// Begin and progress messages are fully captured once buffered in memory,
    /// so their delivery can be acknowledged right away. Results and errors are
    /// only acknowledged after they have been written.
    pub fn acknowledge_on_buffer(&self) -> bool {
        matches!(self, JobStatusUpdate::Begin(_) | JobStatusUpdate::Progress(_))
    }
}

/// A validated job status message, ready to be buffered by the status updater.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusMessage {
    pub job_key: String,
    pub origin: JobOrigin,
    pub receipt_handle: Option<String>,
    pub update: JobStatusUpdate,
}

impl TryFrom<WorkerMessage> for JobStatusMessage {
    type Error = MessageError;

    fn try_from(message: WorkerMessage) -> Result<Self, Self::Error> {
        let mut reasons = Vec::new();
        if message.job_key.is_empty() {
            reasons.push("Job key is required".to_string());
        }

        let envelope = message.envelope;
        let update = match message.kind {
            MessageKind::Begin => Some(JobStatusUpdate::Begin(BeginUpdate {
                logs_url: envelope.logfile_url,
                logs_expires_at: envelope.logs_expires_at,
            })),
            MessageKind::Progress => match envelope.progress {
                Some(progress) if progress.is_finite() && (0.0..=100.0).contains(&progress) => {
                    Some(JobStatusUpdate::Progress(ProgressUpdate {
                        progress,
                        message: envelope.message,
                        eta: envelope.eta,
                    }))
                }
                Some(progress) => {
                    reasons.push(format!("Progress must be between 0 and 100, got {progress}"));
                    None
                }
                None => {
                    reasons.push("Progress is required".to_string());
                    None
                }
            },
            MessageKind::Result => match envelope.result {
                Some(result) => {
                    Some(JobStatusUpdate::Result(ResultUpdate { result, duration_ms: envelope.duration }))
                }
                None => {
                    reasons.push("Result is required".to_string());
                    None
                }
            },
            MessageKind::Error => match envelope.error {
                Some(error) if !error.is_empty() => Some(JobStatusUpdate::Error(ErrorUpdate { error })),
                _ => {
                    reasons.push("Error is required".to_string());
                    None
                }
            },
            MessageKind::Unknown => {
                if envelope.kind.is_none() {
                    reasons.push("Type is required".to_string());
                } else {
                    reasons.push("Type is invalid".to_string());
                }
                None
            }
        };

        match update {
            Some(update) if reasons.is_empty() => Ok(Self {
                job_key: message.job_key,
                origin: message.origin,
                receipt_handle: message.receipt_handle,
                update,
            }),
            _ => Err(MessageError::Invalid(reasons)),
        }
    }
}
