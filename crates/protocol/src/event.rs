//! Log events pushed by the service and their normalized display form.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors from decoding a raw payload.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The payload is not a `{ "Container": { "Name" }, "Data" }` document.
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The workload whose output is being streamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "Name")]
    pub name: String,
}

/// One log event as received on the wire. One frame carries one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "Container")]
    pub container: Container,
    /// The literal log line.
    #[serde(rename = "Data")]
    pub data: String,
}

impl LogEvent {
    /// Decodes a raw text payload.
    pub fn decode(payload: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Converts the event into its display line.
    pub fn into_line(self) -> NormalizedLine {
        NormalizedLine {
            source: source_name(&self.container.name).to_owned(),
            text: self.data,
        }
    }
}

/// A decoded, display-ready log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLine {
    pub source: String,
    pub text: String,
}

impl fmt::Display for NormalizedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.source, self.text)
    }
}

/// Derives the display source from a container name.
///
/// Removes exactly one leading `/` if present. Nothing else is touched.
pub fn source_name(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

/// Decodes one raw payload into one display line.
pub fn normalize(payload: &str) -> Result<NormalizedLine, EventError> {
    LogEvent::decode(payload).map(LogEvent::into_line)
}
