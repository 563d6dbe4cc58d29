//! The request/response contract with the remote measurement service.
//!
//! The service itself is an external collaborator; this module only fixes what goes over the wire
//! and how failures are classified. Implementations live in `meshprobe-impls`.

use std::fmt;
use std::str::FromStr;

use crate::{
    channel::Channel,
    command::{Command, UnknownVariant},
    node::Node,
};

/// One measurement request: a single (command, channel) pair.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MeasurementRequest {
    /// The source node.
    pub source: Node,
    /// The destination node.
    pub destination: Node,
    /// Intermediate nodes, in traversal order.
    pub path: Vec<Node>,
    /// The channel to measure on. Absent for OLSR commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wireless_channel: Option<Channel>,
    /// The OLSR flag of an OLSR command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub olsr: Option<bool>,
}

impl MeasurementRequest {
    /// Builds the request for `command` on `channel`.
    pub fn new(command: &Command, channel: Option<Channel>) -> Self {
        Self {
            source: command.from,
            destination: command.to,
            path: command.path.clone(),
            wireless_channel: channel,
            olsr: command.olsr,
        }
    }
}

/// A decoded measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// The source node, as reported by the service.
    pub source: Node,
    /// The destination node, as reported by the service.
    pub destination: Node,
    /// The channel the measurement ran on.
    pub wireless_channel: Channel,
    /// Throughput in Mbit/s.
    pub throughput: f64,
    /// The service's timestamp, if it reported one.
    pub timestamp: Option<String>,
}

/// The interface to a measurement service. Each call is exactly one request; retries are the
/// business of [`Retrying`](crate::retry::Retrying).
pub trait MeasurementService {
    /// Runs one measurement.
    fn measure(&self, request: &MeasurementRequest) -> Result<Measurement, ServiceError>;

    /// Like [`measure`](Self::measure), but also returns how many requests were sent.
    fn measure_counted(
        &self,
        request: &MeasurementRequest,
    ) -> (Result<Measurement, ServiceError>, u32) {
        (self.measure(request), 1)
    }
}

impl<T: MeasurementService + ?Sized> MeasurementService for &T {
    fn measure(&self, request: &MeasurementRequest) -> Result<Measurement, ServiceError> {
        (**self).measure(request)
    }

    fn measure_counted(
        &self,
        request: &MeasurementRequest,
    ) -> (Result<Measurement, ServiceError>, u32) {
        (**self).measure_counted(request)
    }
}

impl<T: MeasurementService + ?Sized> MeasurementService for Box<T> {
    fn measure(&self, request: &MeasurementRequest) -> Result<Measurement, ServiceError> {
        (**self).measure(request)
    }

    fn measure_counted(
        &self,
        request: &MeasurementRequest,
    ) -> (Result<Measurement, ServiceError>, u32) {
        (**self).measure_counted(request)
    }
}

/// Decodes a successful response body. Each [`ProtocolVersion`] has its own decoder.
pub trait ResponseDecoder {
    /// Decodes `body` into a measurement.
    fn decode(&self, body: &[u8]) -> Result<Measurement, DecodeError>;
}

impl<T: ResponseDecoder + ?Sized> ResponseDecoder for Box<T> {
    fn decode(&self, body: &[u8]) -> Result<Measurement, DecodeError> {
        (**self).decode(body)
    }
}

/// The response format a deployment's service speaks.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// A JSON object per response.
    #[default]
    Json,
    /// A CSV table with a header row and one data row.
    Csv,
}

impl FromStr for ProtocolVersion {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ProtocolVersion::Json),
            "csv" => Ok(ProtocolVersion::Csv),
            _ => Err(UnknownVariant::new("protocol version", s)),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::Json => f.write_str("json"),
            ProtocolVersion::Csv => f.write_str("csv"),
        }
    }
}

/// A failed measurement request.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The service answered with a status other than 200.
    #[error("service returned status {code}: {body}")]
    Status {
        /// The HTTP status code.
        code: u16,
        /// The response body, kept for diagnostics only.
        body: String,
    },

    /// No response arrived within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// The request could not be delivered or the response could not be read.
    #[error("transport failure")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The service answered 200 but the body did not decode.
    #[error("failed to decode response")]
    Decode(#[from] DecodeError),
}

impl ServiceError {
    /// Whether repeating the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Status { code, .. } => *code == 429 || *code >= 500,
            ServiceError::Timeout | ServiceError::Transport(_) => true,
            ServiceError::Decode(_) => false,
        }
    }
}

/// A response body that does not hold a measurement.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Invalid JSON, or JSON of the wrong shape.
    #[error("invalid JSON body")]
    Json(#[from] serde_json::Error),

    /// Invalid CSV.
    #[error("invalid CSV body")]
    Csv(#[from] csv::Error),

    /// A required column is absent from a tabular body.
    #[error("missing column `{0}`")]
    MissingColumn(&'static str),

    /// A tabular body has the wrong number of data rows.
    #[error("expected {expected} data row(s), got {got}")]
    WrongNrRows {
        /// The expected number of rows.
        expected: usize,
        /// The number of rows found.
        got: usize,
    },

    /// A field holds a value of the wrong type.
    #[error("invalid value for `{field}`: {value:?}")]
    InvalidField {
        /// The field name.
        field: &'static str,
        /// The offending value.
        value: String,
    },
}
