//! Error types for inputs and sinks.

use thiserror::Error;

/// Errors raised by a pulse or reset input line.
#[derive(Debug, Error)]
pub enum GpioError {
    /// The pin could not be claimed or configured as an input.
    #[error("Failed to configure pin {pin}: {reason}")]
    Configure {
        /// Physical pin number as configured.
        pin: u8,
        /// Platform error message.
        reason: String,
    },

    /// Reading or waiting on an already configured line failed.
    #[error("Input line error: {0}")]
    Line(String),
}

/// Errors raised while delivering a snapshot to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Connection to the broker failed.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The broker did not acknowledge the connection in time.
    #[error("Timed out connecting to broker")]
    Timeout,

    /// The publish request was rejected by the client.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot could not be serialized.
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(feature = "mqtt")]
impl From<rumqttc::ClientError> for SinkError {
    fn from(err: rumqttc::ClientError) -> Self {
        SinkError::Publish(err.to_string())
    }
}

#[cfg(feature = "mqtt")]
impl From<rumqttc::ConnectionError> for SinkError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        SinkError::Connect(err.to_string())
    }
}
