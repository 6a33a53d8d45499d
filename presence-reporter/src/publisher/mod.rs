//! Transports sensors report their state through

pub mod mqtt;
pub mod rest;

use async_trait::async_trait;

use crate::error::PublishError;

pub use mqtt::MqttPublisher;
pub use rest::RestPublisher;

/// Something able to deliver a state value to a destination label
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver `value` ("ON"/"OFF") to `destination`
    async fn publish(&self, value: &str, destination: &str) -> Result<(), PublishError>;

    /// Release the underlying connection, best effort
    async fn disconnect(&self) -> Result<(), PublishError> {
        Ok(())
    }

    /// Short label used in logs
    fn name(&self) -> &'static str;
}
